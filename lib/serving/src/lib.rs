//! # modelvault Serving
//!
//! [`PredictionService`] ties the artifact store, the feature adapters and
//! the similarity index together:
//!
//! ```text
//! predict(input) ──> ArtifactStore::get_active(task)
//!                ──> FeatureAdapter::build(input, schema)
//!                ──> ModelArtifact::infer(vector)
//!                ──> clamp / round ──> result
//! ```
//!
//! Reads run concurrently against immutable artifact and reference
//! snapshots; writes go through the store's per-task locks.

pub mod reference;
pub mod result;
pub mod service;

pub use reference::ReferenceSet;
pub use result::{
    DemandForecast, DemandPrediction, ForecastPoint, SentimentMethod, SentimentPrediction, ShippingPrediction,
};
pub use service::PredictionService;
