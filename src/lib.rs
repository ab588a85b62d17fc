//! # modelvault
//!
//! An embedded model-serving and versioning layer: a versioned artifact
//! store with rollback, feature adapters that rebuild training-time inputs
//! exactly, and a prediction service with explicit fallback chains.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! modelvault --models-dir ./models upload shipping ./shipping.artifact --meta author=ana
//! modelvault --models-dir ./models history shipping
//! modelvault --models-dir ./models predict shipping ./order.json
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use modelvault::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(ArtifactStore::open(StoreConfig::new("./models")).unwrap());
//! let reference = ReferenceSet::load_dir("./reference").unwrap();
//! let service = PredictionService::new(store, reference);
//!
//! let order = ShippingInput {
//!     customer_state: Some("RJ".to_string()),
//!     seller_state: Some("SP".to_string()),
//!     ..Default::default()
//! };
//! match service.predict_shipping(&order) {
//!     Ok(prediction) => println!("{:.1} days over {:.0} km", prediction.days, prediction.derived.distance_km),
//!     Err(e) if e.is_unavailable() => println!("delivery estimates are disabled"),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - [`modelvault-core`](modelvault_core) - Task types, schemas, model payloads, fallback chains
//! - [`modelvault-storage`](modelvault_storage) - Versioned artifact store (history, restore, delete)
//! - [`modelvault-features`](modelvault_features) - Shipping, demand and sentiment feature adapters
//! - [`modelvault-similarity`](modelvault_similarity) - Nearest-neighbor recommendations with catalog fallbacks
//! - [`modelvault-serving`](modelvault_serving) - The prediction service

// Re-export core types
pub use modelvault_core::{
    ArtifactEnvelope, ArtifactSource, ArtifactStatus, Error, FallbackChain, FeatureSchema,
    FeatureSlot, FeatureVector, Inference, Metadata, ModelArtifact, ModelPayload, Result,
    TaskType, Vector,
};

// Re-export storage
pub use modelvault_storage::{ArtifactStore, HistoryEntry, Lookup, ModelStatus, StoreConfig, UploadReceipt};

// Re-export features
pub use modelvault_features::{
    haversine_km, DemandInput, GeoPoint, LagBlock, Period, ProductProfile, SalesHistory, Sentiment, ShippingInput,
};

// Re-export similarity
pub use modelvault_similarity::{Catalog, CatalogItem, RecommendationMethod, Recommendations};

// Re-export serving
pub use modelvault_serving::{
    DemandForecast, DemandPrediction, ForecastPoint, PredictionService, ReferenceSet, SentimentMethod,
    SentimentPrediction, ShippingPrediction,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactStore, StoreConfig, TaskType, Metadata,
        PredictionService, ReferenceSet,
        ShippingInput, DemandInput, ProductProfile, SalesHistory, Period,
        Error, Result,
    };
}
