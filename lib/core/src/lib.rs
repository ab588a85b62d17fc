//! # modelvault Core
//!
//! Core types shared by every modelvault crate:
//!
//! - [`TaskType`] - The prediction tasks artifacts are kept for
//! - [`FeatureSchema`] / [`FeatureVector`] - Declared inputs and the exact vectors built against them
//! - [`ModelPayload`] - Closed set of model kinds, with the [`Predictor`] and [`Explainable`] capabilities
//! - [`ModelArtifact`] - A loaded artifact: schema, payload and metadata
//! - [`FallbackChain`] - Ordered degraded strategies, each testable on its own
//!
//! ## Example
//!
//! ```rust
//! use modelvault_core::{FeatureMap, FeatureSchema, FeatureSlot};
//!
//! let schema = FeatureSchema::new(vec![
//!     FeatureSlot::numeric("price"),
//!     FeatureSlot::categorical("customer_state"),
//! ]);
//!
//! let mut computed = FeatureMap::new();
//! computed.insert("price", 42.0);
//! computed.insert("unused", 1.0);
//!
//! let vector = schema.conform(computed);
//! assert_eq!(vector.names().collect::<Vec<_>>(), vec!["price", "customer_state"]);
//! ```

pub mod artifact;
pub mod error;
pub mod fallback;
pub mod model;
pub mod schema;
pub mod task;
pub mod vector;

pub use artifact::{ArtifactEnvelope, ArtifactSource, Metadata, ModelArtifact, ENVELOPE_FORMAT_VERSION};
pub use error::{Error, Result};
pub use fallback::{FallbackChain, Resolved};
pub use model::{
    ClassProbabilities, Distance, Explainable, Inference, LinearModel, LogisticModel, ModelPayload,
    Neighbor, NeighborModel, Predictor, TfidfVectorizer, TreeEnsemble,
};
pub use schema::{FeatureKind, FeatureMap, FeatureSchema, FeatureSlot, FeatureValue, FeatureVector, MISSING_CATEGORY};
pub use task::{ArtifactStatus, TaskType};
pub use vector::Vector;
