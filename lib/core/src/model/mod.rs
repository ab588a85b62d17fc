//! Trained model payloads
//!
//! An artifact's payload is one of a closed set of model kinds. Kinds that
//! can answer a prediction implement [`Predictor`]; kinds that can report
//! per-feature importances additionally expose [`Explainable`] through
//! [`Predictor::as_explainable`].

pub mod linear;
pub mod logistic;
pub mod neighbors;
pub mod tfidf;
pub mod tree;

use crate::error::Result;
use crate::schema::{FeatureSchema, FeatureVector};
use crate::task::TaskType;
use serde::{Deserialize, Serialize};

pub use linear::LinearModel;
pub use logistic::LogisticModel;
pub use neighbors::{Distance, Neighbor, NeighborModel};
pub use tfidf::TfidfVectorizer;
pub use tree::{Node, Tree, TreeEnsemble};

/// Output of a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum Inference {
    /// Regression value.
    Value(f64),
    /// Class probabilities, aligned with the model's classes.
    Classes(ClassProbabilities),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub classes: Vec<String>,
    pub probabilities: Vec<f64>,
}

impl ClassProbabilities {
    /// Most probable class; first class wins ties.
    pub fn best(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (class, p) in self.classes.iter().zip(self.probabilities.iter()) {
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((class.as_str(), *p));
            }
        }
        best
    }

    pub fn get(&self, class: &str) -> Option<f64> {
        self.classes
            .iter()
            .position(|c| c == class)
            .and_then(|i| self.probabilities.get(i).copied())
    }
}

/// Anything that maps a conformed feature vector to a prediction.
pub trait Predictor: Send + Sync {
    fn infer(&self, features: &FeatureVector) -> Result<Inference>;

    /// Per-feature importances, when the model kind can report them.
    fn as_explainable(&self) -> Option<&dyn Explainable> {
        None
    }
}

/// Models that can rank their input features.
pub trait Explainable {
    /// `(feature name, importance)` sorted by importance, descending.
    /// Importances are normalized to sum to 1.
    fn feature_importances(&self, schema: &FeatureSchema) -> Vec<(String, f64)>;
}

/// The deserialized payload of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelPayload {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    Logistic(LogisticModel),
    Tfidf(TfidfVectorizer),
    NearestNeighbors(NeighborModel),
}

impl ModelPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelPayload::Linear(_) => "linear",
            ModelPayload::TreeEnsemble(_) => "tree_ensemble",
            ModelPayload::Logistic(_) => "logistic",
            ModelPayload::Tfidf(_) => "tfidf",
            ModelPayload::NearestNeighbors(_) => "nearest_neighbors",
        }
    }

    pub fn as_predictor(&self) -> Option<&dyn Predictor> {
        match self {
            ModelPayload::Linear(m) => Some(m),
            ModelPayload::TreeEnsemble(m) => Some(m),
            ModelPayload::Logistic(m) => Some(m),
            ModelPayload::Tfidf(_) | ModelPayload::NearestNeighbors(_) => None,
        }
    }

    pub fn as_vectorizer(&self) -> Option<&TfidfVectorizer> {
        match self {
            ModelPayload::Tfidf(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_neighbors(&self) -> Option<&NeighborModel> {
        match self {
            ModelPayload::NearestNeighbors(n) => Some(n),
            _ => None,
        }
    }

    /// Whether this kind of model can serve the given task.
    pub fn admissible_for(&self, task: TaskType) -> bool {
        matches!(
            (task, self),
            (TaskType::Shipping | TaskType::Demand, ModelPayload::Linear(_))
                | (TaskType::Shipping | TaskType::Demand, ModelPayload::TreeEnsemble(_))
                | (TaskType::Sentiment, ModelPayload::Logistic(_))
                | (TaskType::TextVectorizer, ModelPayload::Tfidf(_))
                | (TaskType::Similarity, ModelPayload::NearestNeighbors(_))
        )
    }

    /// Internal consistency of the payload against its declared schema.
    pub fn validate(&self, schema: &FeatureSchema) -> std::result::Result<(), String> {
        match self {
            ModelPayload::Linear(m) => m.validate(schema),
            ModelPayload::TreeEnsemble(m) => m.validate(schema),
            ModelPayload::Logistic(m) => m.validate(schema),
            ModelPayload::Tfidf(m) => m.validate(schema),
            ModelPayload::NearestNeighbors(m) => m.validate(schema),
        }
    }
}
