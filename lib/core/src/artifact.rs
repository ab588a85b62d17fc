use crate::error::{Error, Result};
use crate::model::{Inference, ModelPayload, Predictor};
use crate::schema::{FeatureSchema, FeatureVector};
use crate::task::{ArtifactStatus, TaskType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form artifact metadata (metrics, author, upload date, ...).
pub type Metadata = serde_json::Map<String, Value>;

pub const ENVELOPE_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    ENVELOPE_FORMAT_VERSION
}

/// Where the active artifact of a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    Uploaded,
    Bundled,
}

/// Serialized form of an artifact: declared schema plus model payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub task: TaskType,
    pub schema: FeatureSchema,
    pub model: ModelPayload,
}

impl ArtifactEnvelope {
    pub fn new(task: TaskType, schema: FeatureSchema, model: ModelPayload) -> Self {
        Self {
            format_version: ENVELOPE_FORMAT_VERSION,
            task,
            schema,
            model,
        }
    }

    /// Structural validation run before an upload is accepted.
    pub fn validate(&self, expected: TaskType) -> std::result::Result<(), String> {
        if self.format_version != ENVELOPE_FORMAT_VERSION {
            return Err(format!("unsupported format version {}", self.format_version));
        }
        if self.task != expected {
            return Err(format!("artifact declares task '{}'", self.task));
        }
        if !self.model.admissible_for(expected) {
            return Err(format!("a {} model cannot serve task '{}'", self.model.kind(), expected));
        }
        self.schema.validate()?;
        self.model.validate(&self.schema)
    }
}

/// A loaded artifact, immutable once published.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub task: TaskType,
    pub version: String,
    pub status: ArtifactStatus,
    pub source: ArtifactSource,
    pub schema: FeatureSchema,
    pub payload: ModelPayload,
    pub metadata: Metadata,
}

impl ModelArtifact {
    pub fn from_envelope(
        envelope: ArtifactEnvelope,
        version: impl Into<String>,
        source: ArtifactSource,
        metadata: Metadata,
    ) -> Self {
        Self {
            task: envelope.task,
            version: version.into(),
            status: ArtifactStatus::Active,
            source,
            schema: envelope.schema,
            payload: envelope.model,
            metadata,
        }
    }

    pub fn predictor(&self) -> Result<&dyn Predictor> {
        self.payload.as_predictor().ok_or_else(|| {
            Error::InferenceFailure(format!("{} artifact cannot predict", self.payload.kind()))
        })
    }

    /// Check the vector against the declared schema, then infer.
    pub fn infer(&self, features: &FeatureVector) -> Result<Inference> {
        features.check(&self.schema)?;
        self.predictor()?.infer(features)
    }
}
