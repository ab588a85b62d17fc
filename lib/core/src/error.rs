use crate::task::TaskType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No active artifact and no bundled default for the task.
    #[error("No artifact available for task: {0}")]
    ArtifactNotFound(TaskType),

    #[error("Corrupt artifact for task {task}: {reason}")]
    ArtifactCorrupt { task: TaskType, reason: String },

    #[error("Feature schema mismatch: expected {expected} features, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// Only ever logged by adapters; they recover with documented defaults.
    #[error("Reference data missing: {0}")]
    ReferenceDataMissing(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("History entry not found for task {task}: {id}")]
    HistoryNotFound { task: TaskType, id: String },

    #[error("Refusing to delete the active artifact of task {0}")]
    ActiveDeletion(TaskType),

    #[error("Invalid history id: {0}")]
    InvalidHistoryId(String),

    #[error("Unknown task type: {0}")]
    UnknownTask(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// True for the failures a caller should treat as "feature unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::ArtifactNotFound(_))
    }
}
