use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The prediction tasks the store keeps artifacts for.
///
/// `TextVectorizer` is the companion slot of `Sentiment`: the fitted text
/// vectorizer is versioned exactly like a predictive model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Shipping,
    Demand,
    Sentiment,
    #[serde(rename = "sentiment_vectorizer")]
    TextVectorizer,
    Similarity,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Shipping,
        TaskType::Demand,
        TaskType::Sentiment,
        TaskType::TextVectorizer,
        TaskType::Similarity,
    ];

    /// Directory / wire name of the task.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Shipping => "shipping",
            TaskType::Demand => "demand",
            TaskType::Sentiment => "sentiment",
            TaskType::TextVectorizer => "sentiment_vectorizer",
            TaskType::Similarity => "similarity",
        }
    }

    /// Dense index, used to key per-task lock and generation arrays.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            TaskType::Shipping => 0,
            TaskType::Demand => 1,
            TaskType::Sentiment => 2,
            TaskType::TextVectorizer => 3,
            TaskType::Similarity => 4,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shipping" => Ok(TaskType::Shipping),
            "demand" | "orders" => Ok(TaskType::Demand),
            "sentiment" => Ok(TaskType::Sentiment),
            "sentiment_vectorizer" | "vectorizer" => Ok(TaskType::TextVectorizer),
            "similarity" | "clustering" => Ok(TaskType::Similarity),
            other => Err(Error::UnknownTask(other.to_string())),
        }
    }
}

/// Lifecycle state of an artifact within its task's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Active,
    Archived,
}
