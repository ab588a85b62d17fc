use modelvault_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the store keeps its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Writable root holding one directory per task.
    pub root: PathBuf,
    /// Read-only directory of default artifacts shipped with the application.
    pub bundled_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./models"),
            bundled_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bundled_dir: None,
        }
    }

    pub fn with_bundled<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.bundled_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}
