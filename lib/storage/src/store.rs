use crate::codec;
use crate::config::StoreConfig;
use crate::history::{self, ArtifactRecord, HistoryEntry, HistoryId, HistoryKind, ARTIFACT_EXT, RECORD_EXT};
use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, SecondsFormat, Utc};
use modelvault_core::{
    ArtifactEnvelope, ArtifactSource, Error, FallbackChain, Metadata, ModelArtifact, Result, TaskType,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TASK_COUNT: usize = TaskType::ALL.len();
const ACTIVE_STEM: &str = "active";
const HISTORY_DIR: &str = "history";
const BUNDLED_ARTIFACT: &str = "model.artifact";
const BUNDLED_CONFIG: &str = "config.json";
const BUNDLED_VERSION: &str = "bundled";

/// Outcome of resolving the active artifact of a task.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Arc<ModelArtifact>),
    NotFound,
    Corrupt(String),
}

impl Lookup {
    pub fn into_result(self, task: TaskType) -> Result<Arc<ModelArtifact>> {
        match self {
            Lookup::Found(artifact) => Ok(artifact),
            Lookup::NotFound => Err(Error::ArtifactNotFound(task)),
            Lookup::Corrupt(reason) => Err(Error::ArtifactCorrupt { task, reason }),
        }
    }
}

/// What an accepted upload produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub task: TaskType,
    pub version: String,
    /// History id the previous active artifact was archived under.
    pub archived_as: Option<String>,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Dashboard summary of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub task: TaskType,
    pub loaded: bool,
    pub source: Option<ArtifactSource>,
    pub version: Option<String>,
    pub metadata: Metadata,
    pub history_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Versioned artifact store: one active slot and a history per task.
///
/// Readers get an immutable `Arc` snapshot of the active artifact from an
/// in-process cache. Writers are serialized per task and publish the new
/// snapshot only after every filesystem step has succeeded.
pub struct ArtifactStore {
    root: PathBuf,
    bundled_dir: Option<PathBuf>,
    cache: RwLock<HashMap<TaskType, Arc<ModelArtifact>>>,
    /// Serializes writers of a task, and cold loads against them.
    write_locks: [Mutex<()>; TASK_COUNT],
}

impl ArtifactStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root)?;
        info!(root = %config.root.display(), bundled = ?config.bundled_dir, "opened artifact store");
        Ok(Self {
            root: config.root,
            bundled_dir: config.bundled_dir,
            cache: RwLock::new(HashMap::new()),
            write_locks: std::array::from_fn(|_| Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, task: TaskType) -> PathBuf {
        self.root.join(task.as_str())
    }

    fn history_dir(&self, task: TaskType) -> PathBuf {
        self.task_dir(task).join(HISTORY_DIR)
    }

    fn active_paths(&self, task: TaskType) -> (PathBuf, PathBuf) {
        let dir = self.task_dir(task);
        (
            dir.join(format!("{}.{}", ACTIVE_STEM, ARTIFACT_EXT)),
            dir.join(format!("{}.{}", ACTIVE_STEM, RECORD_EXT)),
        )
    }

    fn history_paths(&self, task: TaskType, id: &HistoryId) -> (PathBuf, PathBuf) {
        let dir = self.history_dir(task);
        (
            dir.join(format!("{}.{}", id, ARTIFACT_EXT)),
            dir.join(format!("{}.{}", id, RECORD_EXT)),
        )
    }

    fn bundled_paths(&self, task: TaskType) -> Option<(PathBuf, PathBuf)> {
        self.bundled_dir.as_ref().map(|dir| {
            let dir = dir.join(task.as_str());
            (dir.join(BUNDLED_ARTIFACT), dir.join(BUNDLED_CONFIG))
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Resolve the active artifact: uploaded slot first, then the bundled
    /// default. A corrupt slot is reported, never skipped.
    pub fn lookup(&self, task: TaskType) -> Lookup {
        if let Some(artifact) = self.cache.read().get(&task) {
            return Lookup::Found(artifact.clone());
        }

        // Writers replace the payload and its record in two steps; loading
        // under the task's write lock never sees one without the other.
        let _guard = self.write_locks[task.index()].lock();
        if let Some(artifact) = self.cache.read().get(&task) {
            return Lookup::Found(artifact.clone());
        }

        let loaded = match self.load_from_disk(task) {
            Ok(Some(artifact)) => Arc::new(artifact),
            Ok(None) => return Lookup::NotFound,
            Err(reason) => {
                warn!(%task, %reason, "active artifact is corrupt");
                return Lookup::Corrupt(reason);
            }
        };

        debug!(%task, version = %loaded.version, "cached active artifact");
        self.cache.write().insert(task, loaded.clone());
        Lookup::Found(loaded)
    }

    /// The active artifact, or a typed error when absent or corrupt.
    pub fn get_active(&self, task: TaskType) -> Result<Arc<ModelArtifact>> {
        self.lookup(task).into_result(task)
    }

    fn load_from_disk(&self, task: TaskType) -> std::result::Result<Option<ModelArtifact>, String> {
        let (artifact_path, record_path) = self.active_paths(task);
        if let Some(bytes) = read_optional(&artifact_path).map_err(|e| e.to_string())? {
            let envelope = decode_for(task, &bytes)?;
            let record = read_record(&record_path).unwrap_or_else(|| {
                warn!(%task, "active artifact has no readable record");
                ArtifactRecord::new("unknown", Metadata::new())
            });
            return Ok(Some(ModelArtifact::from_envelope(
                envelope,
                record.version,
                ArtifactSource::Uploaded,
                record.metadata,
            )));
        }

        let Some((bundled_artifact, bundled_config)) = self.bundled_paths(task) else {
            return Ok(None);
        };
        let Some(bytes) = read_optional(&bundled_artifact).map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let envelope = decode_for(task, &bytes)?;
        let metadata = read_metadata_file(&bundled_config).unwrap_or_default();
        let version = metadata
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(BUNDLED_VERSION)
            .to_string();
        Ok(Some(ModelArtifact::from_envelope(
            envelope,
            version,
            ArtifactSource::Bundled,
            metadata,
        )))
    }

    /// Metadata of the task's model: uploaded, then bundled, then empty.
    pub fn get_metadata(&self, task: TaskType) -> Metadata {
        let (_, record_path) = self.active_paths(task);
        let bundled = self.bundled_paths(task).map(|(_, config)| config);
        let chain: FallbackChain<'_, TaskType, Metadata> = FallbackChain::new()
            .tier("uploaded", |_| read_record(&record_path).map(|r| r.metadata))
            .tier("bundled", |_| bundled.as_deref().and_then(read_metadata_file))
            .tier("empty", |_| Some(Metadata::new()));
        chain.resolve(&task).map(|r| r.value).unwrap_or_default()
    }

    /// Archived entries, most recent first. Payloads are not read.
    pub fn list_history(&self, task: TaskType) -> Result<Vec<HistoryEntry>> {
        history::scan(&self.history_dir(task))
    }

    /// Archived sidecar of one history entry.
    pub fn history_record(&self, task: TaskType, id: &str) -> Result<ArtifactRecord> {
        let id = HistoryId::parse(id)?;
        let (artifact_path, record_path) = self.history_paths(task, &id);
        if !artifact_path.exists() {
            return Err(Error::HistoryNotFound { task, id: id.to_string() });
        }
        Ok(read_record(&record_path).unwrap_or_else(|| ArtifactRecord::new("unknown", Metadata::new())))
    }

    pub fn status(&self, task: TaskType) -> ModelStatus {
        let history_count = self.list_history(task).map(|h| h.len()).unwrap_or(0);
        match self.lookup(task) {
            Lookup::Found(artifact) => ModelStatus {
                task,
                loaded: true,
                source: Some(artifact.source),
                version: Some(artifact.version.clone()),
                metadata: artifact.metadata.clone(),
                history_count,
                error: None,
            },
            Lookup::NotFound => ModelStatus {
                task,
                loaded: false,
                source: None,
                version: None,
                metadata: self.get_metadata(task),
                history_count,
                error: None,
            },
            Lookup::Corrupt(reason) => ModelStatus {
                task,
                loaded: false,
                source: None,
                version: None,
                metadata: self.get_metadata(task),
                history_count,
                error: Some(reason),
            },
        }
    }

    /// Drop the cached artifact; the next read reloads it from disk.
    pub fn invalidate(&self, task: TaskType) {
        if self.cache.write().remove(&task).is_some() {
            debug!(%task, "invalidated cached artifact");
        }
    }

    fn publish(&self, artifact: ModelArtifact) -> Arc<ModelArtifact> {
        let task = artifact.task;
        let artifact = Arc::new(artifact);
        self.cache.write().insert(task, artifact.clone());
        artifact
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Validate and install a new active artifact for `task`.
    ///
    /// Nothing on disk changes unless the bytes decode and validate. A
    /// previously active artifact is copied into history before the slot
    /// is overwritten.
    pub fn upload(&self, task: TaskType, bytes: &[u8], metadata: Metadata) -> Result<UploadReceipt> {
        let envelope = decode_for(task, bytes).map_err(|reason| {
            warn!(%task, %reason, "rejected artifact upload");
            Error::ArtifactCorrupt { task, reason }
        })?;

        let _guard = self.write_locks[task.index()].lock();
        let now = Utc::now();
        let archived = self.archive_active(task, HistoryKind::Archive, now)?;

        let version = history::version_stamp(now);
        let checksum = codec::checksum(bytes);
        let mut merged = metadata;
        merged.insert("upload_date".into(), Value::String(rfc3339(now)));
        merged.insert("task_type".into(), Value::String(task.as_str().to_string()));
        merged.insert("checksum".into(), Value::String(checksum.clone()));
        merged.insert("size_bytes".into(), Value::from(bytes.len() as u64));

        let record = ArtifactRecord::new(version.clone(), merged);
        self.install(task, bytes, &record)?;
        self.publish(ModelArtifact::from_envelope(
            envelope,
            version.clone(),
            ArtifactSource::Uploaded,
            record.metadata,
        ));

        info!(%task, %version, archived = ?archived.as_ref().map(HistoryId::as_str), "installed uploaded artifact");
        Ok(UploadReceipt {
            task,
            version,
            archived_as: archived.map(|id| id.to_string()),
            checksum,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Promote a history entry back to active, backing up the current one.
    ///
    /// The history entry itself is kept.
    pub fn restore(&self, task: TaskType, id: &str) -> Result<()> {
        let id = HistoryId::parse(id)?;
        let _guard = self.write_locks[task.index()].lock();

        let (artifact_path, record_path) = self.history_paths(task, &id);
        let Some(bytes) = read_optional(&artifact_path)? else {
            return Err(Error::HistoryNotFound { task, id: id.to_string() });
        };
        let envelope = decode_for(task, &bytes).map_err(|reason| Error::ArtifactCorrupt { task, reason })?;
        let archived = read_record(&record_path).unwrap_or_else(|| {
            warn!(%task, %id, "history entry has no readable record");
            ArtifactRecord::new("unknown", Metadata::new())
        });

        let now = Utc::now();
        let backup = self.archive_active(task, HistoryKind::Backup, now)?;

        let record = ArtifactRecord {
            restored_from: Some(id.to_string()),
            restored_at: Some(rfc3339(now)),
            ..archived
        };
        self.install(task, &bytes, &record)?;
        self.publish(ModelArtifact::from_envelope(
            envelope,
            record.version.clone(),
            ArtifactSource::Uploaded,
            record.metadata,
        ));

        info!(%task, %id, backup = ?backup.as_ref().map(HistoryId::as_str), "restored artifact from history");
        Ok(())
    }

    /// Remove one history entry. The active slot is never touched.
    pub fn delete(&self, task: TaskType, id: &str) -> Result<()> {
        if id == ACTIVE_STEM {
            return Err(Error::ActiveDeletion(task));
        }
        let id = HistoryId::parse(id)?;
        let _guard = self.write_locks[task.index()].lock();

        let (_, active_record) = self.active_paths(task);
        if read_record(&active_record).and_then(|r| r.restored_from).as_deref() == Some(id.as_str()) {
            return Err(Error::ActiveDeletion(task));
        }

        let (artifact_path, record_path) = self.history_paths(task, &id);
        if !artifact_path.exists() {
            return Err(Error::HistoryNotFound { task, id: id.to_string() });
        }
        std::fs::remove_file(&artifact_path)?;
        if record_path.exists() {
            std::fs::remove_file(&record_path)?;
        }

        info!(%task, %id, "deleted history entry");
        Ok(())
    }

    /// Copy the active slot into history. `None` when the slot is empty.
    fn archive_active(&self, task: TaskType, kind: HistoryKind, now: DateTime<Utc>) -> Result<Option<HistoryId>> {
        let (artifact_path, record_path) = self.active_paths(task);
        if !artifact_path.exists() {
            return Ok(None);
        }

        std::fs::create_dir_all(self.history_dir(task))?;
        let mut seq = 0;
        let id = loop {
            let candidate = HistoryId::generate(kind, now, seq);
            if !self.history_paths(task, &candidate).0.exists() {
                break candidate;
            }
            seq += 1;
        };

        let (history_artifact, history_record) = self.history_paths(task, &id);
        std::fs::copy(&artifact_path, &history_artifact)?;
        match read_record(&record_path) {
            Some(_) => {
                std::fs::copy(&record_path, &history_record)?;
            }
            None => write_atomic(
                &history_record,
                &serde_json::to_vec_pretty(&ArtifactRecord::new("unknown", Metadata::new()))?,
            )?,
        }

        debug!(%task, %id, "archived active artifact");
        Ok(Some(id))
    }

    fn install(&self, task: TaskType, bytes: &[u8], record: &ArtifactRecord) -> Result<()> {
        std::fs::create_dir_all(self.task_dir(task))?;
        let (artifact_path, record_path) = self.active_paths(task);
        write_atomic(&artifact_path, bytes)?;
        write_atomic(&record_path, &serde_json::to_vec_pretty(record)?)?;
        Ok(())
    }
}

fn decode_for(task: TaskType, bytes: &[u8]) -> std::result::Result<ArtifactEnvelope, String> {
    let envelope = codec::decode_envelope(bytes)?;
    envelope.validate(task)?;
    Ok(envelope)
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}

fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_record(path: &Path) -> Option<ArtifactRecord> {
    let bytes = read_optional(path).ok()??;
    match serde_json::from_slice(&bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable artifact record");
            None
        }
    }
}

fn read_metadata_file(path: &Path) -> Option<Metadata> {
    let bytes = read_optional(path).ok()??;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "bundled config is not a JSON object");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable bundled config");
            None
        }
    }
}
