//! # modelvault Storage
//!
//! Versioned, file-backed artifact store. Each task owns one active slot and
//! a history directory:
//!
//! ```text
//! <root>/<task>/active.artifact
//! <root>/<task>/active.json
//! <root>/<task>/history/<id>.artifact
//! <root>/<task>/history/<id>.json
//! ```

pub mod codec;
pub mod config;
pub mod history;
pub mod store;

pub use codec::{checksum, decode_envelope, encode_envelope, MAX_ARTIFACT_BYTES};
pub use config::StoreConfig;
pub use history::{ArtifactRecord, HistoryEntry, HistoryId, HistoryKind};
pub use store::{ArtifactStore, Lookup, ModelStatus, UploadReceipt};
