//! History identifiers and listings
//!
//! Archived artifacts are named `model_<stamp>` when superseded by an upload
//! and `model_backup_<stamp>` when superseded by a restore. The stamp is
//! `YYYYmmdd_HHMMSS_ffffff` in UTC; a trailing `_<n>` separates entries
//! created within the same microsecond.

use chrono::{DateTime, NaiveDateTime, Utc};
use modelvault_core::{Error, Metadata, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const ARCHIVE_PREFIX: &str = "model_";
const BACKUP_PREFIX: &str = "model_backup_";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const STAMP_LEN: usize = 22;

pub(crate) const ARTIFACT_EXT: &str = "artifact";
pub(crate) const RECORD_EXT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Superseded by an upload.
    Archive,
    /// Superseded by a restore.
    Backup,
}

/// A validated history entry id. Safe to join onto a directory path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryId {
    raw: String,
    kind: HistoryKind,
    stamp: String,
    seq: u32,
}

impl HistoryId {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidHistoryId(raw.to_string());

        let (kind, rest) = if let Some(rest) = raw.strip_prefix(BACKUP_PREFIX) {
            (HistoryKind::Backup, rest)
        } else if let Some(rest) = raw.strip_prefix(ARCHIVE_PREFIX) {
            (HistoryKind::Archive, rest)
        } else {
            return Err(invalid());
        };

        if rest.len() < STAMP_LEN || !rest.is_char_boundary(STAMP_LEN) {
            return Err(invalid());
        }
        let (stamp, suffix) = rest.split_at(STAMP_LEN);
        let shape_ok = stamp.char_indices().all(|(i, c)| match i {
            8 | 15 => c == '_',
            _ => c.is_ascii_digit(),
        });
        if !shape_ok {
            return Err(invalid());
        }
        let seq = match suffix {
            "" => 0,
            s => s
                .strip_prefix('_')
                .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(invalid)?,
        };

        Ok(Self {
            raw: raw.to_string(),
            kind,
            stamp: stamp.to_string(),
            seq,
        })
    }

    /// Fresh id stamped with `now`, with collision sequence `seq`.
    pub(crate) fn generate(kind: HistoryKind, now: DateTime<Utc>, seq: u32) -> Self {
        let stamp = now.format(STAMP_FORMAT).to_string();
        let prefix = match kind {
            HistoryKind::Archive => ARCHIVE_PREFIX,
            HistoryKind::Backup => BACKUP_PREFIX,
        };
        let raw = if seq == 0 {
            format!("{}{}", prefix, stamp)
        } else {
            format!("{}{}_{}", prefix, stamp, seq)
        };
        Self { raw, kind, stamp, seq }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn kind(&self) -> HistoryKind {
        self.kind
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_stamp(&self.stamp)
    }

    /// Ordering key; larger means more recent.
    fn recency(&self) -> (&str, u32, &str) {
        (&self.stamp, self.seq, &self.raw)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Version string for a fresh upload.
pub(crate) fn version_stamp(now: DateTime<Utc>) -> String {
    now.format(STAMP_FORMAT).to_string()
}

fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    let (seconds, micros) = stamp.split_at(15);
    let base = NaiveDateTime::parse_from_str(seconds, "%Y%m%d_%H%M%S").ok()?;
    let micros: i64 = micros.trim_start_matches('_').parse().ok()?;
    base.checked_add_signed(chrono::Duration::microseconds(micros))
        .map(|dt| dt.and_utc())
}

/// Sidecar written next to every installed or archived artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_at: Option<String>,
}

impl ArtifactRecord {
    pub fn new(version: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            version: version.into(),
            metadata,
            restored_from: None,
            restored_at: None,
        }
    }
}

/// One row of a history listing. Payload bytes are never read to build it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub kind: HistoryKind,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Scan a task's history directory, most recent first.
///
/// Files that are not named like history artifacts are ignored.
pub(crate) fn scan(dir: &Path) -> Result<Vec<HistoryEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(id) = HistoryId::parse(stem) {
            let size = entry.metadata()?.len();
            ids.push((id, size));
        }
    }

    ids.sort_by(|(a, _), (b, _)| b.recency().cmp(&a.recency()));
    Ok(ids
        .into_iter()
        .map(|(id, size_bytes)| HistoryEntry {
            created_at: id.created_at(),
            kind: id.kind(),
            id: id.raw,
            size_bytes,
        })
        .collect())
}
