/// Full-copy snapshot persistence
pub mod snapshots;

pub use snapshots::SnapshotStore;

use crate::tracking::FileState;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of snapshot identifiers and of the `timestamp` metadata field.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifier of a snapshot: its local creation time, `YYYYMMDD_HHMMSS`.
///
/// Identifiers sort lexicographically in creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Identifier for the current local second.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    #[must_use]
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at.format(SNAPSHOT_ID_FORMAT).to_string())
    }

    /// Parses a user-supplied identifier, returning `None` if it is not a
    /// valid `YYYYMMDD_HHMMSS` timestamp.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(raw, SNAPSHOT_ID_FORMAT)
            .ok()
            .map(|_| Self(raw.to_string()))
    }

    /// Wraps a string without validation.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The time encoded in the identifier, if well formed.
    #[must_use]
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, SNAPSHOT_ID_FORMAT).ok()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Contents of a snapshot's `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// User-supplied comment, possibly empty.
    pub comment: String,
    /// Same string as the snapshot identifier.
    pub timestamp: String,
    /// State captured at save time.
    pub files: FileState,
}

/// One entry of [`SnapshotStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub comment: String,
    pub file_count: usize,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Identifier of the new snapshot.
    pub id: SnapshotId,
    /// Paths recorded in metadata that have no stored copy, such as files
    /// that vanished before they were copied or a root-level `meta.json`.
    pub omitted: Vec<String>,
}

/// How a restore treats files that are not part of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestoreMode {
    /// Write the snapshot's files and leave everything else alone.
    #[default]
    Overlay,
    /// Also delete tracked files the snapshot does not contain.
    Reconcile,
}

/// A stored copy that does not match its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerifyIssue {
    /// No stored copy for a recorded path.
    Missing(String),
    /// Stored copy hashes differently than recorded.
    Corrupted {
        path: String,
        expected: String,
        actual: String,
    },
}

impl VerifyIssue {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Missing(path) | Self::Corrupted { path, .. } => path,
        }
    }
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "missing: {path}"),
            Self::Corrupted {
                path,
                expected,
                actual,
            } => write!(f, "corrupted: {path} (expected {expected}, found {actual})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_snapshot_id_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        let id = SnapshotId::from_datetime(at);
        assert_eq!(id.as_str(), "20240309_070501");
        assert_eq!(id.datetime(), Some(at));
    }

    #[test]
    fn test_snapshot_id_parse_rejects_garbage() {
        assert!(SnapshotId::parse("20240101_120000").is_some());
        assert!(SnapshotId::parse("latest").is_none());
        assert!(SnapshotId::parse("20241301_000000").is_none());
        assert!(SnapshotId::parse("../etc").is_none());
    }

    #[test]
    fn test_snapshot_ids_order_chronologically() {
        let older = SnapshotId::from_raw("20231231_235959");
        let newer = SnapshotId::from_raw("20240101_000000");
        assert!(older < newer);
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = SnapshotMeta {
            comment: "checkpoint".into(),
            timestamp: "20240101_120000".into(),
            files: [("a.txt".to_string(), "ff".to_string())].into_iter().collect(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["comment"], "checkpoint");
        assert_eq!(value["timestamp"], "20240101_120000");
        assert_eq!(value["files"]["a.txt"], "ff");
    }
}
