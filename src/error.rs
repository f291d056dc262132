//! Typed failures returned by the tracking engine.
//!
//! Every engine operation returns [`Result`]. Per-file read problems during a
//! scan never surface here as a hard failure; they are collected as
//! [`ScanReadError`] values alongside the scanned state instead.

use crate::storage::SnapshotId;
use crate::tracking::FileState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// A single file that could not be fingerprinted during a scan.
///
/// Non-fatal: the file is left out of the resulting state.
#[derive(Debug, Error)]
#[error("could not read {}: {source}", .path.display())]
pub struct ScanReadError {
    /// Absolute path of the unreadable entry.
    pub path: PathBuf,
    /// Underlying cause.
    pub source: io::Error,
}

/// Errors surfaced by the engine to its callers.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A single unreadable file, when a caller asks for it to be treated as fatal.
    #[error(transparent)]
    ScanRead(#[from] ScanReadError),

    /// Filesystem failure while creating, copying into, or reading from the store.
    #[error("storage failure at {}: {source}", .path.display())]
    Storage {
        /// Path that could not be created, read, or written.
        path: PathBuf,
        /// Underlying cause.
        source: io::Error,
    },

    /// A snapshot's `meta.json` could not be encoded or decoded.
    #[error("malformed snapshot metadata at {}: {source}", .path.display())]
    Metadata {
        /// Path of the metadata file.
        path: PathBuf,
        /// Underlying cause.
        source: serde_json::Error,
    },

    /// Some stored copies were missing; every other file was restored.
    #[error(
        "snapshot {id} restored partially: {} file(s) missing from the store ({})",
        .missing.len(),
        .missing.join(", ")
    )]
    PartialRestore {
        /// Snapshot being restored.
        id: SnapshotId,
        /// Relative paths whose stored copy could not be found or copied.
        missing: Vec<String>,
        /// State that was actually written into the working tree.
        restored: FileState,
    },

    /// No snapshot with this identifier exists in the store.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// Invalid configuration value, rejected before anything was changed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The operation is not allowed in the session's current lifecycle state.
    #[error("session is {state}, cannot {operation}")]
    SessionState {
        /// Current lifecycle state name.
        state: &'static str,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// A background task thread could not be started.
    #[error("could not start {task} task: {source}")]
    TaskSpawn {
        /// Task name.
        task: &'static str,
        /// Underlying cause.
        source: io::Error,
    },

    /// Another live session already holds the marker for this working tree.
    #[error("another session is already tracking this directory (marker: {})", .marker.display())]
    SessionBusy {
        /// Marker file held by the other session.
        marker: PathBuf,
    },
}

impl TrackerError {
    /// Builds a [`TrackerError::Storage`] from an io error and the path involved.
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`TrackerError::Metadata`] for the given metadata file.
    pub(crate) fn metadata(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Metadata {
            path: path.into(),
            source,
        }
    }
}
