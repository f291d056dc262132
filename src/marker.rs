//! Session marker signalling that a tracker is active on a working tree.
//!
//! The marker is a small file at the tree root. Its presence is the external
//! signal; its contents (pid and start time) are informational only. While a
//! session runs the file is held under an exclusive advisory lock, so a second
//! session on the same tree is refused. The marker is removed when dropped.

use crate::error::{Result, TrackerError};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Holds the session marker for the lifetime of a session.
#[derive(Debug)]
pub struct SessionMarker {
    /// Locked marker handle
    file: File,
    /// Path to the marker (for removal and messages)
    path: PathBuf,
    /// Set once `release` has removed the file.
    removed: bool,
}

impl SessionMarker {
    /// Creates and locks the marker at `path`.
    ///
    /// A marker left behind by a session that no longer holds its lock is
    /// treated as stale and taken over.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SessionBusy`] if another live session holds the lock
    /// - [`TrackerError::Storage`] if the marker cannot be created or written
    pub fn acquire(path: &Path) -> Result<Self> {
        let existed = path.exists();

        // Opened without truncation: a held marker keeps its owner's contents.
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| TrackerError::storage(path, e))?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) => {
                return Err(TrackerError::SessionBusy {
                    marker: path.to_path_buf(),
                });
            }
            Err(e) => return Err(TrackerError::storage(path, e)),
        }

        if existed {
            warn!(marker = %path.display(), "Taking over stale session marker");
        }

        file.set_len(0).map_err(|e| TrackerError::storage(path, e))?;
        writeln!(
            file,
            "pid={}\nstarted={}",
            std::process::id(),
            humantime::format_rfc3339_seconds(SystemTime::now())
        )
        .map_err(|e| TrackerError::storage(path, e))?;

        debug!(marker = %path.display(), "Session marker acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            removed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the marker explicitly (normally handled by Drop).
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the marker cannot be removed.
    pub fn release(mut self) -> Result<()> {
        // Drop only unlocks from here on.
        self.removed = true;
        fs::remove_file(&self.path).map_err(|e| TrackerError::storage(&self.path, e))
    }
}

impl Drop for SessionMarker {
    fn drop(&mut self) {
        if !self.removed
            && let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(marker = %self.path.display(), error = %e, "Failed to remove session marker");
        }
        let _ = FileExt::unlock(&self.file);
    }
}
