//! Tree scanner producing a [`FileState`] for a working directory.
//!
//! The `TreeScanner` walks the tracked root, prunes ignored directories,
//! and hashes every remaining regular file in parallel. A scan always
//! completes: entries that cannot be read are left out of the state and
//! reported as [`ScanReadError`]s instead of aborting the walk.

use super::ignore::IgnorePolicy;
use super::{FileState, canonical_key};
use crate::error::ScanReadError;
use crate::utils::hash::{DEFAULT_MMAP_THRESHOLD, hash_file};
use crate::utils::thread_pool::run_in_pool;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of a scan, including the files that had to be skipped.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Fingerprints of every file that could be read.
    pub state: FileState,
    /// Entries left out because they could not be read.
    pub skipped: Vec<ScanReadError>,
    /// Wall-clock time spent walking and hashing.
    pub duration: Duration,
}

/// Walks a tracked root and fingerprints every file the policy admits.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    /// Exclusion rules
    policy: IgnorePolicy,
    /// Whether to descend into symlinked directories
    follow_symlinks: bool,
    /// Files at or above this size are memory-mapped for hashing
    mmap_threshold: u64,
}

impl TreeScanner {
    /// Create a scanner with default walking options.
    #[must_use]
    pub const fn new(policy: IgnorePolicy) -> Self {
        Self {
            policy,
            follow_symlinks: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }

    /// Descend into symlinked directories (loops are detected and skipped).
    #[must_use]
    pub const fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Size at which hashing switches from reading to memory mapping.
    #[must_use]
    pub const fn mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Scan `root` and return the best-effort state, discarding skip details.
    #[must_use]
    pub fn scan(&self, root: &Path) -> FileState {
        self.scan_with_report(root).state
    }

    /// Scan `root` and return the state together with every skipped entry.
    #[must_use]
    pub fn scan_with_report(&self, root: &Path) -> ScanReport {
        let start = Instant::now();
        let mut skipped = Vec::new();
        let candidates = self.collect_candidates(root, &mut skipped);

        let hashed: Vec<Result<(String, String), ScanReadError>> = run_in_pool(|| {
            candidates
                .into_par_iter()
                .map(|(key, path)| match hash_file(&path, self.mmap_threshold) {
                    Ok(hash) => Ok((key, hash)),
                    Err(source) => Err(ScanReadError { path, source }),
                })
                .collect()
        });

        let mut files = Vec::with_capacity(hashed.len());
        for result in hashed {
            match result {
                Ok(entry) => files.push(entry),
                Err(err) => skipped.push(err),
            }
        }

        for err in &skipped {
            warn!(path = %err.path.display(), error = %err.source, "Skipping unreadable entry");
        }

        let state: FileState = files.into_iter().collect();
        let duration = start.elapsed();
        debug!(
            root = %root.display(),
            files = state.len(),
            skipped = skipped.len(),
            elapsed_ms = duration.as_millis(),
            "Scan complete"
        );

        ScanReport {
            state,
            skipped,
            duration,
        }
    }

    /// Paths of every tracked file under `root`, without hashing them.
    #[must_use]
    pub fn tracked_paths(&self, root: &Path) -> Vec<(String, PathBuf)> {
        let mut skipped = Vec::new();
        let paths = self.collect_candidates(root, &mut skipped);
        for err in &skipped {
            debug!(path = %err.path.display(), error = %err.source, "Unlisted entry");
        }
        paths
    }

    /// Mmap threshold used when hashing.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.mmap_threshold
    }

    /// Walk the tree and return `(key, absolute path)` for every tracked file.
    fn collect_candidates(
        &self,
        root: &Path,
        skipped: &mut Vec<ScanReadError>,
    ) -> Vec<(String, PathBuf)> {
        let mut candidates = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|e| !self.should_prune(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    skipped.push(ScanReadError {
                        path,
                        source: io::Error::from(err),
                    });
                    continue;
                }
            };

            match self.is_regular_file(&entry) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(source) => {
                    skipped.push(ScanReadError {
                        path: entry.path().to_path_buf(),
                        source,
                    });
                    continue;
                }
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let Some(key) = canonical_key(relative) else {
                skipped.push(ScanReadError {
                    path: entry.path().to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        "path is not valid UTF-8",
                    ),
                });
                continue;
            };

            if self.policy.is_ignored(&key) {
                continue;
            }

            candidates.push((key, entry.into_path()));
        }

        candidates
    }

    /// Directories whose name is excluded are not descended into.
    fn should_prune(&self, entry: &walkdir::DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.policy.is_ignored_dir_name(name))
    }

    /// Regular files, plus symlinks that resolve to regular files.
    fn is_regular_file(&self, entry: &walkdir::DirEntry) -> io::Result<bool> {
        if entry.file_type().is_file() {
            return Ok(true);
        }
        if entry.path_is_symlink() && !entry.file_type().is_dir() {
            return fs::metadata(entry.path()).map(|m| m.is_file());
        }
        Ok(false)
    }
}
