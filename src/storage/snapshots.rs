use super::{RestoreMode, SaveReport, SnapshotId, SnapshotMeta, SnapshotSummary, VerifyIssue};
use crate::error::{Result, TrackerError};
use crate::tracking::{FileState, IgnorePolicy, TreeScanner, resolve_key};
use crate::utils::hash::hash_file;
use crate::utils::thread_pool::run_in_pool;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the metadata record inside each snapshot directory.
pub const META_FILE: &str = "meta.json";

/// Prefix of in-progress snapshot directories.
const STAGING_PREFIX: &str = ".staging-";

/// Attempts at publishing a snapshot before giving up on id collisions.
const MAX_PUBLISH_ATTEMPTS: usize = 5;

/// Flat store of full-copy snapshots under one directory.
///
/// Each snapshot lives in `<store>/<YYYYMMDD_HHMMSS>/` and holds a copy of
/// every captured file at its original relative path plus `meta.json`.
/// Snapshots are assembled in a hidden staging directory and renamed into
/// place, so a listed snapshot is always complete.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    /// Decides which working-tree files a reconciling restore may delete,
    /// and how large stored copies are hashed during verification.
    scanner: TreeScanner,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            scanner: TreeScanner::new(IgnorePolicy::default()),
        }
    }

    /// Use `scanner`'s ignore rules for reconciling restores.
    #[must_use]
    pub fn with_scanner(mut self, scanner: TreeScanner) -> Self {
        self.scanner = scanner;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True once the store directory has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Creates the store directory (and parents) if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the directory cannot be created.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| TrackerError::storage(&self.dir, e))
    }

    /// Directory holding snapshot `id`.
    #[must_use]
    pub fn snapshot_dir(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    /// Persists `state` as a new snapshot, copying each file from `root`.
    ///
    /// A file that can no longer be copied is left out of the stored copies
    /// and reported in [`SaveReport::omitted`]; the metadata still records
    /// the full scanned state. A root-level `meta.json` is always omitted,
    /// since the metadata record occupies that name.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the snapshot directory or a
    /// parent directory cannot be created, or if metadata cannot be written.
    pub fn save(&self, root: &Path, state: &FileState, comment: &str) -> Result<SaveReport> {
        self.save_with(root, state, |_| comment.to_string())
    }

    /// Like [`SnapshotStore::save`], with the comment built from the
    /// allocated identifier.
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::save`].
    pub fn save_with<F>(&self, root: &Path, state: &FileState, comment_for: F) -> Result<SaveReport>
    where
        F: Fn(&SnapshotId) -> String,
    {
        self.create()?;

        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let id = self.allocate_id()?;
            let staging = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempdir_in(&self.dir)
                .map_err(|e| TrackerError::storage(&self.dir, e))?;

            let omitted = copy_tree(staging.path(), root, state, CopyDirection::IntoStaging)?;

            let comment = comment_for(&id);
            let meta = SnapshotMeta {
                comment: comment.clone(),
                timestamp: id.to_string(),
                files: state.clone(),
            };
            write_meta(&staging.path().join(META_FILE), &meta)?;

            let target = self.snapshot_dir(&id);
            if target.exists() {
                // Another writer published this second first; staging is dropped.
                debug!(id = %id, "Snapshot id taken, retrying");
                continue;
            }
            fs::rename(staging.path(), &target).map_err(|e| TrackerError::storage(&target, e))?;
            let _ = staging.keep();

            for path in &omitted {
                warn!(id = %id, path = %path, "File left out of the stored copies");
            }
            info!(
                id = %id,
                files = state.len(),
                omitted = omitted.len(),
                comment = %comment,
                "Saved snapshot"
            );
            return Ok(SaveReport { id, omitted });
        }

        Err(TrackerError::storage(
            &self.dir,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "could not allocate a unique snapshot id",
            ),
        ))
    }

    /// Every readable snapshot, oldest first.
    ///
    /// Directories whose metadata is missing or malformed are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the store directory cannot be read.
    pub fn list(&self) -> Result<Vec<SnapshotSummary>> {
        let mut summaries: Vec<SnapshotSummary> = self
            .snapshot_ids()?
            .into_iter()
            .filter_map(|id| match self.load(&id) {
                Ok(meta) => Some(SnapshotSummary {
                    id,
                    comment: meta.comment,
                    file_count: meta.files.len(),
                }),
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping unreadable snapshot");
                    None
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// Newest readable snapshot, if any.
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::list`].
    pub fn latest(&self) -> Result<Option<SnapshotSummary>> {
        Ok(self.list()?.pop())
    }

    /// Reads the metadata of snapshot `id`.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SnapshotNotFound`] if no such snapshot exists
    /// - [`TrackerError::Storage`] if `meta.json` cannot be read
    /// - [`TrackerError::Metadata`] if `meta.json` is malformed
    pub fn load(&self, id: &SnapshotId) -> Result<SnapshotMeta> {
        let dir = self.resolve(id)?;
        let path = dir.join(META_FILE);
        let bytes = fs::read(&path).map_err(|e| TrackerError::storage(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| TrackerError::metadata(&path, e))
    }

    /// Overlays snapshot `id` onto `root`. See [`SnapshotStore::restore_with`].
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::restore_with`].
    pub fn restore(&self, id: &SnapshotId, root: &Path) -> Result<FileState> {
        self.restore_with(id, root, RestoreMode::Overlay)
    }

    /// Copies every file recorded in snapshot `id` back under `root`,
    /// creating parents and overwriting existing files.
    ///
    /// Files that cannot be written are reported as missing and the rest are
    /// still restored. This covers a parent directory that cannot be created,
    /// a recorded path that would leave `root`, and a root-level `meta.json`,
    /// whose content a snapshot cannot hold.
    ///
    /// With [`RestoreMode::Reconcile`], tracked files the snapshot does not
    /// contain are deleted afterwards. Ignored files are never touched.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SnapshotNotFound`] for an unknown id
    /// - [`TrackerError::Storage`] / [`TrackerError::Metadata`] if the metadata
    ///   cannot be read
    /// - [`TrackerError::PartialRestore`] if some files could not be restored;
    ///   every other file has been restored and the error carries that state
    pub fn restore_with(&self, id: &SnapshotId, root: &Path, mode: RestoreMode) -> Result<FileState> {
        let meta = self.load(id)?;
        let source = self.snapshot_dir(id);

        let missing = copy_tree(&source, root, &meta.files, CopyDirection::IntoTree)?;

        if mode == RestoreMode::Reconcile {
            self.remove_extraneous(root, &meta.files);
        }

        if missing.is_empty() {
            info!(id = %id, files = meta.files.len(), ?mode, "Restored snapshot");
            Ok(meta.files)
        } else {
            let restored = meta.files.without(&missing);
            warn!(
                id = %id,
                restored = restored.len(),
                missing = missing.len(),
                "Snapshot restored partially"
            );
            Err(TrackerError::PartialRestore {
                id: id.clone(),
                missing,
                restored,
            })
        }
    }

    /// Re-hashes every stored copy of snapshot `id` against its metadata.
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::load`].
    pub fn verify(&self, id: &SnapshotId) -> Result<Vec<VerifyIssue>> {
        let meta = self.load(id)?;
        let dir = self.snapshot_dir(id);
        let threshold = self.scanner.threshold();
        let entries: Vec<(&str, &str)> = meta.files.iter().collect();

        let issues = run_in_pool(|| {
            entries
                .par_iter()
                .filter_map(|(key, expected)| {
                    let stored = stored_copy(&dir, key);
                    match stored.map(|path| hash_file(&path, threshold)) {
                        Some(Ok(actual)) if actual == *expected => None,
                        Some(Ok(actual)) => Some(VerifyIssue::Corrupted {
                            path: (*key).to_string(),
                            expected: (*expected).to_string(),
                            actual,
                        }),
                        Some(Err(_)) | None => Some(VerifyIssue::Missing((*key).to_string())),
                    }
                })
                .collect::<Vec<_>>()
        });

        debug!(id = %id, issues = issues.len(), "Verified snapshot");
        Ok(issues)
    }

    /// Directory of an existing snapshot, or `SnapshotNotFound`.
    fn resolve(&self, id: &SnapshotId) -> Result<PathBuf> {
        if SnapshotId::parse(id.as_str()).is_none() {
            return Err(TrackerError::SnapshotNotFound(id.to_string()));
        }
        let dir = self.snapshot_dir(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(TrackerError::SnapshotNotFound(id.to_string()))
        }
    }

    /// Identifiers of every snapshot directory, unsorted.
    fn snapshot_ids(&self) -> Result<Vec<SnapshotId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrackerError::storage(&self.dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TrackerError::storage(&self.dir, e))?;
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(SnapshotId::parse) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Picks an id strictly newer than every existing snapshot.
    ///
    /// Within the newest snapshot's second this waits for the next one, once.
    /// When the clock is behind the newest id (a future-dated directory or a
    /// clock step backwards), the id continues one second after it instead.
    fn allocate_id(&self) -> Result<SnapshotId> {
        let Some(newest) = self.snapshot_ids()?.into_iter().max() else {
            return Ok(SnapshotId::now());
        };

        let mut id = SnapshotId::now();
        if id == newest {
            let into_second = chrono::Local::now().timestamp_subsec_millis();
            let wait = 1000u64.saturating_sub(u64::from(into_second)).max(1);
            std::thread::sleep(Duration::from_millis(wait));
            id = SnapshotId::now();
        }
        if id > newest {
            return Ok(id);
        }

        let next = newest
            .datetime()
            .and_then(|at| at.checked_add_signed(chrono::Duration::seconds(1)))
            .map(SnapshotId::from_datetime)
            .ok_or_else(|| {
                TrackerError::storage(
                    self.snapshot_dir(&newest),
                    io::Error::new(io::ErrorKind::InvalidData, "no snapshot id follows this one"),
                )
            })?;
        warn!(newest = %newest, id = %next, "Clock is behind the newest snapshot");
        Ok(next)
    }

    /// Deletes tracked files under `root` that `keep` does not list.
    fn remove_extraneous(&self, root: &Path, keep: &FileState) {
        let wanted: HashSet<&str> = keep.paths().collect();
        for (key, path) in self.scanner.tracked_paths(root) {
            if wanted.contains(key.as_str()) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %key, "Removed file absent from snapshot"),
                Err(e) => warn!(path = %key, error = %e, "Could not remove extraneous file"),
            }
        }
    }
}

/// Which way [`copy_tree`] is copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyDirection {
    /// Working tree into a fresh staging directory. A parent directory that
    /// cannot be created there aborts the save.
    IntoStaging,
    /// Snapshot back onto the working tree. Every failure is per file.
    IntoTree,
}

/// Path of the stored copy of `key` inside snapshot directory `dir`.
///
/// `None` for keys with no stored copy: non-canonical keys and the root
/// `meta.json`, which holds the metadata record instead.
fn stored_copy(dir: &Path, key: &str) -> Option<PathBuf> {
    if key == META_FILE {
        return None;
    }
    resolve_key(dir, key)
}

/// Copies every file of `state` between a snapshot directory and the
/// working tree, in `direction`.
///
/// Returns the paths that could not be copied.
fn copy_tree(snapshot: &Path, tree: &Path, state: &FileState, direction: CopyDirection) -> Result<Vec<String>> {
    let keys: Vec<&str> = state.paths().collect();

    let outcomes: Vec<Result<Option<String>>> = run_in_pool(|| {
        keys.par_iter()
            .map(|key| -> Result<Option<String>> {
                let (Some(stored), Some(working)) = (stored_copy(snapshot, key), resolve_key(tree, key)) else {
                    debug!(path = %key, "Path has no stored copy, skipping");
                    return Ok(Some((*key).to_string()));
                };
                let (src, dst) = match direction {
                    CopyDirection::IntoStaging => (working, stored),
                    CopyDirection::IntoTree => (stored, working),
                };
                if let Some(parent) = dst.parent()
                    && let Err(e) = fs::create_dir_all(parent)
                {
                    if direction == CopyDirection::IntoStaging {
                        return Err(TrackerError::storage(parent, e));
                    }
                    debug!(path = %key, error = %e, "Could not create parent directory");
                    return Ok(Some((*key).to_string()));
                }
                match fs::copy(&src, &dst) {
                    Ok(_) => {
                        debug!(path = %key, "Copied");
                        Ok(None)
                    }
                    Err(e) => {
                        debug!(path = %key, error = %e, "Copy failed");
                        Ok(Some((*key).to_string()))
                    }
                }
            })
            .collect()
    });

    let mut failed = Vec::new();
    for outcome in outcomes {
        if let Some(key) = outcome? {
            failed.push(key);
        }
    }
    Ok(failed)
}

fn write_meta(path: &Path, meta: &SnapshotMeta) -> Result<()> {
    let json = serde_json::to_vec_pretty(meta).map_err(|e| TrackerError::metadata(path, e))?;
    fs::write(path, json).map_err(|e| TrackerError::storage(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn setup() -> Result<(tempfile::TempDir, SnapshotStore, TreeScanner)> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join(".saves"));
        let scanner = TreeScanner::new(IgnorePolicy::default());
        Ok((dir, store, scanner))
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        fs::create_dir_all(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub/b.txt"), "y")?;

        let state = scanner.scan(dir.path());
        let report = store.save(dir.path(), &state, "first")?;
        assert!(report.omitted.is_empty());

        let meta = store.load(&report.id)?;
        assert_eq!(meta.comment, "first");
        assert_eq!(meta.timestamp, report.id.as_str());
        assert_eq!(meta.files, state);

        let snap = store.snapshot_dir(&report.id);
        assert_eq!(fs::read_to_string(snap.join("a.txt"))?, "x");
        assert_eq!(fs::read_to_string(snap.join("sub/b.txt"))?, "y");
        assert!(snap.join(META_FILE).exists());

        Ok(())
    }

    #[test]
    fn test_save_leaves_no_staging_dirs() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        store.save(dir.path(), &scanner.scan(dir.path()), "")?;

        let leftovers = fs::read_dir(store.dir())?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[test]
    fn test_save_omits_vanished_file() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("keep.txt"), "k")?;
        fs::write(dir.path().join("gone.txt"), "g")?;
        let state = scanner.scan(dir.path());
        fs::remove_file(dir.path().join("gone.txt"))?;

        let report = store.save(dir.path(), &state, "racy")?;
        assert_eq!(report.omitted, vec!["gone.txt"]);
        // Metadata still carries the scanned state
        assert!(store.load(&report.id)?.files.contains("gone.txt"));
        Ok(())
    }

    #[test]
    fn test_ids_strictly_increase() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        let state = scanner.scan(dir.path());

        let first = store.save(dir.path(), &state, "one")?.id;
        let second = store.save(dir.path(), &state, "two")?.id;
        assert!(second > first);

        let listed: Vec<_> = store.list()?.into_iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![first, second]);
        Ok(())
    }

    #[test]
    fn test_list_skips_malformed_metadata() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        let good = store.save(dir.path(), &scanner.scan(dir.path()), "good")?.id;

        fs::create_dir_all(store.dir().join("20000101_000000"))?;
        fs::write(store.dir().join("20000101_000000").join(META_FILE), "{not json")?;
        fs::create_dir_all(store.dir().join("20000102_000000"))?;
        fs::create_dir_all(store.dir().join("not-a-snapshot"))?;

        let listed = store.list()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good);
        assert_eq!(listed[0].comment, "good");
        assert_eq!(listed[0].file_count, 1);
        Ok(())
    }

    #[test]
    fn test_list_on_missing_store_is_empty() -> Result<()> {
        let (_dir, store, _) = setup()?;
        assert!(store.list()?.is_empty());
        assert!(store.latest()?.is_none());
        Ok(())
    }

    #[test]
    fn test_load_malformed_is_metadata_error() -> Result<()> {
        let (_dir, store, _) = setup()?;
        let id = SnapshotId::from_raw("20000101_000000");
        fs::create_dir_all(store.snapshot_dir(&id))?;
        fs::write(store.snapshot_dir(&id).join(META_FILE), "[]")?;

        assert!(matches!(store.load(&id), Err(TrackerError::Metadata { .. })));
        Ok(())
    }

    #[test]
    fn test_restore_unknown_id() -> Result<()> {
        let (dir, store, _) = setup()?;
        store.create()?;
        let result = store.restore(&SnapshotId::from_raw("19990101_000000"), dir.path());
        assert!(matches!(result, Err(TrackerError::SnapshotNotFound(_))));

        let traversal = store.restore(&SnapshotId::from_raw(".."), dir.path());
        assert!(matches!(traversal, Err(TrackerError::SnapshotNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_restore_overlays_and_keeps_extraneous() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        let state = scanner.scan(dir.path());
        let id = store.save(dir.path(), &state, "")?.id;

        fs::write(dir.path().join("a.txt"), "changed")?;
        fs::write(dir.path().join("extra.txt"), "new")?;

        let restored = store.restore(&id, dir.path())?;
        assert_eq!(restored, state);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "x");
        assert!(dir.path().join("extra.txt").exists());
        Ok(())
    }

    #[test]
    fn test_restore_reconcile_removes_tracked_extras_only() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        let id = store.save(dir.path(), &scanner.scan(dir.path()), "")?.id;

        fs::write(dir.path().join("extra.txt"), "new")?;
        fs::create_dir_all(dir.path().join(".git"))?;
        fs::write(dir.path().join(".git/HEAD"), "ref")?;

        store.restore_with(&id, dir.path(), RestoreMode::Reconcile)?;
        assert!(!dir.path().join("extra.txt").exists());
        assert!(dir.path().join(".git/HEAD").exists());
        assert_eq!(scanner.scan(dir.path()), store.load(&id)?.files);
        Ok(())
    }

    #[test]
    fn test_restore_missing_copy_is_partial() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        fs::write(dir.path().join("b.txt"), "y")?;
        let id = store.save(dir.path(), &scanner.scan(dir.path()), "")?.id;

        fs::remove_file(store.snapshot_dir(&id).join("b.txt"))?;
        fs::remove_file(dir.path().join("a.txt"))?;

        match store.restore(&id, dir.path()) {
            Err(TrackerError::PartialRestore {
                missing, restored, ..
            }) => {
                assert_eq!(missing, vec!["b.txt"]);
                assert_eq!(restored.len(), 1);
                assert!(restored.contains("a.txt"));
            }
            other => panic!("expected partial restore, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "x");
        Ok(())
    }

    #[test]
    fn test_future_dated_snapshot_does_not_block_save() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        let state = scanner.scan(dir.path());
        fs::create_dir_all(store.snapshot_dir(&SnapshotId::from_raw("20991231_235959")))?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let root = dir.path().to_path_buf();
        let saver = store.clone();
        std::thread::spawn(move || {
            let _ = tx.send(saver.save(&root, &state, "skewed"));
        });

        let report = rx
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| anyhow::anyhow!("save still blocked after 10s"))??;
        assert_eq!(report.id.as_str(), "21000101_000000");
        assert_eq!(store.latest()?.map(|s| s.id), Some(report.id));
        Ok(())
    }

    #[test]
    fn test_root_meta_json_is_never_overwritten() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join(META_FILE), r#"{"user":"data"}"#)?;
        fs::create_dir_all(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join(META_FILE), "nested")?;
        let state = scanner.scan(dir.path());

        let report = store.save(dir.path(), &state, "c")?;
        assert_eq!(report.omitted, vec![META_FILE]);
        assert_eq!(store.load(&report.id)?.files, state);
        assert_eq!(
            fs::read_to_string(store.snapshot_dir(&report.id).join("sub").join(META_FILE))?,
            "nested"
        );

        fs::write(dir.path().join(META_FILE), "edited")?;
        match store.restore(&report.id, dir.path()) {
            Err(TrackerError::PartialRestore {
                missing, restored, ..
            }) => {
                assert_eq!(missing, vec![META_FILE]);
                assert!(restored.contains("sub/meta.json"));
            }
            other => panic!("expected partial restore, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(dir.path().join(META_FILE))?, "edited");
        assert_eq!(store.verify(&report.id)?, vec![VerifyIssue::Missing(META_FILE.into())]);
        Ok(())
    }

    #[test]
    fn test_restore_never_writes_outside_root() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("work");
        fs::create_dir_all(root.join("sub"))?;
        fs::write(root.join("a.txt"), "x")?;
        let store = SnapshotStore::new(root.join(".saves"));
        let id = store.save(&root, &TreeScanner::new(IgnorePolicy::default()).scan(&root), "")?.id;

        // Hand-edited metadata pointing above the root, with a source to copy
        let snap = store.snapshot_dir(&id);
        let evil = "sub/../../escape.txt";
        let mut meta = store.load(&id)?;
        meta.files = meta
            .files
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .chain([(evil.to_string(), "0".repeat(32))])
            .collect();
        write_meta(&snap.join(META_FILE), &meta)?;
        fs::create_dir_all(snap.join("sub"))?;
        fs::write(store.dir().join("escape.txt"), "payload")?;

        match store.restore(&id, &root) {
            Err(TrackerError::PartialRestore { missing, .. }) => assert_eq!(missing, vec![evil]),
            other => panic!("expected partial restore, got {other:?}"),
        }
        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(fs::read_to_string(root.join("a.txt"))?, "x");
        assert_eq!(store.verify(&id)?, vec![VerifyIssue::Missing(evil.into())]);
        Ok(())
    }

    #[test]
    fn test_restore_continues_past_blocked_parent() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        fs::create_dir_all(dir.path().join("d"))?;
        fs::write(dir.path().join("d/b.txt"), "b")?;
        let id = store.save(dir.path(), &scanner.scan(dir.path()), "")?.id;

        fs::remove_dir_all(dir.path().join("d"))?;
        fs::write(dir.path().join("d"), "now a file")?;
        fs::write(dir.path().join("a.txt"), "y")?;

        match store.restore(&id, dir.path()) {
            Err(TrackerError::PartialRestore {
                missing, restored, ..
            }) => {
                assert_eq!(missing, vec!["d/b.txt"]);
                assert_eq!(restored.paths().collect::<Vec<_>>(), vec!["a.txt"]);
            }
            other => panic!("expected partial restore, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "x");
        Ok(())
    }

    #[test]
    fn test_verify_reports_missing_and_corrupted() -> Result<()> {
        let (dir, store, scanner) = setup()?;
        fs::write(dir.path().join("a.txt"), "x")?;
        fs::write(dir.path().join("b.txt"), "y")?;
        fs::write(dir.path().join("c.txt"), "z")?;
        let id = store.save(dir.path(), &scanner.scan(dir.path()), "")?.id;
        assert!(store.verify(&id)?.is_empty());

        fs::write(store.snapshot_dir(&id).join("a.txt"), "tampered")?;
        fs::remove_file(store.snapshot_dir(&id).join("c.txt"))?;

        let issues = store.verify(&id)?;
        assert_eq!(issues.len(), 2);
        assert!(matches!(&issues[0], VerifyIssue::Corrupted { path, .. } if path == "a.txt"));
        assert_eq!(issues[1], VerifyIssue::Missing("c.txt".into()));
        Ok(())
    }
}
