//! Working-tree fingerprinting and change detection.
//!
//! A scan turns a directory into a [`FileState`]: a map from `/`-separated
//! paths (relative to the tracked root) to XXH3 content hashes. Two states are
//! compared with [`changes::diff`] to find what was added, modified, or deleted.
//!
//! # Architecture
//!
//! - [`ignore::IgnorePolicy`] - decides which paths take part in tracking
//! - [`scanner::TreeScanner`] - walks the tree and hashes every tracked file
//! - [`changes::ChangeSet`] - the result of comparing two states
//!
//! # Usage
//!
//! ```no_run
//! use snaptrack::tracking::ignore::IgnorePolicy;
//! use snaptrack::tracking::scanner::TreeScanner;
//! use snaptrack::tracking::changes;
//! use std::path::Path;
//!
//! let scanner = TreeScanner::new(IgnorePolicy::default());
//! let before = scanner.scan(Path::new("."));
//! // ... edit some files ...
//! let after = scanner.scan(Path::new("."));
//! let change_set = changes::diff(&before, &after);
//! println!("{} change(s)", change_set.len());
//! ```

/// Comparison of two file states.
pub mod changes;
/// Static exclusion rules for directories and file suffixes.
pub mod ignore;
/// Tree walker producing a [`FileState`].
pub mod scanner;

pub use changes::{Change, ChangeKind, ChangeSet};
pub use ignore::IgnorePolicy;
pub use scanner::{ScanReport, TreeScanner};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Fingerprint map of a tracked tree at one instant.
///
/// Keys are relative paths using `/` as the separator on every platform; values
/// are 32-character lowercase hex XXH3-128 digests. Ordered by path so
/// serialized metadata is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileState {
    /// Path → content hash.
    files: BTreeMap<String, String>,
}

impl FileState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no files are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Hash recorded for `path`, if tracked.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// True when `path` is tracked.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Iterates `(path, hash)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, h)| (p.as_str(), h.as_str()))
    }

    /// Iterates tracked paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Returns a copy without the given paths.
    #[must_use]
    pub fn without(&self, excluded: &[String]) -> Self {
        let mut files = self.files.clone();
        for path in excluded {
            files.remove(path);
        }
        Self { files }
    }
}

impl FromIterator<(String, String)> for FileState {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileState {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Converts a path relative to the tracked root into its canonical `/`-joined key.
///
/// Returns `None` for paths that cannot be represented as plain UTF-8
/// segments (non-UTF-8 names, `..`, or absolute components).
#[must_use]
pub fn canonical_key(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// True when every `/`-separated segment of `key` is a single plain name.
///
/// Empty keys and keys with empty, `.`, `..` or root segments are rejected.
#[must_use]
pub fn is_canonical_key(key: &str) -> bool {
    key.split('/').all(|segment| {
        let mut components = Path::new(segment).components();
        matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
    })
}

/// Resolves a canonical key back to a native path under `root`.
///
/// Keys read from snapshot metadata are not trusted: anything that fails
/// [`is_canonical_key`] resolves to `None` rather than a path outside `root`.
#[must_use]
pub fn resolve_key(root: &Path, key: &str) -> Option<PathBuf> {
    if !is_canonical_key(key) {
        return None;
    }
    Some(key.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_uses_forward_slashes() {
        let rel = Path::new("src").join("nested").join("main.rs");
        assert_eq!(canonical_key(&rel).as_deref(), Some("src/nested/main.rs"));
    }

    #[test]
    fn test_canonical_key_rejects_parent_components() {
        assert_eq!(canonical_key(Path::new("../escape.txt")), None);
        assert_eq!(canonical_key(Path::new("")), None);
    }

    #[test]
    fn test_resolve_key_round_trip() {
        let root = Path::new("/work");
        let resolved = resolve_key(root, "a/b/c.txt").unwrap();
        assert_eq!(resolved, root.join("a").join("b").join("c.txt"));
        assert_eq!(
            canonical_key(resolved.strip_prefix(root).unwrap()).as_deref(),
            Some("a/b/c.txt")
        );
    }

    #[test]
    fn test_resolve_key_refuses_escaping_keys() {
        let root = Path::new("/work");
        for key in ["", "/etc/passwd", "sub/../../escape.txt", "..", "a//b", "./a", "a/."] {
            assert!(!is_canonical_key(key), "{key:?} should be rejected");
            assert_eq!(resolve_key(root, key), None);
        }
        assert!(is_canonical_key("meta.json"));
        assert!(is_canonical_key("a/..b/c..txt"));
    }

    #[test]
    fn test_file_state_serializes_as_plain_map() {
        let state: FileState = [("b.txt".to_string(), "22".to_string()), ("a.txt".to_string(), "11".to_string())]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"a.txt":"11","b.txt":"22"}"#);
    }

    #[test]
    fn test_without_drops_paths() {
        let state: FileState = [("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
            .into_iter()
            .collect();
        let trimmed = state.without(&["a".to_string()]);
        assert_eq!(trimmed.len(), 1);
        assert!(trimmed.contains("b"));
        assert!(!trimmed.contains("a"));
    }
}
