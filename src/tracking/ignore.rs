//! Static exclusion rules.
//!
//! A path is ignored when any `/`-delimited segment is an excluded directory
//! name, or when the path ends with an excluded suffix. Rules are fixed when
//! the policy is built and never edited afterwards.

use crate::config::TrackingConfig;
use std::collections::HashSet;

/// Directory and path-segment names excluded by default.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "node_modules",
    ".pytest_cache",
];

/// File suffixes excluded by default.
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &[".pyc", ".pyo", ".pyd", ".so", ".git"];

/// Decides whether a relative path participates in tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePolicy {
    /// Excluded path segments.
    dirs: HashSet<String>,
    /// Excluded suffixes, matched against the whole path.
    extensions: Vec<String>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_IGNORE_DIRS.iter().copied(),
            DEFAULT_IGNORE_EXTENSIONS.iter().copied(),
        )
        .with_reserved(crate::DEFAULT_STORE_DIR, crate::DEFAULT_MARKER_NAME)
    }
}

impl IgnorePolicy {
    /// Builds a policy from explicit directory names and suffixes.
    pub fn new<D, E>(dirs: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the policy described by the `[tracking]` config section, with
    /// the store directory and session marker always excluded.
    #[must_use]
    pub fn from_config(tracking: &TrackingConfig, store_dir: &str, marker_name: &str) -> Self {
        Self::new(
            tracking.ignore_dirs.iter().cloned(),
            tracking.ignore_extensions.iter().cloned(),
        )
        .with_reserved(store_dir, marker_name)
    }

    /// Adds the tool's own artifacts so snapshots never capture snapshots.
    #[must_use]
    pub fn with_reserved(mut self, store_dir: &str, marker_name: &str) -> Self {
        self.dirs.insert(store_dir.to_string());
        self.dirs.insert(marker_name.to_string());
        self
    }

    /// True when `relative_path` (using `/` separators) must not be tracked.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        relative_path
            .split('/')
            .any(|segment| self.dirs.contains(segment))
            || self
                .extensions
                .iter()
                .any(|suffix| relative_path.ends_with(suffix.as_str()))
    }

    /// True when a single directory name is excluded outright.
    ///
    /// Used by the walker to prune whole subtrees without building the full
    /// relative path.
    #[must_use]
    pub fn is_ignored_dir_name(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }
}
