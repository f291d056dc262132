pub mod validator;

use crate::error::TrackerError;
use crate::tracking::ignore::{DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_EXTENSIONS};
use crate::tracking::{IgnorePolicy, TreeScanner};
use crate::utils::hash::DEFAULT_MMAP_THRESHOLD;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "SNAPTRACK_CONFIG_PATH";

/// Legal autosave intervals, in minutes.
pub const AUTOSAVE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Where snapshots and the session marker live inside the tracked root
    #[serde(default)]
    pub store: StoreConfig,

    /// Poll and autosave timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir_name: String,
    #[serde(default = "default_marker_name")]
    pub marker_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub autosave_enabled: bool,
    #[serde(default = "default_autosave_interval_minutes")]
    pub autosave_interval_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Hashing workers; capped at the cpu count, 0 picks automatically
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
    #[serde(default = "default_mmap_threshold")]
    pub mmap_threshold: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: default_ignore_dirs(),
            ignore_extensions: default_ignore_extensions(),
            follow_symlinks: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir_name: default_store_dir(),
            marker_name: default_marker_name(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            autosave_enabled: false,
            autosave_interval_minutes: default_autosave_interval_minutes(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }
}

impl ScheduleConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Resolve the configuration path: explicit flag, then
    /// `SNAPTRACK_CONFIG_PATH`, then the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no platform config directory can be determined.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("snaptrack").join("config.toml"))
            .context("Could not determine config directory")
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories or write the default file
    /// - Cannot read the configuration file or it contains invalid TOML
    /// - A value is out of range
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Range checks on values serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] naming the first invalid value.
    pub fn validate(&self) -> crate::Result<()> {
        validate_autosave_interval(self.schedule.autosave_interval_minutes)?;
        if self.schedule.poll_interval_secs == 0 {
            return Err(TrackerError::Config(
                "schedule.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.store.dir_name.is_empty() || self.store.marker_name.is_empty() {
            return Err(TrackerError::Config(
                "store.dir_name and store.marker_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Ignore policy for the `[tracking]` rules plus the store and marker.
    #[must_use]
    pub fn ignore_policy(&self) -> IgnorePolicy {
        IgnorePolicy::from_config(&self.tracking, &self.store.dir_name, &self.store.marker_name)
    }

    /// Scanner configured from `[tracking]` and `[performance]`.
    #[must_use]
    pub fn scanner(&self) -> TreeScanner {
        TreeScanner::new(self.ignore_policy())
            .follow_symlinks(self.tracking.follow_symlinks)
            .mmap_threshold(self.performance.mmap_threshold)
    }

    #[must_use]
    pub fn store_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.store.dir_name)
    }

    #[must_use]
    pub fn marker_path(&self, root: &Path) -> PathBuf {
        root.join(&self.store.marker_name)
    }
}

/// Checks an autosave interval against [`AUTOSAVE_INTERVAL_RANGE`].
///
/// # Errors
///
/// Returns [`TrackerError::Config`] if `minutes` is out of range.
pub fn validate_autosave_interval(minutes: u64) -> crate::Result<()> {
    if AUTOSAVE_INTERVAL_RANGE.contains(&minutes) {
        Ok(())
    } else {
        Err(TrackerError::Config(format!(
            "autosave interval must be between {} and {} minutes, got {minutes}",
            AUTOSAVE_INTERVAL_RANGE.start(),
            AUTOSAVE_INTERVAL_RANGE.end()
        )))
    }
}

// Default functions for serde
fn default_ignore_dirs() -> Vec<String> {
    DEFAULT_IGNORE_DIRS.iter().map(ToString::to_string).collect()
}

fn default_ignore_extensions() -> Vec<String> {
    DEFAULT_IGNORE_EXTENSIONS.iter().map(ToString::to_string).collect()
}

fn default_store_dir() -> String {
    crate::DEFAULT_STORE_DIR.to_string()
}

fn default_marker_name() -> String {
    crate::DEFAULT_MARKER_NAME.to_string()
}

const fn default_poll_interval_secs() -> u64 {
    2
}

const fn default_autosave_interval_minutes() -> u64 {
    15
}

const fn default_parallel_threads() -> usize {
    8
}

const fn default_mmap_threshold() -> u64 {
    DEFAULT_MMAP_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_writes_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/config.toml");

        let config = Config::load(&path)?;
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load(&path)?;
        assert_eq!(reloaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nautosave_enabled = true\n")?;

        let config = Config::load(&path)?;
        assert!(config.schedule.autosave_enabled);
        assert_eq!(config.schedule.autosave_interval_minutes, 15);
        assert_eq!(config.schedule.poll_interval_secs, 2);
        assert_eq!(config.store.dir_name, ".saves");
        assert_eq!(config.tracking.ignore_dirs.len(), DEFAULT_IGNORE_DIRS.len());
        Ok(())
    }

    #[test]
    fn test_out_of_range_interval_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nautosave_interval_minutes = 61\n")?;

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("between 1 and 60"));
        Ok(())
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.schedule.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_autosave_interval_bounds() {
        assert!(validate_autosave_interval(0).is_err());
        assert!(validate_autosave_interval(1).is_ok());
        assert!(validate_autosave_interval(60).is_ok());
        assert!(validate_autosave_interval(61).is_err());
    }

    #[test]
    fn test_policy_honors_store_names() {
        let mut config = Config::default();
        config.store.dir_name = ".snapshots".into();
        let policy = config.ignore_policy();
        assert!(policy.is_ignored(".snapshots/20240101_000000/meta.json"));
        assert!(policy.is_ignored(".tracker_status"));
    }
}
