//! # snaptrack - Local Change Tracking and Snapshots
//!
//! snaptrack watches a working directory, reports which files were added,
//! modified or deleted since the last known state, and keeps full-copy
//! point-in-time snapshots that can be restored wholesale.
//!
//! ## Features
//!
//! - **Content Fingerprints**: Every tracked file is hashed with XXH3-128
//! - **Parallel Scanning**: Hashing runs on a Rayon pool; large files are memory-mapped
//! - **Full-Copy Snapshots**: Each snapshot is a plain directory plus `meta.json`
//! - **Autosave**: An optional background task snapshots the tree when it changes
//! - **Single Session per Tree**: A locked marker file keeps two sessions apart
//!
//! ## Architecture
//!
//! - [`tracking`]: Ignore rules, tree scanning, and change detection
//! - [`storage`]: The snapshot store (save, list, restore, verify)
//! - [`service`]: Session lifecycle, polling, and autosave scheduling
//! - [`marker`]: The session marker file
//! - [`config`]: Configuration parsing and validation
//! - [`commands`]: Command implementations for the `snaptrack` binary
//! - [`output`]: Output formatting and styling
//! - [`utils`]: Hashing and thread pool helpers
//!
//! ## Example Usage
//!
//! ```no_run
//! use snaptrack::config::Config;
//! use snaptrack::service::TrackerService;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut tracker = TrackerService::new(".", &Config::default())?;
//! tracker.initialize()?;
//!
//! let changes = tracker.poll()?;
//! if !changes.is_empty() {
//!     let report = tracker.save_now("checkpoint")?;
//!     println!("saved {}", report.id);
//! }
//!
//! tracker.shutdown()?;
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Typed errors returned by the engine.
pub mod error;

/// Session marker signalling an active tracker.
pub mod marker;

/// Output formatting and styling.
pub mod output;

/// Session orchestration: polling, autosave, save and restore.
pub mod service;

/// Snapshot store.
pub mod storage;

/// Ignore rules, scanning, and change detection.
pub mod tracking;

/// Utility functions and helpers.
pub mod utils;

pub use error::{Result, TrackerError};

use anyhow::Context;
use std::path::PathBuf;
use tracing::warn;

/// Current version of the snaptrack binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default snapshot store directory name inside the tracked root.
pub const DEFAULT_STORE_DIR: &str = ".saves";

/// Default session marker file name inside the tracked root.
pub const DEFAULT_MARKER_NAME: &str = ".tracker_status";

/// Central context for all snaptrack commands.
///
/// Holds the tracked root and the loaded configuration.
///
/// # Examples
///
/// ```no_run
/// use snaptrack::TrackerContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Track the current directory with the default config location
/// let ctx = TrackerContext::new(None, None)?;
///
/// // Explicit paths (for testing)
/// let ctx = TrackerContext::new(
///     Some("/tmp/work".into()),
///     Some("/tmp/snaptrack.toml".into()),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TrackerContext {
    /// Root of the tracked working tree.
    pub root: PathBuf,

    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl TrackerContext {
    /// Resolves the tracked root and loads configuration.
    ///
    /// `root` defaults to the current directory; `config_path` defaults to
    /// `SNAPTRACK_CONFIG_PATH`, then the platform config directory.
    ///
    /// # Errors
    /// Returns an error if the root does not exist, or if the configuration
    /// file cannot be read, created, or validated.
    pub fn new(root: Option<PathBuf>, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("Could not determine current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("Working tree not found: {}", root.display()))?;

        let config_path = config::Config::resolve_path(config_path.as_deref())?;
        let config = config::Config::load(&config_path)?;

        // Validate configuration and warn about issues
        let validator = config::validator::ConfigValidator::new();
        match validator.validate_config_file(&config_path) {
            Ok(warnings) => {
                for warning in warnings {
                    warn!(config = %config_path.display(), "{warning}");
                }
            }
            Err(e) => warn!(error = %e, "Configuration validation failed"),
        }

        // Configure thread pool based on config
        if let Err(e) = utils::thread_pool::configure_from_config(&config) {
            warn!(error = %e, "Failed to configure thread pool");
        }

        Ok(Self {
            root,
            config_path,
            config,
        })
    }

    /// Directory holding snapshots for this tree.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.config.store_dir(&self.root)
    }

    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.config.marker_path(&self.root)
    }

    /// Snapshot store configured for this tree.
    #[must_use]
    pub fn store(&self) -> storage::SnapshotStore {
        storage::SnapshotStore::new(self.store_dir()).with_scanner(self.config.scanner())
    }

    /// A fresh, uninitialized session for this tree.
    ///
    /// # Errors
    /// Returns an error if the configuration holds invalid values.
    pub fn service(&self) -> Result<service::TrackerService> {
        service::TrackerService::new(&self.root, &self.config)
    }

    /// A one-shot session attached to the newest snapshot, without the
    /// session marker. Only for commands that leave the tree and store alone.
    ///
    /// # Errors
    /// Returns an error if the tree was never initialized or the store
    /// cannot be read.
    pub fn attached_service(&self) -> anyhow::Result<service::TrackerService> {
        self.check_initialized()?;
        let mut tracker = self.service()?;
        tracker.attach()?;
        Ok(tracker)
    }

    /// A one-shot session that also holds the session marker, for commands
    /// that write to the store or the working tree.
    ///
    /// # Errors
    /// Returns an error if the tree was never initialized, another session
    /// (such as `snaptrack watch`) is active, or the store cannot be read.
    pub fn exclusive_service(&self) -> anyhow::Result<service::TrackerService> {
        self.check_initialized()?;
        let mut tracker = self.service()?;
        tracker.attach_exclusive()?;
        Ok(tracker)
    }

    /// Whether the snapshot store exists for this tree.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.store_dir().is_dir()
    }

    /// Checks that the tree has been initialized, returning an error if not.
    ///
    /// # Errors
    /// Returns an error if the snapshot store does not exist.
    pub fn check_initialized(&self) -> anyhow::Result<()> {
        if !self.is_initialized() {
            return Err(anyhow::anyhow!(
                "Not initialized: no snapshot store found in {}. Did you run 'snaptrack init'?",
                self.root.display()
            ));
        }
        Ok(())
    }
}
