#![allow(dead_code)]

use anyhow::Result;
use snaptrack::config::Config;
use snaptrack::service::TrackerService;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary working tree with a private config file.
pub struct TestTree {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl TestTree {
    /// Creates an empty tree at `<tmp>/work` and a config path at `<tmp>/config.toml`.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("work");
        fs::create_dir_all(&root)?;
        let config_path = temp_dir.path().join("config.toml");
        Ok(Self {
            temp_dir,
            root,
            config_path,
        })
    }

    /// Writes `content` to `rel` under the root, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(rel))?)
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        fs::remove_file(self.root.join(rel))?;
        Ok(())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// An initialized session using the default configuration.
    pub fn session(&self) -> Result<TrackerService> {
        self.session_with(&Config::default())
    }

    pub fn session_with(&self, config: &Config) -> Result<TrackerService> {
        let mut tracker = TrackerService::new(&self.root, config)?;
        tracker.initialize()?;
        Ok(tracker)
    }
}
