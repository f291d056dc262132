use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Recognized configuration sections and their keys.
const KNOWN_FIELDS: &[&str] = &[
    "tracking.ignore_dirs",
    "tracking.ignore_extensions",
    "tracking.follow_symlinks",
    "store.dir_name",
    "store.marker_name",
    "schedule.poll_interval_secs",
    "schedule.autosave_enabled",
    "schedule.autosave_interval_minutes",
    "performance.parallel_threads",
    "performance.mmap_threshold",
];

/// Flags configuration keys that have no effect.
pub struct ConfigValidator {
    /// Set of valid configuration fields
    known_fields: HashSet<&'static str>,
    /// Section names derived from `known_fields`
    known_sections: HashSet<&'static str>,
}

impl ConfigValidator {
    #[must_use]
    pub fn new() -> Self {
        let known_fields: HashSet<&'static str> = KNOWN_FIELDS.iter().copied().collect();
        let known_sections = KNOWN_FIELDS
            .iter()
            .filter_map(|field| field.split_once('.').map(|(section, _)| section))
            .collect();
        Self {
            known_fields,
            known_sections,
        }
    }

    /// Reports unknown fields in a configuration file, one message per field.
    ///
    /// A missing file has nothing to report.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<Vec<String>> {
        if !config_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        let parsed: toml::Value = toml::from_str(&content)?;

        let mut unknown = Vec::new();
        self.check_table(&parsed, "", &mut unknown);

        Ok(unknown
            .into_iter()
            .map(|field| format!("Unknown configuration field: {field}"))
            .collect())
    }

    /// Recursively collects keys that are neither known sections nor known fields.
    fn check_table(&self, table: &toml::Value, prefix: &str, unknown: &mut Vec<String>) {
        let toml::Value::Table(map) = table else {
            return;
        };

        for (key, value) in map {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            if prefix.is_empty() && self.known_sections.contains(full_key.as_str()) {
                self.check_table(value, &full_key, unknown);
            } else if !self.known_fields.contains(full_key.as_str()) {
                unknown.push(full_key);
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
