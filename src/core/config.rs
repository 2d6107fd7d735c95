//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::core::repository::{RepositoryOptions, DEFAULT_PAGE_SIZE};
use crate::core::Project;

/// Default wait for the store lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

/// lotguard configuration with layered hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format
    pub default_format: Option<String>,

    /// Rows per page for list output
    pub page_size: Option<usize>,

    /// Whether equipment names compare case-sensitively
    pub case_sensitive_names: Option<bool>,

    /// How long a writer waits for the store lock
    pub lock_timeout_ms: Option<u64>,

    /// Log filter directive
    pub log: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        Self::load_for(Project::discover().ok().as_ref())
    }

    /// Load global, then project, then environment settings
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut layers = Vec::new();
        if let Some(global_path) = Self::global_config_path() {
            layers.push(global_path);
        }
        if let Some(project) = project {
            layers.push(project.config_path());
        }

        let mut config = Self::from_layers(&layers);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Merge config files in order; later files win, missing files are skipped
    pub fn from_layers(paths: &[PathBuf]) -> Self {
        let mut config = Config::default();
        for path in paths {
            if let Some(layer) = Self::read_file(path) {
                config.merge(layer);
            }
        }
        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config file");
                return None;
            }
        };
        // An all-comment file parses as null
        if contents.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
            return Some(Config::default());
        }
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                None
            }
        }
    }

    /// Apply LOTGUARD_* overrides; unparsable values are ignored with a warning
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        fn parsed<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %value, "ignoring invalid environment override");
                    None
                }
            }
        }

        if let Some(v) = parsed("LOTGUARD_PAGE_SIZE", var("LOTGUARD_PAGE_SIZE")) {
            self.page_size = Some(v);
        }
        if let Some(v) = parsed("LOTGUARD_CASE_SENSITIVE_NAMES", var("LOTGUARD_CASE_SENSITIVE_NAMES")) {
            self.case_sensitive_names = Some(v);
        }
        if let Some(v) = parsed("LOTGUARD_LOCK_TIMEOUT_MS", var("LOTGUARD_LOCK_TIMEOUT_MS")) {
            self.lock_timeout_ms = Some(v);
        }
        if let Some(v) = var("LOTGUARD_LOG") {
            self.log = Some(v);
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lotguard")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.page_size.is_some() {
            self.page_size = other.page_size;
        }
        if other.case_sensitive_names.is_some() {
            self.case_sensitive_names = other.case_sensitive_names;
        }
        if other.lock_timeout_ms.is_some() {
            self.lock_timeout_ms = other.lock_timeout_ms;
        }
        if other.log.is_some() {
            self.log = other.log;
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn case_sensitive_names(&self) -> bool {
        self.case_sensitive_names.unwrap_or(true)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms.unwrap_or(DEFAULT_LOCK_TIMEOUT_MS))
    }

    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            case_sensitive_names: self.case_sensitive_names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_size(), 20);
        assert!(config.case_sensitive_names());
        assert_eq!(config.lock_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_later_layer_wins() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        let project = tmp.path().join("project.yaml");
        std::fs::write(&global, "page_size: 50\ncase_sensitive_names: false\n").unwrap();
        std::fs::write(&project, "page_size: 5\n").unwrap();

        let config = Config::from_layers(&[global, project, tmp.path().join("missing.yaml")]);
        assert_eq!(config.page_size(), 5);
        assert!(!config.case_sensitive_names());
    }

    #[test]
    fn test_commented_template_is_empty_config() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        assert_eq!(Config::from_layers(&[project.config_path()]), Config::default());
    }

    #[test]
    fn test_malformed_layer_is_skipped() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "page_size: [not a number\n").unwrap();
        assert_eq!(Config::from_layers(&[path]), Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOTGUARD_PAGE_SIZE", "7"),
            ("LOTGUARD_CASE_SENSITIVE_NAMES", "false"),
            ("LOTGUARD_LOCK_TIMEOUT_MS", "not-a-number"),
            ("LOTGUARD_LOG", "lotguard=debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            lock_timeout_ms: Some(100),
            ..Config::default()
        };
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.page_size(), 7);
        assert!(!config.case_sensitive_names());
        assert_eq!(config.lock_timeout(), Duration::from_millis(100));
        assert_eq!(config.log.as_deref(), Some("lotguard=debug"));
    }
}
