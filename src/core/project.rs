//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker directory holding project configuration and the store lock
pub const MARKER_DIR: &str = ".lotguard";

/// Directory holding one YAML document per equipment config
pub const EQUIPMENT_DIR: &str = "equipment";

/// Represents a lotguard project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .lotguard/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(MARKER_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Open a project rooted exactly at `path`
    pub fn open(path: &Path) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        if !root.join(MARKER_DIR).is_dir() {
            return Err(ProjectError::NotFound {
                searched_from: path.to_path_buf(),
            });
        }
        Ok(Self { root })
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(MARKER_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::create_structure(root)
    }

    /// Initialize even if .lotguard/ exists; existing documents are kept
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create_structure(root)
    }

    fn create_structure(root: PathBuf) -> Result<Self, ProjectError> {
        let marker = root.join(MARKER_DIR);
        std::fs::create_dir_all(&marker).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join(EQUIPMENT_DIR))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(marker.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# lotguard project configuration

# Rows per page for `lotguard eqp list`
# page_size: 20

# Treat "TNF-61" and "tnf-61" as different equipment names
# case_sensitive_names: true

# How long a writer waits for the store lock, in milliseconds
# lock_timeout_ms: 2000

# Default output format (auto, yaml, json, tsv, csv, md, id)
# default_format: auto

# Log filter directive, e.g. "lotguard=debug"
# log: warn
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .lotguard configuration directory
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.marker_dir().join("config.yaml")
    }

    /// Lock file serializing writers to the equipment store
    pub fn lock_path(&self) -> PathBuf {
        self.marker_dir().join("store.lock")
    }

    pub fn equipment_dir(&self) -> PathBuf {
        self.root.join(EQUIPMENT_DIR)
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a lotguard project (searched from {searched_from:?}). Run 'lotguard init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("lotguard project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.marker_dir().is_dir());
        assert!(project.config_path().exists());
        assert!(project.equipment_dir().is_dir());
        assert!(!project.lock_path().exists());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_project_discover_from_nested_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
        assert!(Project::open(tmp.path()).is_err());
    }
}
