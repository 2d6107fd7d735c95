//! YAML document loading and writing
//!
//! Equipment documents live one per file. Writes go through a temporary
//! sibling file that is renamed into place, so readers never observe a
//! half-written document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name suffix of stored equipment documents
pub const DOC_SUFFIX: &str = ".lg.yaml";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Document files directly inside `dir`, sorted by file name
///
/// A missing directory yields no files; an unreadable one is logged and
/// yields no files.
pub fn document_files(dir: &Path) -> Vec<PathBuf> {
    scan(dir).unwrap_or_else(|e| {
        warn!(error = %e, "cannot list equipment documents");
        Vec::new()
    })
}

fn scan(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))? {
        let path = entry.map_err(|e| LoadError::io(dir, e))?.path();
        let is_doc = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(DOC_SUFFIX));
        if is_doc && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load a single document
pub fn load_document<T: DeserializeOwned + 'static>(path: &Path) -> Result<T, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_yml::from_str(&content).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load every document in `dir`
///
/// A document that cannot be read or parsed is skipped with a warning. Only
/// a failure to list the directory fails the load.
pub fn load_all<T: DeserializeOwned + 'static>(dir: &Path) -> Result<Vec<(PathBuf, T)>, LoadError> {
    let mut docs = Vec::new();
    for path in scan(dir)? {
        match load_document(&path) {
            Ok(doc) => docs.push((path, doc)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
        }
    }
    Ok(docs)
}

/// Serialize `doc` to `path` via a temporary file and rename
pub fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), LoadError> {
    let yaml = serde_yml::to_string(doc).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| LoadError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, yaml).map_err(|e| LoadError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LoadError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_all_empty_dir() {
        let dir = tempdir().unwrap();
        let docs: Vec<(PathBuf, serde_json::Value)> = load_all(dir.path()).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_load_all_nonexistent_dir() {
        let docs: Vec<(PathBuf, serde_json::Value)> =
            load_all(Path::new("/nonexistent/path")).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_only_document_suffix_is_loaded() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("EQP-A.lg.yaml"), "name: a").unwrap();
        fs::write(dir.path().join("notes.yaml"), "name: b").unwrap();
        fs::write(dir.path().join("EQP-B.lg.yaml.tmp"), "name: c").unwrap();

        let files = document_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("EQP-A.lg.yaml"));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("EQP-A.lg.yaml");
        let doc = serde_json::json!({ "equipment_name": "TNF-61" });

        write_document(&path, &doc).unwrap();
        let loaded: serde_json::Value = load_document(&path).unwrap();
        assert_eq!(loaded, doc);
        assert!(!dir.path().join("nested").join("EQP-A.lg.yaml.tmp").exists());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("EQP-A.lg.yaml");
        fs::write(&path, "equipment_name: [unclosed").unwrap();

        let err = load_document::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("EQP-A.lg.yaml"));
    }

    #[test]
    fn test_load_all_skips_unparseable_document() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("EQP-A.lg.yaml"), "equipment_name: [unclosed").unwrap();
        fs::write(dir.path().join("EQP-B.lg.yaml"), "equipment_name: TNF-61").unwrap();

        let docs: Vec<(PathBuf, serde_json::Value)> = load_all(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].0.ends_with("EQP-B.lg.yaml"));
    }

    #[test]
    fn test_load_all_fails_when_dir_is_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equipment");
        fs::write(&path, "").unwrap();

        let err = load_all::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
