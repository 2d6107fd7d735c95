//! Persistence for equipment configs
//!
//! A [`ConfigStore`] hands out snapshots for reads and runs every write as a
//! single check-then-mutate step under exclusive access, so two writers can
//! never both pass a uniqueness check against the same state.

use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::error::ConfigError;
use crate::core::identity::ConfigId;
use crate::core::loader::{self, DOC_SUFFIX};
use crate::core::project::Project;
use crate::entities::EquipmentConfig;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// The change a write closure asks the store to apply
#[derive(Debug, Clone)]
pub enum Mutation {
    Insert(EquipmentConfig),
    Replace(EquipmentConfig),
    Remove(ConfigId),
}

pub trait ConfigStore: Send + Sync {
    /// All stored configs, ordered by creation time then id
    fn snapshot(&self) -> Result<Vec<EquipmentConfig>, ConfigError>;

    /// Run `f` against the current state and apply the mutation it returns
    ///
    /// No other writer observes or changes the state between `f` running and
    /// its mutation landing. If `f` fails nothing is written.
    fn write<T, F>(&self, f: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&[EquipmentConfig]) -> Result<(T, Mutation), ConfigError>;
}

fn apply(docs: &mut Vec<EquipmentConfig>, mutation: Mutation) {
    match mutation {
        Mutation::Insert(doc) => docs.push(doc),
        Mutation::Replace(doc) => {
            if let Some(slot) = docs.iter_mut().find(|d| d.id == doc.id) {
                *slot = doc;
            }
        }
        Mutation::Remove(id) => docs.retain(|d| d.id != id),
    }
}

/// In-process store, used by tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Vec<EquipmentConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(mut docs: Vec<EquipmentConfig>) -> Self {
        docs.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Self {
            docs: Mutex::new(docs),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn snapshot(&self) -> Result<Vec<EquipmentConfig>, ConfigError> {
        Ok(self.docs.lock().clone())
    }

    fn write<T, F>(&self, f: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&[EquipmentConfig]) -> Result<(T, Mutation), ConfigError>,
    {
        let mut docs = self.docs.lock();
        let (value, mutation) = f(&docs)?;
        apply(&mut docs, mutation);
        Ok(value)
    }
}

/// One YAML document per config under a directory
///
/// Writers in the same process serialize on a mutex; writers in different
/// processes serialize on a lock file created with `create_new`.
#[derive(Debug)]
pub struct YamlStore {
    dir: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    local: Mutex<()>,
}

impl YamlStore {
    pub fn new(dir: impl Into<PathBuf>, lock_path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_path: lock_path.into(),
            lock_timeout,
            local: Mutex::new(()),
        }
    }

    /// Store rooted at the project's equipment directory
    pub fn for_project(project: &Project, lock_timeout: Duration) -> Self {
        Self::new(project.equipment_dir(), project.lock_path(), lock_timeout)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the document with the given id
    pub fn document_path(&self, id: &ConfigId) -> PathBuf {
        self.dir.join(format!("{}{}", id, DOC_SUFFIX))
    }

    fn load(&self) -> Result<Vec<EquipmentConfig>, ConfigError> {
        let mut docs: Vec<EquipmentConfig> = loader::load_all(&self.dir)
            .map_err(|e| ConfigError::storage(e.to_string()))?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();
        docs.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        debug!(dir = %self.dir.display(), count = docs.len(), "loaded equipment documents");
        Ok(docs)
    }

    fn persist(&self, mutation: &Mutation) -> Result<(), ConfigError> {
        match mutation {
            Mutation::Insert(doc) | Mutation::Replace(doc) => {
                let path = self.document_path(&doc.id);
                debug!(path = %path.display(), "writing equipment document");
                loader::write_document(&path, doc).map_err(|e| ConfigError::storage(e.to_string()))
            }
            Mutation::Remove(id) => {
                let path = self.document_path(id);
                debug!(path = %path.display(), "removing equipment document");
                match fs::remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == IoErrorKind::NotFound => {
                        warn!(path = %path.display(), "document already removed");
                        Ok(())
                    }
                    Err(e) => Err(ConfigError::storage(format!(
                        "failed to remove {}: {}",
                        path.display(),
                        e
                    ))),
                }
            }
        }
    }
}

impl ConfigStore for YamlStore {
    fn snapshot(&self) -> Result<Vec<EquipmentConfig>, ConfigError> {
        self.load()
    }

    fn write<T, F>(&self, f: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&[EquipmentConfig]) -> Result<(T, Mutation), ConfigError>,
    {
        let _local = self.local.lock();
        let _lock = StoreLock::acquire(&self.lock_path, self.lock_timeout)?;

        let docs = self.load()?;
        let (value, mutation) = f(&docs)?;
        self.persist(&mutation)?;
        Ok(value)
    }
}

/// Held while a writer owns the store; removes the lock file on drop
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Owner info is only for humans inspecting a stale lock.
                    let _ = writeln!(file, "pid={}", std::process::id());
                    debug!(
                        lock = %path.display(),
                        waited_ms = started.elapsed().as_millis() as u64,
                        "acquired store lock"
                    );
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        warn!(lock = %path.display(), "timed out waiting for store lock");
                        return Err(ConfigError::storage(format!(
                            "store is locked by another writer ({}); remove the file if no writer is running",
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(ConfigError::storage(format!(
                        "failed to acquire store lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
