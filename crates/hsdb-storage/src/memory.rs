//! In-memory persistence for tests and ephemeral stores.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use hsdb_record::Record;

use crate::error::{PersistError, PersistResult};
use crate::persistence::{split_path, Persistence, ScannedArtifact};

/// How [`MemoryPersistence`] treats writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    None,
    /// Writes and deletes return an error.
    Reject,
    /// Writes report success but store nothing.
    Drop,
}

/// Artifacts kept in a map behind a lock.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    artifacts: RwLock<BTreeMap<String, serde_json::Value>>,
    failure: RwLock<FailureMode>,
}

impl MemoryPersistence {
    /// An empty store that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change how subsequent writes behave.
    pub fn set_failure(&self, mode: FailureMode) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    fn failure(&self) -> FailureMode {
        *self.failure.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an artifact directly, bypassing failure injection.
    pub fn insert_raw(&self, path: impl Into<String>, document: serde_json::Value) {
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), document);
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(path: &str) -> PersistResult<()> {
        split_path(path)
            .map(|_| ())
            .ok_or_else(|| PersistError::InvalidPath(path.to_string()))
    }
}

impl Persistence for MemoryPersistence {
    fn create_entry(&self, record: &Record, overwrite_path: Option<&str>) -> PersistResult<String> {
        let path = record.path();
        match self.failure() {
            FailureMode::Reject => return Err(PersistError::Rejected(path)),
            FailureMode::Drop => return Ok(path),
            FailureMode::None => {}
        }
        let mut artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = overwrite_path.filter(|old| *old != path) {
            artifacts.remove(old);
        }
        artifacts.insert(path.clone(), record.to_document());
        Ok(path)
    }

    fn delete_entry(&self, path: &str) -> PersistResult<bool> {
        Self::check(path)?;
        if self.failure() == FailureMode::Reject {
            return Err(PersistError::Rejected(path.to_string()));
        }
        Ok(self
            .artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some())
    }

    fn exists(&self, path: &str) -> PersistResult<bool> {
        Self::check(path)?;
        Ok(self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path))
    }

    fn read_entry(&self, path: &str) -> PersistResult<Option<serde_json::Value>> {
        Self::check(path)?;
        Ok(self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned())
    }

    fn scan(&self) -> PersistResult<Vec<ScannedArtifact>> {
        Ok(self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(path, doc)| ScannedArtifact {
                path: path.clone(),
                document: Ok(doc.clone()),
            })
            .collect())
    }
}
