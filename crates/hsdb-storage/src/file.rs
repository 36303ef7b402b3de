//! File-backed persistence: one JSON document per record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use hsdb_record::Record;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PersistError, PersistResult};
use crate::persistence::{split_path, Persistence, ScannedArtifact};

const EXTENSION: &str = "json";

/// Stores each record at `{root}/{resource_name_plural}/{id}.json`.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the destination, so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    root: PathBuf,
}

impl FilePersistence {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> PersistResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, path: &str) -> PersistResult<PathBuf> {
        let (plural, id) = split_path(path).ok_or_else(|| PersistError::InvalidPath(path.to_string()))?;
        Ok(self.root.join(plural).join(format!("{id}.{EXTENSION}")))
    }
}

impl Persistence for FilePersistence {
    fn create_entry(&self, record: &Record, overwrite_path: Option<&str>) -> PersistResult<String> {
        let path = record.path();
        let target = self.file_for(&path)?;
        let dir = target
            .parent()
            .ok_or_else(|| PersistError::InvalidPath(path.clone()))?;
        fs::create_dir_all(dir)?;

        let body = serde_json::to_vec_pretty(&record.to_document())
            .map_err(|e| PersistError::Serialization(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;

        if let Some(old) = overwrite_path.filter(|old| *old != path) {
            let old_file = self.file_for(old)?;
            if old_file.exists() {
                fs::remove_file(old_file)?;
            }
        }
        debug!(path = %path, bytes = body.len(), "artifact written");
        Ok(path)
    }

    fn delete_entry(&self, path: &str) -> PersistResult<bool> {
        let file = self.file_for(path)?;
        match fs::remove_file(&file) {
            Ok(()) => {
                debug!(path = %path, "artifact deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> PersistResult<bool> {
        Ok(self.file_for(path)?.is_file())
    }

    fn read_entry(&self, path: &str) -> PersistResult<Option<serde_json::Value>> {
        let file = self.file_for(path)?;
        match fs::read(&file) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PersistError::Serialization(format!("{}: {e}", file.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn scan(&self) -> PersistResult<Vec<ScannedArtifact>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2).sort_by_file_name() {
            let entry = entry.map_err(|e| PersistError::Io(e.into()))?;
            let file = entry.path();
            if !entry.file_type().is_file() || file.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let (Some(plural), Some(id)) = (
                file.parent().and_then(Path::file_name).and_then(|s| s.to_str()),
                file.file_stem().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let path = format!("{plural}/{id}");
            let document = match self.read_entry(&path) {
                Ok(Some(document)) => Ok(document),
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path, error = %e, "unreadable artifact");
                    Err(e)
                }
            };
            entries.push(ScannedArtifact { path, document });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use hsdb_record::document_from_json;
    use hsdb_schema::{AttributeSpec, ModelDefinition, ModelSchema, SchemaRegistry};
    use hsdb_types::FieldType;
    use serde_json::json;

    fn schema() -> Arc<ModelSchema> {
        SchemaRegistry::builder()
            .model(
                ModelDefinition::new("Student")
                    .attribute(AttributeSpec::new("name", FieldType::String).required()),
            )
            .build()
            .unwrap()
            .require("Student")
            .unwrap()
    }

    fn record(name: &str) -> Record {
        Record::new(schema(), document_from_json(json!({"name": name})).unwrap()).unwrap()
    }

    #[test]
    fn writes_one_file_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        let ada = record("Ada");
        let path = store.create_entry(&ada, None).unwrap();

        assert_eq!(path, format!("students/{}", ada.id()));
        let file = dir.path().join("students").join(format!("{}.json", ada.id()));
        assert!(file.is_file());
        assert!(store.exists(&path).unwrap());
        let stored = store.read_entry(&path).unwrap().unwrap();
        assert_eq!(stored["name"], json!("Ada"));
    }

    #[test]
    fn overwrite_replaces_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        let mut ada = record("Ada");
        let path = store.create_entry(&ada, None).unwrap();
        ada.apply_update(document_from_json(json!({"name": "Ada L."})).unwrap()).unwrap();
        store.create_entry(&ada, Some(&path)).unwrap();
        assert_eq!(store.read_entry(&path).unwrap().unwrap()["name"], json!("Ada L."));
        assert_eq!(store.scan().unwrap().len(), 1);
    }

    #[test]
    fn delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        let ada = record("Ada");
        let path = store.create_entry(&ada, None).unwrap();
        assert!(store.delete_entry(&path).unwrap());
        assert!(!store.delete_entry(&path).unwrap());
        assert!(!store.exists(&path).unwrap());
        assert!(store.read_entry(&path).unwrap().is_none());
    }

    #[test]
    fn scan_lists_documents_and_skips_strays() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        let a = record("Ada");
        let b = record("Bea");
        store.create_entry(&a, None).unwrap();
        store.create_entry(&b, None).unwrap();
        fs::write(dir.path().join("students").join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("top.json"), "{}").unwrap();

        let scanned = store.scan().unwrap();
        let paths: Vec<&str> = scanned.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec![a.path(), b.path()]);
    }

    #[test]
    fn scan_reports_corrupt_documents_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        let ada = record("Ada");
        store.create_entry(&ada, None).unwrap();
        let bad = record("Bea");
        let bad_file = dir.path().join("students").join(format!("{}.json", bad.id()));
        fs::write(&bad_file, "{not json").unwrap();

        let scanned = store.scan().unwrap();
        assert_eq!(scanned.len(), 2);
        let failed: Vec<&str> = scanned
            .iter()
            .filter(|a| a.document.is_err())
            .map(|a| a.path.as_str())
            .collect();
        assert_eq!(failed, vec![bad.path()]);
    }

    #[test]
    fn rejects_paths_outside_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path()).unwrap();
        assert!(matches!(store.exists("../escape"), Err(PersistError::InvalidPath(_))));
    }
}
