//! The database handle.

use std::path::Path;
use std::sync::Arc;

use hsdb_record::{document_from_json, Record};
use hsdb_schema::{SchemaDocument, SchemaRegistry};
use hsdb_storage::{
    FilePersistence, HybridStorage, InstallReport, MemoryPersistence, Persistence, StorageError,
};
use hsdb_types::RecordId;
use tracing::info;

use crate::config::HsdbConfig;
use crate::error::{SdkError, SdkResult};
use crate::model::Model;

/// An open HSDB store.
#[derive(Debug)]
pub struct Hsdb {
    storage: HybridStorage,
    startup: InstallReport,
}

impl Hsdb {
    /// Open a store from `config`, loading the schema from
    /// `config.schema_path`.
    pub fn open(config: HsdbConfig) -> SdkResult<Self> {
        let schema_path = config
            .schema_path
            .as_deref()
            .ok_or_else(|| SdkError::Config("schema_path is not set".into()))?;
        let document = SchemaDocument::from_path(schema_path)?;
        let registry = Arc::new(SchemaRegistry::from_document(document)?);
        Self::open_with_registry(config, registry)
    }

    /// Open a store over an already-assembled registry. `schema_path` is
    /// ignored.
    pub fn open_with_registry(config: HsdbConfig, registry: Arc<SchemaRegistry>) -> SdkResult<Self> {
        let persistence: Arc<dyn Persistence> = match &config.data_dir {
            Some(dir) => Arc::new(FilePersistence::open(dir).map_err(StorageError::from)?),
            None => Arc::new(MemoryPersistence::new()),
        };
        let storage = HybridStorage::new(registry, persistence)?.with_verbose_queries(config.verbose_queries);

        let mut startup = InstallReport::default();
        if config.load_from_disk && config.data_dir.is_some() {
            startup.merge(storage.install_from_persistence()?);
        }
        if let Some(index_file) = &config.index_file {
            startup.merge(storage.install_index_file(index_file)?);
        }
        for fixtures in &config.fixtures {
            startup.merge(storage.install_fixture_file(fixtures)?);
        }
        info!(
            models = storage.registry().len(),
            records = storage.index().len(),
            %startup,
            "hsdb opened"
        );
        Ok(Self { storage, startup })
    }

    /// Wrap an existing storage.
    pub fn with_storage(storage: HybridStorage) -> Self {
        Self {
            storage,
            startup: InstallReport::default(),
        }
    }

    /// Class operations for `name`.
    pub fn model(&self, name: &str) -> SdkResult<Model<'_>> {
        let schema = self
            .registry()
            .get(name)
            .ok_or_else(|| SdkError::UnknownModel(name.to_string()))?;
        Ok(Model::new(self, schema))
    }

    pub fn storage(&self) -> &HybridStorage {
        &self.storage
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.storage.registry()
    }

    /// What was installed while opening.
    pub fn startup_report(&self) -> InstallReport {
        self.startup
    }

    /// Fetch a record of any model by id.
    pub fn fetch(&self, id: &RecordId) -> Option<Record> {
        self.storage.fetch_entry(id)
    }

    /// Apply a JSON object to a record of any model.
    pub fn update(&self, id: &RecordId, data: serde_json::Value) -> SdkResult<Record> {
        Ok(self.storage.update_entry(id, document_from_json(data)?, true)?)
    }

    /// Delete a record of any model. Returns `false` if it did not exist.
    pub fn delete(&self, id: &RecordId) -> SdkResult<bool> {
        match self.storage.delete_entry(id, true) {
            Ok(deleted) => Ok(deleted),
            Err(StorageError::Index(hsdb_index::IndexError::NotFound(_))) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Install a fixture file, writing its records through.
    pub fn install_fixtures(&self, path: &Path) -> SdkResult<InstallReport> {
        Ok(self.storage.install_fixture_file(path)?)
    }

    /// Install an index file of already-durable records.
    pub fn install_index(&self, path: &Path) -> SdkResult<InstallReport> {
        Ok(self.storage.install_index_file(path)?)
    }

    /// Write every live record to an index file.
    pub fn export_index(&self, path: &Path) -> SdkResult<usize> {
        Ok(self.storage.write_index_file(path)?)
    }
}

/// Parse a record id from user input.
pub fn parse_id(raw: &str) -> SdkResult<RecordId> {
    RecordId::parse(raw).map_err(|source| SdkError::InvalidId {
        raw: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
[[models]]
name = "School"

[[models.attributes]]
name = "name"
type = "string"
required = true

[[models]]
name = "Student"

[[models.attributes]]
name = "name"
type = "string"
required = true

[[models.attributes]]
name = "age"
type = "integer"
indexed = true

[[models.relations]]
name = "school"
kind = "many_to_one"
model = "School"
"#;

    fn write_schema(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("schema.toml");
        std::fs::write(&path, SCHEMA).unwrap();
        path
    }

    #[test]
    fn unique_fields_declared_in_a_schema_file_reject_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.toml");
        std::fs::write(
            &schema,
            r#"
[[models]]
name = "School"

[[models.attributes]]
name = "code"
type = "string"
unique = true
"#,
        )
        .unwrap();
        let db = Hsdb::open(HsdbConfig::default().with_schema(schema)).unwrap();
        let schools = db.model("School").unwrap();
        schools.create(json!({"code": "LHS"})).unwrap();
        let err = schools.create(json!({"code": "LHS"})).unwrap_err();
        assert_eq!(err.status(), hsdb_types::Status::Conflict);
        assert_eq!(schools.count(), 1);
    }

    #[test]
    fn open_requires_a_schema() {
        assert!(matches!(
            Hsdb::open(HsdbConfig::default()),
            Err(SdkError::Config(_))
        ));
    }

    #[test]
    fn reopening_a_data_dir_restores_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = HsdbConfig::default()
            .with_schema(write_schema(dir.path()))
            .with_data_dir(dir.path().join("data"));

        let ada = {
            let db = Hsdb::open(config.clone()).unwrap();
            let school = db.model("School").unwrap().create(json!({"name": "Lincoln High"})).unwrap();
            db.model("Student")
                .unwrap()
                .create(json!({"name": "Ada", "age": 17, "school": school.id().to_string()}))
                .unwrap()
        };

        let db = Hsdb::open(config).unwrap();
        assert_eq!(db.startup_report().installed, 2);
        assert_eq!(db.fetch(&ada.id()), Some(ada));
        assert_eq!(db.model("School").unwrap().count(), 1);
    }

    #[test]
    fn a_corrupt_artifact_does_not_block_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = HsdbConfig::default()
            .with_schema(write_schema(dir.path()))
            .with_data_dir(dir.path().join("data"));

        let school = {
            let db = Hsdb::open(config.clone()).unwrap();
            db.model("School").unwrap().create(json!({"name": "Lincoln High"})).unwrap()
        };
        std::fs::write(
            dir.path()
                .join("data")
                .join("schools")
                .join("01890a5d-ac96-774b-bcce-b302099a8057.json"),
            "{not json",
        )
        .unwrap();

        let db = Hsdb::open(config).unwrap();
        assert_eq!((db.startup_report().installed, db.startup_report().failed), (1, 1));
        assert_eq!(db.fetch(&school.id()), Some(school));
    }

    #[test]
    fn startup_installs_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(
            &seed,
            r#"{"fixtures": [{"model": "School", "records": [{"name": "Lincoln High"}, {"name": "Roosevelt"}]}]}"#,
        )
        .unwrap();
        let config = HsdbConfig::default()
            .with_schema(write_schema(dir.path()))
            .with_fixture(&seed);
        let db = Hsdb::open(config).unwrap();
        assert_eq!(db.startup_report().installed, 2);
        assert_eq!(db.model("School").unwrap().count(), 2);
    }

    #[test]
    fn delete_by_id_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let db = Hsdb::open(HsdbConfig::default().with_schema(write_schema(dir.path()))).unwrap();
        let school = db.model("School").unwrap().create(json!({"name": "Lincoln High"})).unwrap();
        assert!(db.delete(&school.id()).unwrap());
        assert!(!db.delete(&school.id()).unwrap());
    }

    #[test]
    fn unknown_models_and_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = Hsdb::open(HsdbConfig::default().with_schema(write_schema(dir.path()))).unwrap();
        assert_eq!(db.model("Teacher").unwrap_err().status(), hsdb_types::Status::NotFound);
        assert_eq!(parse_id("nope").unwrap_err().status(), hsdb_types::Status::NotFound);
    }
}
