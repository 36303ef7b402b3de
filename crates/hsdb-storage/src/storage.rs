//! The hybrid storage orchestrator.

use std::path::Path;
use std::sync::Arc;

use hsdb_index::{IndexDatabase, IndexError};
use hsdb_query::Query;
use hsdb_record::{Document, Record};
use hsdb_schema::SchemaRegistry;
use hsdb_types::RecordId;
use tracing::{debug, warn};

use crate::error::{PersistError, StorageError, StorageResult};
use crate::install::{self, FixtureSet, IndexFileEntry, InstallReport};
use crate::persistence::Persistence;
use crate::queue::WriteQueue;

/// State shared between the storage handle and its apply worker.
pub(crate) struct StorageCore {
    pub index: Arc<IndexDatabase>,
    pub persistence: Arc<dyn Persistence>,
}

impl StorageCore {
    /// Write `record` durably and confirm the artifact exists.
    fn materialize(&self, record: &Record, overwrite: Option<&str>) -> Result<String, PersistError> {
        let path = self.persistence.create_entry(record, overwrite)?;
        if !self.persistence.exists(&path)? {
            return Err(PersistError::Missing(path));
        }
        Ok(path)
    }

    pub fn create_entry(&self, model: &str, data: Document, write: bool) -> StorageResult<Record> {
        let record = self.index.create_entry(model, data)?;
        if write {
            self.persist_new(&record)?;
        }
        Ok(record)
    }

    pub fn insert_record(&self, record: Record, write: bool) -> StorageResult<Record> {
        let record = self.index.insert_record(record)?;
        if write {
            self.persist_new(&record)?;
        }
        Ok(record)
    }

    /// Durable half of an insert; rolls the index back on failure.
    fn persist_new(&self, record: &Record) -> StorageResult<()> {
        if let Err(source) = self.materialize(record, None) {
            self.index.remove_record(&record.id());
            warn!(id = %record.id(), error = %source, "durable write failed, index entry rolled back");
            return Err(StorageError::Gone {
                id: record.id(),
                source,
            });
        }
        Ok(())
    }

    pub fn update_entry(&self, id: &RecordId, data: Document, write: bool) -> StorageResult<Record> {
        let previous = self.index.fetch_entry(id).ok_or(IndexError::NotFound(*id))?;
        let updated = self.index.update_entry(id, data)?;
        if write {
            if let Err(source) = self.materialize(&updated, Some(&previous.path())) {
                self.index.replace_record(previous)?;
                warn!(id = %id, error = %source, "durable update failed, previous version restored");
                return Err(StorageError::Gone { id: *id, source });
            }
        }
        Ok(updated)
    }

    pub fn delete_entry(&self, id: &RecordId, write: bool) -> StorageResult<bool> {
        let removed = self.index.remove_record(id).ok_or(IndexError::NotFound(*id))?;
        if write {
            if let Err(source) = self.persistence.delete_entry(&removed.path()) {
                self.index.insert_record(removed)?;
                warn!(id = %id, error = %source, "durable delete failed, record restored");
                return Err(StorageError::Gone { id: *id, source });
            }
        }
        Ok(true)
    }

    pub fn save(&self, record: Record, write: bool) -> StorageResult<Record> {
        if !self.index.contains(&record.id()) {
            return self.insert_record(record, write);
        }
        let changes: Document = record
            .slots()
            .iter()
            .filter(|slot| slot.is_editable() && !slot.is_computed())
            .map(|slot| (slot.name().to_string(), slot.value()))
            .collect();
        self.update_entry(&record.id(), changes, write)
    }
}

/// The process's storage handle: one index database kept consistent with a
/// durable backend.
///
/// Construct it once at startup and pass it by reference; dropping it drains
/// and joins the apply worker.
pub struct HybridStorage {
    core: Arc<StorageCore>,
    queue: WriteQueue<StorageCore>,
    verbose_queries: bool,
}

impl std::fmt::Debug for HybridStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridStorage")
            .field("index", &self.core.index)
            .field("queue", &self.queue)
            .field("verbose_queries", &self.verbose_queries)
            .finish()
    }
}

impl HybridStorage {
    /// Build an empty index over `registry` and start the apply worker.
    pub fn new(registry: Arc<SchemaRegistry>, persistence: Arc<dyn Persistence>) -> StorageResult<Self> {
        let core = Arc::new(StorageCore {
            index: Arc::new(IndexDatabase::new(registry)),
            persistence,
        });
        let queue = WriteQueue::spawn("hsdb-apply", Arc::clone(&core))?;
        debug!("hybrid storage started");
        Ok(Self {
            core,
            queue,
            verbose_queries: false,
        })
    }

    /// Make queries built by [`HybridStorage::query`] log a summary.
    pub fn with_verbose_queries(mut self, on: bool) -> Self {
        self.verbose_queries = on;
        self
    }

    /// Whether queries built here log a summary.
    pub fn verbose_queries(&self) -> bool {
        self.verbose_queries
    }

    /// The index database; reads through it see committed state.
    pub fn index(&self) -> &IndexDatabase {
        &self.core.index
    }

    /// The schema registry records are validated against.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.core.index.registry()
    }

    /// The durable backend.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.core.persistence
    }

    // ---------------------------------------------------------------
    // Mutations (applied in order on the worker)
    // ---------------------------------------------------------------

    /// Validate and index a new record, then write it durably if `write`.
    ///
    /// A failed durable write removes the index entry again and reports
    /// [`StorageError::Gone`].
    pub fn create_entry(&self, model: &str, data: Document, write: bool) -> StorageResult<Record> {
        let model = model.to_string();
        self.queue.submit(move |core| core.create_entry(&model, data, write))?
    }

    /// Index an already-built record, then write it durably if `write`.
    pub fn insert_record(&self, record: Record, write: bool) -> StorageResult<Record> {
        self.queue.submit(move |core| core.insert_record(record, write))?
    }

    /// Apply `data` to a stored record. A failed durable write restores the
    /// previous version.
    pub fn update_entry(&self, id: &RecordId, data: Document, write: bool) -> StorageResult<Record> {
        let id = *id;
        self.queue.submit(move |core| core.update_entry(&id, data, write))?
    }

    /// Remove a record. A failed durable delete re-inserts it.
    pub fn delete_entry(&self, id: &RecordId, write: bool) -> StorageResult<bool> {
        let id = *id;
        self.queue.submit(move |core| core.delete_entry(&id, write))?
    }

    /// Insert `record` if its id is new, else copy its editable fields onto
    /// the stored record.
    pub fn save(&self, record: Record, write: bool) -> StorageResult<Record> {
        self.queue.submit(move |core| core.save(record, write))?
    }

    // ---------------------------------------------------------------
    // Installation
    // ---------------------------------------------------------------

    /// Install seed records, always written through.
    pub fn install_fixtures(&self, sets: Vec<FixtureSet>) -> StorageResult<InstallReport> {
        self.queue.submit(move |core| core.install_fixtures(sets))
    }

    /// Install a JSON or TOML fixture file.
    pub fn install_fixture_file(&self, path: &Path) -> StorageResult<InstallReport> {
        let sets = install::read_fixture_file(path)?;
        self.install_fixtures(sets)
    }

    /// Install records that are already durable, listed in an index file.
    /// Ids already present are skipped; nothing is written.
    pub fn install_index_file(&self, path: &Path) -> StorageResult<InstallReport> {
        let entries = install::read_index_file(path)?;
        self.queue.submit(move |core| core.install_entries(entries))
    }

    /// Install every artifact the persistence backend holds.
    ///
    /// Artifacts that cannot be read or parsed are counted as failed; the
    /// rest are still installed.
    pub fn install_from_persistence(&self) -> StorageResult<InstallReport> {
        let mut unreadable = InstallReport::default();
        let mut entries = Vec::new();
        for artifact in self.core.persistence.scan()? {
            match artifact.document {
                Ok(record) => entries.push(IndexFileEntry {
                    path: artifact.path,
                    record,
                }),
                Err(_) => unreadable.failed += 1,
            }
        }
        let mut report = self.queue.submit(move |core| core.install_entries(entries))?;
        report.merge(unreadable);
        Ok(report)
    }

    /// Every live record as an index-file entry.
    pub fn export_index(&self) -> Vec<IndexFileEntry> {
        self.core
            .index
            .fetch_all()
            .into_iter()
            .map(|record| IndexFileEntry {
                path: record.path(),
                record: record.to_document(),
            })
            .collect()
    }

    /// Write [`HybridStorage::export_index`] to `path` as JSON.
    pub fn write_index_file(&self, path: &Path) -> StorageResult<usize> {
        let entries = self.export_index();
        install::write_index_file(path, &entries)?;
        Ok(entries.len())
    }

    // ---------------------------------------------------------------
    // Reads (straight to the index)
    // ---------------------------------------------------------------

    /// The live record with `id`.
    pub fn fetch_entry(&self, id: &RecordId) -> Option<Record> {
        self.core.index.fetch_entry(id)
    }

    /// Every live record of `model`, in creation order.
    pub fn fetch_model_entries(&self, model: &str) -> Vec<Record> {
        self.core.index.fetch_model_entries(model)
    }

    /// Every live record.
    pub fn fetch_all(&self) -> Vec<Record> {
        self.core.index.fetch_all()
    }

    /// Number of live records of `model`.
    pub fn count(&self, model: &str) -> usize {
        self.core.index.count(model)
    }

    /// A new query over `model`.
    pub fn query(&self, model: &str) -> StorageResult<Query<'_>> {
        Ok(Query::new(&self.core.index, model)?.verbose(self.verbose_queries))
    }

    /// A query over `model` built from the parameter grammar.
    pub fn query_params<I, K, V>(&self, model: &str, params: I) -> StorageResult<Query<'_>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Query::from_params(&self.core.index, model, params)?.verbose(self.verbose_queries))
    }
}
