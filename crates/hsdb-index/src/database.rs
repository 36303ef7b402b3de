//! The index database.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hsdb_record::{Document, Record, RecordLookup};
use hsdb_schema::{SchemaRegistry, ID};
use hsdb_types::{RecordId, Value};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};
use crate::state::{FieldKey, IndexState, RelationKey};

/// In-memory store of every live record plus its indices.
///
/// All mutating operations validate first and touch state only once they
/// are known to succeed, under one write lock.
pub struct IndexDatabase {
    registry: Arc<SchemaRegistry>,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for IndexDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("IndexDatabase")
            .field("models", &self.registry.len())
            .field("records", &state.table.len())
            .field("field_buckets", &state.fields.len())
            .field("relation_buckets", &state.relations.len())
            .finish()
    }
}

impl IndexDatabase {
    /// An empty database over `registry`.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// The schemas this database indexes.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Validate `data` against `model` and insert the new record.
    pub fn create_entry(&self, model: &str, data: Document) -> IndexResult<Record> {
        let schema = self.registry.require(model)?;
        let record = Record::new(schema, data)?;
        self.insert_record(record)
    }

    /// Insert an already-built record.
    ///
    /// Fails with `Conflict` if the id is present, carrying the existing
    /// record, or with `UniqueViolation` if a unique value is taken.
    pub fn insert_record(&self, record: Record) -> IndexResult<Record> {
        self.registry.require(record.model_name())?;
        let mut state = self.write();
        if let Some(existing) = state.table.get(&record.id()) {
            return Err(IndexError::Conflict {
                existing: Box::new(existing.clone()),
            });
        }
        state.check_unique(&record)?;
        debug!(id = %record.id(), model = %record.model_name(), "index insert");
        state.insert(record.clone());
        Ok(record)
    }

    /// Apply `data` to the record with `id`, re-indexing its fields.
    pub fn update_entry(&self, id: &RecordId, data: Document) -> IndexResult<Record> {
        let mut state = self.write();
        let mut next = state
            .table
            .get(id)
            .cloned()
            .ok_or(IndexError::NotFound(*id))?;
        next.apply_update(data)?;
        state.check_unique(&next)?;
        state.remove(id);
        debug!(id = %id, model = %next.model_name(), "index update");
        state.insert(next.clone());
        Ok(next)
    }

    /// Insert or overwrite a record wholesale, returning the previous one.
    pub fn replace_record(&self, record: Record) -> IndexResult<Option<Record>> {
        self.registry.require(record.model_name())?;
        let mut state = self.write();
        state.check_unique(&record)?;
        let previous = state.remove(&record.id());
        debug!(id = %record.id(), replaced = previous.is_some(), "index replace");
        state.insert(record);
        Ok(previous)
    }

    /// Remove the record with `id` from every index and the table.
    pub fn delete_entry(&self, id: &RecordId) -> IndexResult<bool> {
        self.remove_record(id)
            .map(|_| true)
            .ok_or(IndexError::NotFound(*id))
    }

    /// Like [`IndexDatabase::delete_entry`], returning the removed record.
    pub fn remove_record(&self, id: &RecordId) -> Option<Record> {
        let removed = self.write().remove(id);
        if let Some(record) = &removed {
            debug!(id = %id, model = %record.model_name(), "index delete");
        }
        removed
    }

    // ---------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------

    /// Ids of `model` records whose `field` equals `value`.
    ///
    /// Only fields flagged `indexed` have buckets; use
    /// [`IndexDatabase::is_indexed`] to tell "unindexed" from "no matches".
    pub fn lookup_by_field(&self, model: &str, field: &str, value: &Value) -> BTreeSet<RecordId> {
        self.read()
            .fields
            .get(&FieldKey::new(model, field, value))
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of every live record of `model`, in creation order.
    pub fn lookup_by_model(&self, model: &str) -> BTreeSet<RecordId> {
        self.read().models.get(model).cloned().unwrap_or_default()
    }

    /// Ids of `model` records whose `relation` holds `key`.
    pub fn reverse_lookup(&self, model: &str, relation: &str, key: &Value) -> BTreeSet<RecordId> {
        self.read()
            .relations
            .get(&RelationKey::new(model, relation, key))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if `field` of `model` is maintained in the field index.
    pub fn is_indexed(&self, model: &str, field: &str) -> bool {
        self.registry
            .get(model)
            .map_or(false, |schema| schema.is_indexed(field))
    }

    /// Size of the model-index bucket of `model`.
    pub fn count(&self, model: &str) -> usize {
        self.read().models.get(model).map_or(0, BTreeSet::len)
    }

    /// Number of records in the primary table.
    pub fn len(&self) -> usize {
        self.read().table.len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record with `id` is stored.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.read().table.contains_key(id)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// The record with `id`, if live.
    pub fn fetch_entry(&self, id: &RecordId) -> Option<Record> {
        let stale = {
            let state = self.read();
            if let Some(record) = state.table.get(id) {
                return Some(record.clone());
            }
            state
                .models
                .iter()
                .filter(|(_, ids)| ids.contains(id))
                .map(|(model, _)| (model.clone(), *id))
                .collect::<Vec<_>>()
        };
        self.heal(&stale);
        None
    }

    /// Every live record of `model`, in creation order.
    pub fn fetch_model_entries(&self, model: &str) -> Vec<Record> {
        let ids = self.lookup_by_model(model);
        self.fetch_entries(model, &ids)
    }

    /// The live records among `ids`, which are expected to belong to
    /// `model`. Ids with no table entry are pruned from the model index.
    pub fn fetch_entries(&self, model: &str, ids: &BTreeSet<RecordId>) -> Vec<Record> {
        let (records, stale) = {
            let state = self.read();
            let mut records = Vec::with_capacity(ids.len());
            let mut stale = Vec::new();
            for id in ids {
                match state.table.get(id) {
                    Some(record) => records.push(record.clone()),
                    None => stale.push((model.to_string(), *id)),
                }
            }
            (records, stale)
        };
        self.heal(&stale);
        records
    }

    /// Every live record, grouped by model name then creation order.
    pub fn fetch_all(&self) -> Vec<Record> {
        let mut models: Vec<String> = self.read().models.keys().cloned().collect();
        models.sort();
        models
            .iter()
            .flat_map(|model| self.fetch_model_entries(model))
            .collect()
    }

    fn heal(&self, stale: &[(String, RecordId)]) {
        if stale.is_empty() {
            return;
        }
        let pruned = self.write().prune(stale);
        if pruned > 0 {
            warn!(pruned, "pruned stale ids from model index");
        }
    }

    /// Drop a record from the primary table only, leaving its index entries
    /// behind.
    #[cfg(test)]
    pub(crate) fn corrupt_table(&self, id: &RecordId) {
        self.write().table.remove(id);
    }
}

impl RecordLookup for IndexDatabase {
    fn related(&self, model: &str, field: &str, key: &Value) -> Vec<Record> {
        if field == ID {
            return key
                .as_str()
                .and_then(|s| RecordId::parse(s).ok())
                .and_then(|id| self.fetch_entry(&id))
                .filter(|record| record.model_name() == model)
                .into_iter()
                .collect();
        }
        if self.is_indexed(model, field) {
            let ids = self.lookup_by_field(model, field, key);
            return self.fetch_entries(model, &ids);
        }
        self.fetch_model_entries(model)
            .into_iter()
            .filter(|record| record.value(field).map_or(false, |v| v.loose_eq(key)))
            .collect()
    }
}
