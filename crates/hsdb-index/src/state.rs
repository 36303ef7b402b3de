//! Lock-protected contents of the index database.

use std::collections::{BTreeSet, HashMap};

use hsdb_record::Record;
use hsdb_types::{RecordId, Value, ValueKey};

use crate::error::{IndexError, IndexResult};

/// Key of one field-index bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FieldKey {
    pub model: String,
    pub field: String,
    pub value: ValueKey,
}

impl FieldKey {
    pub fn new(model: &str, field: &str, value: &Value) -> Self {
        Self {
            model: model.to_string(),
            field: field.to_string(),
            value: value.index_key(),
        }
    }
}

/// Key of one relational-index bucket: owners of `model` whose `relation`
/// holds `key`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RelationKey {
    pub model: String,
    pub relation: String,
    pub key: ValueKey,
}

impl RelationKey {
    pub fn new(model: &str, relation: &str, key: &Value) -> Self {
        Self {
            model: model.to_string(),
            relation: relation.to_string(),
            key: key.index_key(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub table: HashMap<RecordId, Record>,
    pub models: HashMap<String, BTreeSet<RecordId>>,
    pub fields: HashMap<FieldKey, BTreeSet<RecordId>>,
    pub relations: HashMap<RelationKey, BTreeSet<RecordId>>,
}

impl IndexState {
    /// Reject `record` if another live record of its model holds one of its
    /// unique values.
    pub fn check_unique(&self, record: &Record) -> IndexResult<()> {
        let model = record.model_name();
        for attr in record.schema().unique_attributes() {
            let Some(value) = record.value(&attr.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let key = FieldKey::new(model, &attr.name, &value);
            let holder = self
                .fields
                .get(&key)
                .and_then(|ids| ids.iter().find(|id| **id != record.id()).copied());
            if let Some(holder) = holder {
                return Err(IndexError::UniqueViolation {
                    model: model.to_string(),
                    field: attr.name.clone(),
                    value: value.to_string(),
                    holder,
                });
            }
        }
        Ok(())
    }

    /// Add `record` to the table and every index.
    pub fn insert(&mut self, record: Record) {
        let id = record.id();
        let model = record.model_name().to_string();
        self.models.entry(model.clone()).or_default().insert(id);
        for attr in record.schema().indexed_attributes() {
            let value = record.value(&attr.name).unwrap_or_default();
            self.fields
                .entry(FieldKey::new(&model, &attr.name, &value))
                .or_default()
                .insert(id);
        }
        for rel in record.relations() {
            for key in &rel.keys {
                self.relations
                    .entry(RelationKey::new(&model, &rel.spec.name, key))
                    .or_default()
                    .insert(id);
            }
        }
        self.table.insert(id, record);
    }

    /// Remove the record with `id` from every index, then from the table.
    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let record = self.table.get(id)?;
        let model = record.model_name().to_string();
        for attr in record.schema().indexed_attributes() {
            let value = record.value(&attr.name).unwrap_or_default();
            remove_from(&mut self.fields, &FieldKey::new(&model, &attr.name, &value), id);
        }
        for rel in record.relations() {
            for key in &rel.keys {
                remove_from(&mut self.relations, &RelationKey::new(&model, &rel.spec.name, key), id);
            }
        }
        remove_from(&mut self.models, &model, id);
        self.table.remove(id)
    }

    /// Drop ids from the model index whose table entry is gone. Returns how
    /// many were pruned.
    pub fn prune(&mut self, stale: &[(String, RecordId)]) -> usize {
        let mut pruned = 0;
        for (model, id) in stale {
            if self.table.contains_key(id) {
                continue;
            }
            if let Some(ids) = self.models.get_mut(model) {
                if ids.remove(id) {
                    pruned += 1;
                }
                if ids.is_empty() {
                    self.models.remove(model);
                }
            }
        }
        pruned
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, BTreeSet<RecordId>>, key: &Q, id: &RecordId)
where
    K: std::borrow::Borrow<Q> + Eq + std::hash::Hash,
    Q: Eq + std::hash::Hash + ?Sized,
{
    if let Some(ids) = map.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}
