use hsdb_schema::RelationKind;
use hsdb_types::{RecordId, Value};
use serde::Serialize;

use crate::slot::RelationSlot;

/// An unresolved reference from a record to related records.
///
/// Reading a relation never touches the index; the handle only carries the
/// stored keys. Resolution into a query happens in the query layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationHandle {
    pub name: String,
    pub kind: RelationKind,
    pub secondary_model: String,
    pub relation_key: String,
    pub keys: Vec<Value>,
}

impl RelationHandle {
    pub(crate) fn from_slot(slot: &RelationSlot) -> Self {
        Self {
            name: slot.spec.name.clone(),
            kind: slot.spec.kind,
            secondary_model: slot.spec.secondary_model.clone(),
            relation_key: slot.spec.relation_key.clone(),
            keys: slot.keys.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns `true` when keys are record ids of the secondary model.
    pub fn keys_are_ids(&self) -> bool {
        self.relation_key == "id"
    }

    /// Keys parsed as record ids. Empty unless keys are ids.
    pub fn ids(&self) -> Vec<RecordId> {
        if !self.keys_are_ids() {
            return Vec::new();
        }
        self.keys
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| RecordId::parse(s).ok())
            .collect()
    }
}
