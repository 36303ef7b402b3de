//! Flattening records into plain JSON.

use hsdb_schema::{CREATED_AT, ID, UPDATED_AT};
use hsdb_types::Value;
use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::slot::{RelationSlot, Slot};

/// How relation slots appear in serialized output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    /// Relations are left out.
    Omit,
    /// Relations appear as their stored key (or list of keys).
    #[default]
    Ids,
    /// Relations are replaced by the related records, one level deep.
    Expand,
}

/// Options for [`Record::serialize`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub relations: RelationMode,
    /// Restrict output to these fields. `id` is always included.
    pub fields: Option<Vec<String>>,
}

impl SerializeOptions {
    pub fn omit_relations() -> Self {
        Self {
            relations: RelationMode::Omit,
            fields: None,
        }
    }

    pub fn expand_relations() -> Self {
        Self {
            relations: RelationMode::Expand,
            fields: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn includes(&self, field: &str) -> bool {
        field == ID
            || self
                .fields
                .as_ref()
                .map_or(true, |fields| fields.iter().any(|f| f == field))
    }
}

/// Read access used to expand relations during serialization.
pub trait RecordLookup {
    /// Live records of `model` whose `field` equals `key`.
    fn related(&self, model: &str, field: &str, key: &Value) -> Vec<Record>;
}

impl Record {
    /// Flatten to a JSON object.
    ///
    /// With [`RelationMode::Expand`] and a `lookup`, each relation is replaced
    /// by its related records serialized with relations as ids, so expansion
    /// never goes deeper than one level. Without a lookup, expansion falls
    /// back to ids.
    pub fn serialize(
        &self,
        options: &SerializeOptions,
        lookup: Option<&dyn RecordLookup>,
    ) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (name, value) in self.base_values() {
            if options.includes(name) {
                out.insert(name.to_string(), value.into());
            }
        }
        for slot in self.slots() {
            if !options.includes(slot.name()) {
                continue;
            }
            let rendered: serde_json::Value = match slot {
                Slot::Attribute(a) => a.value.clone().into(),
                Slot::Relation(r) => match (options.relations, lookup) {
                    (RelationMode::Omit, _) => continue,
                    (RelationMode::Expand, Some(lookup)) => expand(r, lookup),
                    _ => r.as_value().into(),
                },
            };
            out.insert(slot.name().to_string(), rendered);
        }
        serde_json::Value::Object(out)
    }

    /// The durable form: every field, relations as ids.
    pub fn to_document(&self) -> serde_json::Value {
        self.serialize(&SerializeOptions::default(), None)
    }

    fn base_values(&self) -> [(&'static str, Value); 3] {
        [
            (ID, Value::String(self.id().to_string())),
            (CREATED_AT, Value::Timestamp(self.created_at())),
            (UPDATED_AT, Value::Timestamp(self.updated_at())),
        ]
    }
}

fn expand(slot: &RelationSlot, lookup: &dyn RecordLookup) -> serde_json::Value {
    let nested = SerializeOptions::default();
    let mut related: Vec<serde_json::Value> = slot
        .keys
        .iter()
        .flat_map(|key| lookup.related(&slot.spec.secondary_model, &slot.spec.relation_key, key))
        .map(|record| record.serialize(&nested, None))
        .collect();
    if slot.spec.kind.is_single() {
        if related.is_empty() {
            serde_json::Value::Null
        } else {
            related.swap_remove(0)
        }
    } else {
        serde_json::Value::Array(related)
    }
}
