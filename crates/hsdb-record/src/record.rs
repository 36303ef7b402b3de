//! The model instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hsdb_schema::{ModelSchema, CREATED_AT, ID, UPDATED_AT};
use hsdb_types::{FieldType, RecordId, TypeError, Value};
use tracing::warn;

use crate::error::{RecordError, RecordResult};
use crate::relation::RelationHandle;
use crate::slot::{RelationSlot, Slot};

/// Field name to value map: the input of construction and update.
pub type Document = BTreeMap<String, Value>;

/// Convert a JSON object into a [`Document`].
pub fn document_from_json(json: serde_json::Value) -> RecordResult<Document> {
    match Value::from(json) {
        Value::Map(map) => Ok(map),
        other => Err(RecordError::NotAnObject(other.kind().to_string())),
    }
}

/// One instance of a model.
///
/// The id is fixed at construction. `created_at <= updated_at` holds for
/// every record, and computed fields are only ever assigned through
/// [`Record::restore`].
#[derive(Clone, Debug)]
pub struct Record {
    schema: Arc<ModelSchema>,
    id: RecordId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    slots: Vec<Slot>,
}

impl Record {
    /// Build a new record from client data.
    ///
    /// Fails on unknown fields, computed fields, missing required fields,
    /// type mismatches, oversize values and relation cardinality violations.
    pub fn new(schema: Arc<ModelSchema>, data: Document) -> RecordResult<Self> {
        let now = Utc::now();
        Self::build(schema, RecordId::new(), now, now, data, false)
    }

    /// Rebuild a record from its durable form.
    ///
    /// Accepts the base fields and computed fields, generating any base
    /// field that is missing. Fields the schema no longer declares are
    /// dropped.
    pub fn restore(schema: Arc<ModelSchema>, mut document: Document) -> RecordResult<Self> {
        let model = schema.model_name.clone();
        let type_err = |field: &str, source: TypeError| RecordError::Type {
            model: model.clone(),
            field: field.to_string(),
            source,
        };
        let id = match document.remove(ID) {
            Some(Value::String(s)) => RecordId::parse(&s).map_err(|e| type_err(ID, e))?,
            Some(Value::Null) | None => RecordId::new(),
            Some(other) => {
                return Err(type_err(
                    ID,
                    TypeError::Mismatch {
                        expected: FieldType::Id.to_string(),
                        found: other.kind().to_string(),
                    },
                ))
            }
        };
        let now = Utc::now();
        let created_at = take_timestamp(&mut document, CREATED_AT)
            .map_err(|e| type_err(CREATED_AT, e))?
            .unwrap_or(now);
        let updated_at = take_timestamp(&mut document, UPDATED_AT)
            .map_err(|e| type_err(UPDATED_AT, e))?
            .unwrap_or(created_at)
            .max(created_at);
        document.retain(|name, _| {
            let known = schema.field(name).is_some();
            if !known {
                warn!(model = %schema.model_name, field = %name, "dropping undeclared field on restore");
            }
            known
        });
        Self::build(schema, id, created_at, updated_at, document, true)
    }

    fn build(
        schema: Arc<ModelSchema>,
        id: RecordId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        mut data: Document,
        trusted: bool,
    ) -> RecordResult<Self> {
        let model = schema.model_name.as_str();
        for name in data.keys() {
            match schema.field(name) {
                None => {
                    return Err(RecordError::UnknownField {
                        model: model.to_string(),
                        field: name.clone(),
                    })
                }
                Some(spec) if spec.flags().computed && !trusted => {
                    return Err(RecordError::ComputedField {
                        model: model.to_string(),
                        field: name.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let mut slots = Vec::new();
        for spec in schema.fields().iter().filter(|f| !is_base(f.name())) {
            let mut slot = Slot::from_spec(spec);
            let supplied = data.remove(spec.name()).filter(|v| !v.is_null());
            match &mut slot {
                Slot::Attribute(attr) => {
                    let raw = supplied
                        .or_else(|| attr.spec.default.clone())
                        .unwrap_or(Value::Null);
                    attr.value = attr.check(model, raw)?;
                }
                Slot::Relation(rel) => {
                    rel.keys = rel.check(model, supplied.unwrap_or(Value::Null))?;
                }
            }
            slots.push(slot);
        }

        Ok(Self {
            schema,
            id,
            created_at,
            updated_at,
            slots,
        })
    }

    /// Apply client changes.
    ///
    /// Every field is validated before any is assigned, so a failing update
    /// leaves the record untouched. Stamps `updated_at`.
    pub fn apply_update(&mut self, data: Document) -> RecordResult<()> {
        let model = self.schema.model_name.clone();
        let mut staged = Vec::with_capacity(data.len());
        for (name, raw) in data {
            if is_base(&name) {
                return Err(RecordError::ComputedField { model, field: name });
            }
            let pos = self
                .slots
                .iter()
                .position(|s| s.name() == name)
                .ok_or_else(|| RecordError::UnknownField {
                    model: model.clone(),
                    field: name.clone(),
                })?;
            let slot = &self.slots[pos];
            if slot.is_computed() {
                return Err(RecordError::ComputedField { model, field: name });
            }
            if !slot.is_editable() {
                return Err(RecordError::NotEditable { model, field: name });
            }
            let staged_slot = match slot {
                Slot::Attribute(attr) => {
                    let mut next = attr.clone();
                    next.value = attr.check(&model, raw)?;
                    Slot::Attribute(next)
                }
                Slot::Relation(rel) => {
                    let mut next = rel.clone();
                    next.keys = rel.check(&model, raw)?;
                    Slot::Relation(next)
                }
            };
            staged.push((pos, staged_slot));
        }
        for (pos, slot) in staged {
            self.slots[pos] = slot;
        }
        self.touch();
        Ok(())
    }

    /// Stamp `updated_at` with the current time, never before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at).max(self.updated_at);
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        &self.schema.model_name
    }

    /// Durable storage path: `{resource_name_plural}/{id}`.
    pub fn path(&self) -> String {
        self.schema.storage_path(&self.id)
    }

    /// Field slots in declaration order, base fields excluded.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name() == name)
    }

    /// Current value of a field. The id reads as its string form; relations
    /// read as their keys.
    pub fn value(&self, name: &str) -> Option<Value> {
        match name {
            ID => Some(Value::String(self.id.to_string())),
            CREATED_AT => Some(Value::Timestamp(self.created_at)),
            UPDATED_AT => Some(Value::Timestamp(self.updated_at)),
            _ => self.slot(name).map(Slot::value),
        }
    }

    /// Resolve a dotted path whose first segment is a field name.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let (field, rest) = path.split_once('.').unwrap_or((path, ""));
        let value = self.value(field)?;
        value.resolve_path(rest).cloned()
    }

    fn relation_slot(&self, name: &str) -> Option<&RelationSlot> {
        match self.slot(name)? {
            Slot::Relation(r) => Some(r),
            Slot::Attribute(_) => None,
        }
    }

    /// Unresolved handle on a relation field.
    pub fn relation(&self, name: &str) -> Option<RelationHandle> {
        self.relation_slot(name).map(RelationHandle::from_slot)
    }

    /// Stored keys of a relation field.
    pub fn relation_keys(&self, name: &str) -> Option<&[Value]> {
        self.relation_slot(name).map(|r| r.keys.as_slice())
    }

    /// Relation slots of this record.
    pub fn relations(&self) -> impl Iterator<Item = &RelationSlot> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Relation(r) => Some(r),
            Slot::Attribute(_) => None,
        })
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.model_name == other.schema.model_name
            && self.id == other.id
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
            && self.slots == other.slots
    }
}

fn is_base(name: &str) -> bool {
    matches!(name, ID | CREATED_AT | UPDATED_AT)
}

fn take_timestamp(doc: &mut Document, field: &str) -> Result<Option<DateTime<Utc>>, TypeError> {
    match doc.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => match FieldType::Timestamp.coerce(raw)? {
            Value::Timestamp(t) => Ok(Some(t)),
            other => Err(TypeError::Mismatch {
                expected: FieldType::Timestamp.to_string(),
                found: other.kind().to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{RecordLookup, SerializeOptions};
    use hsdb_schema::{AttributeSpec, ModelDefinition, RelationSpec, SchemaRegistry};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .model(
                ModelDefinition::new("School")
                    .attribute(AttributeSpec::new("name", FieldType::String).required()),
            )
            .model(
                ModelDefinition::new("Student")
                    .attribute(AttributeSpec::new("name", FieldType::String).required())
                    .attribute(AttributeSpec::new("age", FieldType::Integer).indexed())
                    .attribute(AttributeSpec::new("height", FieldType::Float))
                    .attribute(AttributeSpec::new("status", FieldType::String).with_default("enrolled"))
                    .attribute(AttributeSpec::new("badge", FieldType::String).read_only())
                    .attribute(AttributeSpec::new("rank", FieldType::Integer).computed())
                    .attribute(AttributeSpec::new("address", FieldType::Map))
                    .relation(RelationSpec::many_to_one("school", "School")),
            )
            .build()
            .unwrap()
    }

    fn doc(json: serde_json::Value) -> Document {
        document_from_json(json).unwrap()
    }

    fn ada(registry: &SchemaRegistry) -> Record {
        Record::new(
            registry.require("Student").unwrap(),
            doc(json!({"name": "Ada", "age": 17, "height": 160})),
        )
        .unwrap()
    }

    #[test]
    fn construction_stamps_base_fields_and_defaults() {
        let r = registry();
        let record = ada(&r);
        assert_eq!(record.created_at(), record.updated_at());
        assert_eq!(record.value("status"), Some(Value::from("enrolled")));
        assert_eq!(record.value("height"), Some(Value::Float(160.0)));
        assert_eq!(record.value("school"), Some(Value::Null));
        assert_eq!(record.value("id"), Some(Value::from(record.id().to_string())));
        assert_eq!(record.path(), format!("students/{}", record.id()));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let r = registry();
        let err = Record::new(r.require("Student").unwrap(), doc(json!({"age": 3}))).unwrap_err();
        assert!(matches!(err, RecordError::MissingField { field, .. } if field == "name"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let r = registry();
        let err = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "age": "old"})),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::Type { field, .. } if field == "age"));
    }

    #[test]
    fn computed_fields_cannot_be_assigned() {
        let r = registry();
        let schema = r.require("Student").unwrap();
        for field in ["id", "created_at", "rank"] {
            let mut data = doc(json!({"name": "Ada"}));
            data.insert(field.to_string(), Value::Int(1));
            let err = Record::new(schema.clone(), data).unwrap_err();
            assert!(matches!(err, RecordError::ComputedField { .. }), "{field}");
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let r = registry();
        let err = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "nickname": "A"})),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::UnknownField { .. }));
    }

    #[test]
    fn cardinality_is_enforced_at_construction() {
        let r = registry();
        let ids = vec![RecordId::new().to_string(), RecordId::new().to_string()];
        let err = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "school": ids})),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::CardinalityViolation { .. }));
    }

    #[test]
    fn instances_own_their_slots() {
        let r = registry();
        let mut a = ada(&r);
        let b = ada(&r);
        a.apply_update(doc(json!({"age": 30}))).unwrap();
        assert_eq!(a.value("age"), Some(Value::Int(30)));
        assert_eq!(b.value("age"), Some(Value::Int(17)));
        assert!(r.require("Student").unwrap().attribute("age").unwrap().default.is_none());
    }

    #[test]
    fn update_is_all_or_nothing() {
        let r = registry();
        let mut record = ada(&r);
        let before = record.clone();
        let err = record
            .apply_update(doc(json!({"age": 18, "height": "tall"})))
            .unwrap_err();
        assert!(matches!(err, RecordError::Type { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn update_refuses_computed_and_read_only_fields() {
        let r = registry();
        let mut record = ada(&r);
        assert!(matches!(
            record.apply_update(doc(json!({"rank": 1}))),
            Err(RecordError::ComputedField { .. })
        ));
        assert!(matches!(
            record.apply_update(doc(json!({"updated_at": "2024-01-01T00:00:00Z"}))),
            Err(RecordError::ComputedField { .. })
        ));
        assert!(matches!(
            record.apply_update(doc(json!({"badge": "gold"}))),
            Err(RecordError::NotEditable { .. })
        ));
    }

    #[test]
    fn update_keeps_timestamps_ordered() {
        let r = registry();
        let mut record = ada(&r);
        record.apply_update(doc(json!({"name": "Ada L."}))).unwrap();
        assert!(record.created_at() <= record.updated_at());
    }

    #[test]
    fn update_cannot_clear_required_field() {
        let r = registry();
        let mut record = ada(&r);
        assert!(matches!(
            record.apply_update(doc(json!({"name": null}))),
            Err(RecordError::MissingField { .. })
        ));
    }

    #[test]
    fn restore_accepts_base_and_computed_fields() {
        let r = registry();
        let schema = r.require("Student").unwrap();
        let id = RecordId::new();
        let record = Record::restore(
            schema,
            doc(json!({
                "id": id.to_string(),
                "created_at": "2024-01-02T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "name": "Ada",
                "rank": 3,
                "legacy": true
            })),
        )
        .unwrap();
        assert_eq!(record.id(), id);
        assert_eq!(record.value("rank"), Some(Value::Int(3)));
        assert_eq!(record.created_at(), record.updated_at());
        assert!(record.value("legacy").is_none());
    }

    #[test]
    fn document_round_trips_through_restore() {
        let r = registry();
        let record = ada(&r);
        let restored = Record::restore(
            r.require("Student").unwrap(),
            document_from_json(record.to_document()).unwrap(),
        )
        .unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn dotted_paths_resolve_into_maps() {
        let r = registry();
        let record = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "address": {"city": "Paris"}})),
        )
        .unwrap();
        assert_eq!(record.resolve_path("address.city"), Some(Value::from("Paris")));
        assert_eq!(record.resolve_path("address.zip"), None);
        assert_eq!(record.resolve_path("name"), Some(Value::from("Ada")));
    }

    #[test]
    fn relation_reads_return_handles() {
        let r = registry();
        let school = RecordId::new();
        let record = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "school": school.to_string()})),
        )
        .unwrap();
        let handle = record.relation("school").unwrap();
        assert_eq!(handle.secondary_model, "School");
        assert_eq!(handle.ids(), vec![school]);
        assert!(record.relation("name").is_none());
    }

    struct OneSchool(Record);

    impl RecordLookup for OneSchool {
        fn related(&self, model: &str, field: &str, key: &Value) -> Vec<Record> {
            if model == "School" && self.0.value(field).as_ref() == Some(key) {
                vec![self.0.clone()]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn serialization_modes() {
        let r = registry();
        let school = Record::new(r.require("School").unwrap(), doc(json!({"name": "Lincoln"}))).unwrap();
        let student = Record::new(
            r.require("Student").unwrap(),
            doc(json!({"name": "Ada", "school": school.id().to_string()})),
        )
        .unwrap();

        let ids = student.serialize(&SerializeOptions::default(), None);
        assert_eq!(ids["school"], json!(school.id().to_string()));

        let omitted = student.serialize(&SerializeOptions::omit_relations(), None);
        assert!(omitted.get("school").is_none());

        let lookup = OneSchool(school.clone());
        let expanded = student.serialize(&SerializeOptions::expand_relations(), Some(&lookup));
        assert_eq!(expanded["school"]["name"], json!("Lincoln"));

        let subset = student.serialize(&SerializeOptions::default().with_fields(["name"]), None);
        let keys: Vec<&String> = subset.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(matches!(document_from_json(json!([1, 2])), Err(RecordError::NotAnObject(_))));
    }
}
