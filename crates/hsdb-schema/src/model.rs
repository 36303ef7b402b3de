//! The assembled schema of one model.

use std::collections::{BTreeMap, HashMap};

use hsdb_types::{FieldType, RecordId};
use serde::Serialize;

use crate::field::{AttributeSpec, FieldSpec, RelationSpec};
use crate::naming;

/// Name of the base id field.
pub const ID: &str = "id";
/// Name of the base creation timestamp field.
pub const CREATED_AT: &str = "created_at";
/// Name of the base modification timestamp field.
pub const UPDATED_AT: &str = "updated_at";

/// Base fields every model inherits.
pub(crate) fn base_fields() -> Vec<FieldSpec> {
    vec![
        AttributeSpec::new(ID, FieldType::Id).computed().into(),
        AttributeSpec::new(CREATED_AT, FieldType::Timestamp).computed().into(),
        AttributeSpec::new(UPDATED_AT, FieldType::Timestamp).computed().into(),
    ]
}

pub(crate) fn is_base_field(name: &str) -> bool {
    matches!(name, ID | CREATED_AT | UPDATED_AT)
}

/// The ordered field specifications of one model, with its resource names.
///
/// Built once per model by the registry and shared by every record of the
/// model behind an `Arc`.
#[derive(Clone, Debug, Serialize)]
pub struct ModelSchema {
    pub model_name: String,
    pub resource_name: String,
    pub resource_name_plural: String,
    /// Model names from the root ancestor down to this model.
    pub ancestry: Vec<String>,
    fields: Vec<FieldSpec>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl ModelSchema {
    pub(crate) fn new(model_name: String, ancestry: Vec<String>, fields: Vec<FieldSpec>) -> Self {
        let resource_name = naming::resource_name(&model_name);
        let resource_name_plural = naming::pluralize(&resource_name);
        let positions = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().to_string(), i))
            .collect();
        Self {
            model_name,
            resource_name,
            resource_name_plural,
            ancestry,
            fields,
            positions,
        }
    }

    /// All fields in declaration order, base fields first.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.field(name).and_then(FieldSpec::as_attribute)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.field(name).and_then(FieldSpec::as_relation)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.fields.iter().filter_map(FieldSpec::as_attribute)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationSpec> {
        self.fields.iter().filter_map(FieldSpec::as_relation)
    }

    /// Attribute map keyed by field name, for introspection by adapters.
    pub fn attribute_map(&self) -> BTreeMap<&str, &AttributeSpec> {
        self.attributes().map(|a| (a.name.as_str(), a)).collect()
    }

    /// Relation map keyed by field name, for introspection by adapters.
    pub fn relation_map(&self) -> BTreeMap<&str, &RelationSpec> {
        self.relations().map(|r| (r.name.as_str(), r)).collect()
    }

    /// Returns `true` if `field` is an attribute flagged `indexed`.
    pub fn is_indexed(&self, field: &str) -> bool {
        self.attribute(field).map_or(false, |a| a.flags.indexed)
    }

    /// Attributes maintained in the field index.
    pub fn indexed_attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes().filter(|a| a.flags.indexed)
    }

    /// Attributes whose values must be unique per model.
    pub fn unique_attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes().filter(|a| a.flags.unique)
    }

    /// Returns `true` if this model is `ancestor` or derives from it.
    pub fn descends_from(&self, ancestor: &str) -> bool {
        self.ancestry.iter().any(|name| name == ancestor)
    }

    /// Durable storage address of a record: `{resource_name_plural}/{id}`.
    pub fn storage_path(&self, id: &RecordId) -> String {
        format!("{}/{id}", self.resource_name_plural)
    }

    /// Find the relation whose reverse lookup name is `name`, together with
    /// the owning model, among `owners`.
    pub fn reverse_relation<'a>(
        &self,
        name: &str,
        owners: impl IntoIterator<Item = &'a ModelSchema>,
    ) -> Option<(&'a ModelSchema, &'a RelationSpec)> {
        owners.into_iter().find_map(|owner| {
            owner
                .relations()
                .find(|r| {
                    r.reverse_lookup.as_deref() == Some(name)
                        && self.descends_from(&r.secondary_model)
                })
                .map(|r| (owner, r))
        })
    }
}
