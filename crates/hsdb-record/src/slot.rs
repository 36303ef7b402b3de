//! Per-instance field slots.
//!
//! Every record owns one slot per declared field. A slot carries its own
//! copy of the field specification next to the value, so records never
//! share mutable state with the schema or with each other.

use hsdb_schema::{AttributeSpec, FieldSpec, RelationSpec};
use hsdb_types::{FieldType, Value};

use crate::error::{RecordError, RecordResult};

/// One attribute value with its specification.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSlot {
    pub spec: AttributeSpec,
    pub value: Value,
}

impl AttributeSlot {
    /// Validate `raw` for this slot without assigning it.
    pub(crate) fn check(&self, model: &str, raw: Value) -> RecordResult<Value> {
        let field = || self.spec.name.clone();
        if raw.is_null() && self.spec.flags.required {
            return Err(RecordError::MissingField {
                model: model.to_string(),
                field: field(),
            });
        }
        let value = self
            .spec
            .value_type
            .coerce(raw)
            .map_err(|source| RecordError::Type {
                model: model.to_string(),
                field: field(),
                source,
            })?;
        if let Some(max) = self.spec.max_size {
            let actual = match &value {
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                _ => 0,
            };
            if actual > max {
                return Err(RecordError::MaxSize {
                    model: model.to_string(),
                    field: field(),
                    max,
                    actual,
                });
            }
        }
        Ok(value)
    }
}

/// The keys of one relation with its specification.
///
/// Keys are an ordered set: duplicates are dropped on assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationSlot {
    pub spec: RelationSpec,
    pub keys: Vec<Value>,
}

impl RelationSlot {
    /// Normalise `raw` into a key list, enforcing the kind's cardinality.
    ///
    /// Accepts `null`, a scalar key, a list of keys, or an object carrying
    /// the relation key (as produced by relation expansion).
    pub(crate) fn check(&self, model: &str, raw: Value) -> RecordResult<Vec<Value>> {
        let items = match raw {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        };
        let mut keys: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            let key = self.key_of(model, item)?;
            if !keys.iter().any(|k| k == &key) {
                keys.push(key);
            }
        }
        if let Some(max) = self.spec.kind.max_keys() {
            if keys.len() > max {
                return Err(RecordError::CardinalityViolation {
                    model: model.to_string(),
                    relation: self.spec.name.clone(),
                    kind: self.spec.kind.to_string(),
                    count: keys.len(),
                });
            }
        }
        if keys.is_empty() && self.spec.flags.required {
            return Err(RecordError::MissingField {
                model: model.to_string(),
                field: self.spec.name.clone(),
            });
        }
        Ok(keys)
    }

    fn key_of(&self, model: &str, item: Value) -> RecordResult<Value> {
        let invalid = |reason: String| RecordError::InvalidKey {
            model: model.to_string(),
            relation: self.spec.name.clone(),
            reason,
        };
        let item = match item {
            Value::Map(mut map) => map
                .remove(&self.spec.relation_key)
                .ok_or_else(|| invalid(format!("object lacks {}", self.spec.relation_key)))?,
            other => other,
        };
        match item {
            Value::Null | Value::List(_) | Value::Map(_) => {
                Err(invalid(format!("{} is not a scalar key", item.kind())))
            }
            key if self.spec.keys_are_ids() => FieldType::Id
                .coerce(key)
                .map_err(|e| invalid(e.to_string())),
            key => Ok(key),
        }
    }

    /// The keys as one value: the sole key (or null) for single kinds, a
    /// list otherwise.
    pub fn as_value(&self) -> Value {
        if self.spec.kind.is_single() {
            self.keys.first().cloned().unwrap_or(Value::Null)
        } else {
            Value::List(self.keys.clone())
        }
    }
}

/// A per-instance field slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Attribute(AttributeSlot),
    Relation(RelationSlot),
}

impl Slot {
    /// Empty slot cloned from a field specification.
    pub(crate) fn from_spec(spec: &FieldSpec) -> Self {
        match spec {
            FieldSpec::Attribute(a) => Self::Attribute(AttributeSlot {
                spec: a.clone(),
                value: Value::Null,
            }),
            FieldSpec::Relation(r) => Self::Relation(RelationSlot {
                spec: r.clone(),
                keys: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Attribute(a) => &a.spec.name,
            Self::Relation(r) => &r.spec.name,
        }
    }

    pub fn is_computed(&self) -> bool {
        match self {
            Self::Attribute(a) => a.spec.flags.computed,
            Self::Relation(r) => r.spec.flags.computed,
        }
    }

    pub fn is_editable(&self) -> bool {
        match self {
            Self::Attribute(a) => a.spec.flags.editable,
            Self::Relation(r) => r.spec.flags.editable,
        }
    }

    /// The slot's content as a single value.
    pub fn value(&self) -> Value {
        match self {
            Self::Attribute(a) => a.value.clone(),
            Self::Relation(r) => r.as_value(),
        }
    }
}
