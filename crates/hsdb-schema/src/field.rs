//! Field descriptors: the static, per-model specification of each declared
//! attribute and relation.

use std::fmt;

use hsdb_types::{FieldType, Value};
use serde::{Deserialize, Serialize};

/// Behavioural flags shared by attributes and relations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFlags {
    /// Must be supplied at construction (unless a default exists).
    pub required: bool,
    /// Server-assigned; never settable through the public constructor or
    /// update path.
    pub computed: bool,
    /// Maintained in the field index.
    pub indexed: bool,
    /// No two live records of the model may share a value.
    pub unique: bool,
    /// Advertised to adapters as free-text searchable.
    pub searchable: bool,
    /// May be changed by `update` after construction.
    pub editable: bool,
}

impl FieldFlags {
    /// Apply the implications between flags: unique fields are indexed and
    /// computed fields are not editable.
    pub fn normalize(&mut self) {
        if self.unique {
            self.indexed = true;
        }
        if self.computed {
            self.editable = false;
        }
    }
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self {
            required: false,
            computed: false,
            indexed: false,
            unique: false,
            searchable: false,
            editable: true,
        }
    }
}

/// Specification of a plain value attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: FieldType,
    #[serde(flatten)]
    pub flags: FieldFlags,
    /// Value used when the field is omitted at construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Upper bound on string length (chars) or list length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, value_type: FieldType) -> Self {
        Self {
            name: name.into(),
            value_type,
            flags: FieldFlags::default(),
            default: None,
            max_size: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.flags.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.flags.computed = true;
        self.flags.editable = false;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.flags.indexed = true;
        self
    }

    /// Unique fields are always indexed, so uniqueness checks stay O(1).
    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self.flags.indexed = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.flags.searchable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags.editable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }
}

/// Cardinality of a relation, seen from the owning model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Maximum number of keys the owner side may hold (`None` = unbounded).
    pub const fn max_keys(self) -> Option<usize> {
        match self {
            Self::OneToOne | Self::ManyToOne => Some(1),
            Self::ManyToMany => None,
        }
    }

    pub const fn is_single(self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OneToOne => "one-to-one",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        };
        write!(f, "{name}")
    }
}

fn default_relation_key() -> String {
    "id".to_string()
}

/// Specification of a relation to another model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub name: String,
    pub kind: RelationKind,
    /// Model on the other side of the relation.
    #[serde(rename = "model")]
    pub secondary_model: String,
    /// Field on the secondary record matched against the stored keys.
    #[serde(default = "default_relation_key")]
    pub relation_key: String,
    /// Name under which owners are reachable from the secondary model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_lookup: Option<String>,
    #[serde(flatten)]
    pub flags: FieldFlags,
}

impl RelationSpec {
    pub fn new(name: impl Into<String>, kind: RelationKind, secondary_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            secondary_model: secondary_model.into(),
            relation_key: default_relation_key(),
            reverse_lookup: None,
            flags: FieldFlags::default(),
        }
    }

    pub fn one_to_one(name: impl Into<String>, secondary_model: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToOne, secondary_model)
    }

    pub fn many_to_one(name: impl Into<String>, secondary_model: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToOne, secondary_model)
    }

    pub fn many_to_many(name: impl Into<String>, secondary_model: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToMany, secondary_model)
    }

    pub fn required(mut self) -> Self {
        self.flags.required = true;
        self
    }

    pub fn keyed_by(mut self, relation_key: impl Into<String>) -> Self {
        self.relation_key = relation_key.into();
        self
    }

    pub fn reverse(mut self, name: impl Into<String>) -> Self {
        self.reverse_lookup = Some(name.into());
        self
    }

    /// Returns `true` when keys are record ids of the secondary model.
    pub fn keys_are_ids(&self) -> bool {
        self.relation_key == "id"
    }
}

/// One declared field of a model.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpec {
    Attribute(AttributeSpec),
    Relation(RelationSpec),
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Attribute(a) => &a.name,
            Self::Relation(r) => &r.name,
        }
    }

    pub fn flags(&self) -> &FieldFlags {
        match self {
            Self::Attribute(a) => &a.flags,
            Self::Relation(r) => &r.flags,
        }
    }

    pub fn flags_mut(&mut self) -> &mut FieldFlags {
        match self {
            Self::Attribute(a) => &mut a.flags,
            Self::Relation(r) => &mut r.flags,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeSpec> {
        match self {
            Self::Attribute(a) => Some(a),
            Self::Relation(_) => None,
        }
    }

    pub fn as_relation(&self) -> Option<&RelationSpec> {
        match self {
            Self::Relation(r) => Some(r),
            Self::Attribute(_) => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Relation(_))
    }
}

impl From<AttributeSpec> for FieldSpec {
    fn from(spec: AttributeSpec) -> Self {
        Self::Attribute(spec)
    }
}

impl From<RelationSpec> for FieldSpec {
    fn from(spec: RelationSpec) -> Self {
        Self::Relation(spec)
    }
}
