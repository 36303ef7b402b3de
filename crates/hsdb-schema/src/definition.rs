//! Declarative model definitions and the schema document that holds them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{AttributeSpec, FieldSpec, RelationSpec};

/// The fields one model declares itself, before ancestry is applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    /// Parent model whose fields are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn relation(mut self, spec: RelationSpec) -> Self {
        self.relations.push(spec);
        self
    }

    /// Declared fields in declaration order: attributes, then relations.
    pub fn fields(&self) -> impl Iterator<Item = FieldSpec> + '_ {
        self.attributes
            .iter()
            .cloned()
            .map(FieldSpec::from)
            .chain(self.relations.iter().cloned().map(FieldSpec::from))
    }
}

/// A set of model definitions loaded from a schema file.
///
/// TOML form:
///
/// ```toml
/// [[models]]
/// name = "School"
/// [[models.attributes]]
/// name = "name"
/// type = "string"
/// required = true
/// indexed = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
}

impl SchemaDocument {
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        toml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        serde_json::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Load a document, choosing the format from the file extension
    /// (`.json` is JSON, anything else is TOML).
    pub fn from_path(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }
}
