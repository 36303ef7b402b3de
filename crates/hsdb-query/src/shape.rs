//! Rendering query rows for adapters.

use hsdb_record::{RecordLookup, RelationMode, SerializeOptions};
use serde::{Deserialize, Serialize};

use crate::query::Row;

/// How result rows are rendered to JSON.
///
/// Built from the `include_relations`, `expand_relations`, `fields` and
/// `ids_only` control keys of the parameter grammar.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseShape {
    pub relations: RelationMode,
    pub fields: Option<Vec<String>>,
    /// Render each record as its id alone.
    pub ids_only: bool,
}

impl ResponseShape {
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            relations: self.relations,
            fields: self.fields.clone(),
        }
    }

    pub fn render_row(&self, row: &Row, lookup: &dyn RecordLookup) -> serde_json::Value {
        match row {
            Row::Record(record) if self.ids_only => serde_json::Value::String(record.id().to_string()),
            Row::Record(record) => record.serialize(&self.serialize_options(), Some(lookup)),
            Row::Value(value) => value.clone().into(),
        }
    }

    pub fn render(&self, rows: &[Row], lookup: &dyn RecordLookup) -> serde_json::Value {
        serde_json::Value::Array(rows.iter().map(|row| self.render_row(row, lookup)).collect())
    }
}
