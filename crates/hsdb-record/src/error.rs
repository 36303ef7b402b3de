//! Error types for record construction and update.

use hsdb_types::{Status, TypeError};
use thiserror::Error;

/// Validation failures raised while building or updating a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("model {model} has no field {field}")]
    UnknownField { model: String, field: String },

    #[error("missing required field {field} on model {model}")]
    MissingField { model: String, field: String },

    #[error("field {field} on model {model} is computed and cannot be assigned")]
    ComputedField { model: String, field: String },

    #[error("field {field} on model {model} is not editable")]
    NotEditable { model: String, field: String },

    #[error("field {field} on model {model}: {source}")]
    Type {
        model: String,
        field: String,
        #[source]
        source: TypeError,
    },

    #[error("field {field} on model {model} exceeds max size {max} (got {actual})")]
    MaxSize {
        model: String,
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("relation {relation} on model {model} is {kind} and holds at most one key (got {count})")]
    CardinalityViolation {
        model: String,
        relation: String,
        kind: String,
        count: usize,
    },

    #[error("invalid relation key for {relation} on model {model}: {reason}")]
    InvalidKey {
        model: String,
        relation: String,
        reason: String,
    },

    #[error("record data must be a JSON object, got {0}")]
    NotAnObject(String),
}

impl RecordError {
    /// Validation failures surface as internal errors on mutating paths.
    pub fn status(&self) -> Status {
        Status::Internal
    }
}

/// Convenience alias for record results.
pub type RecordResult<T> = Result<T, RecordError>;
