//! Error types for schema assembly.

use thiserror::Error;

/// Errors raised while loading or assembling schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("model defined twice: {0}")]
    DuplicateModel(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("model {model} extends unknown model {parent}")]
    UnknownParent { model: String, parent: String },

    #[error("ancestry cycle through model {0}")]
    AncestryCycle(String),

    #[error("field {field} declared twice on model {model}")]
    DuplicateField { model: String, field: String },

    #[error("field {field} on model {model} shadows a base field")]
    ReservedField { model: String, field: String },

    #[error("relation {relation} on model {model} targets unknown model {target}")]
    UnknownRelationTarget {
        model: String,
        relation: String,
        target: String,
    },

    #[error("invalid field {field} on model {model}: {reason}")]
    InvalidField {
        model: String,
        field: String,
        reason: String,
    },

    #[error("models {first} and {second} share the resource name {plural}")]
    PluralCollision {
        plural: String,
        first: String,
        second: String,
    },

    #[error("schema parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
