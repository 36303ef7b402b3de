//! Error types for query building and execution.

use hsdb_schema::SchemaError;
use hsdb_types::{Status, TypeError};
use thiserror::Error;

/// Query misuse and parameter errors. All are raised immediately; a failed
/// query must be rebuilt.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("model {model} has no field {field}")]
    UnknownField { model: String, field: String },

    #[error("operator {0} called without a pending where()")]
    NoPendingField(&'static str),

    #[error("where() called while field {0} is still pending")]
    PendingField(String),

    #[error("query already executed")]
    AlreadyExecuted,

    #[error("malformed pagination: {0}")]
    MalformedPagination(String),

    #[error("invalid parameter {key}: {reason}")]
    InvalidParam { key: String, reason: String },

    #[error("condition on {field}: {source}")]
    Type {
        field: String,
        #[source]
        source: TypeError,
    },

    #[error("query projects field {0}; rows are values, not records")]
    Projected(String),

    #[error("model {model} has no reverse relation {name}")]
    UnknownReverse { model: String, name: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl QueryError {
    pub fn status(&self) -> Status {
        match self {
            Self::Schema(SchemaError::UnknownModel(_)) => Status::NotFound,
            _ => Status::Internal,
        }
    }
}

/// Convenience alias for query results.
pub type QueryResult<T> = Result<T, QueryError>;
