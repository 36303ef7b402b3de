//! Error types for index database operations.

use hsdb_record::{Record, RecordError};
use hsdb_schema::SchemaError;
use hsdb_types::{RecordId, Status};
use thiserror::Error;

/// Errors from index database mutations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// A record with the same id is already present.
    #[error("record already exists: {}", existing.id())]
    Conflict { existing: Box<Record> },

    #[error("value {value} of unique field {field} on model {model} is already held by {holder}")]
    UniqueViolation {
        model: String,
        field: String,
        value: String,
        holder: RecordId,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl IndexError {
    /// Status code reported for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict { .. } | Self::UniqueViolation { .. } => Status::Conflict,
            Self::Record(e) => e.status(),
            Self::Schema(_) => Status::Internal,
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
