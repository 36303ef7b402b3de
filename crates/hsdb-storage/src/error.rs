//! Error types for persistence backends and hybrid storage.

use hsdb_index::IndexError;
use hsdb_query::QueryError;
use hsdb_record::RecordError;
use hsdb_schema::SchemaError;
use hsdb_types::{RecordId, Status};
use thiserror::Error;

/// Failures of a persistence backend.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid artifact path: {0}")]
    InvalidPath(String),

    /// The write reported success but the artifact is not there.
    #[error("artifact missing after write: {0}")]
    Missing(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors from hybrid storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The index changed but the durable write failed; the index change
    /// was rolled back.
    #[error("durable write failed for {id}: {source}")]
    Gone {
        id: RecordId,
        #[source]
        source: PersistError,
    },

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("invalid fixture source {source_name}: {reason}")]
    Fixture { source_name: String, reason: String },

    #[error("invalid index entry {path}: {reason}")]
    InvalidIndexEntry { path: String, reason: String },

    #[error("apply queue is closed")]
    QueueClosed,
}

impl StorageError {
    /// Status code reported for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::Index(e) => e.status(),
            Self::Gone { .. } => Status::Gone,
            Self::Record(e) => e.status(),
            Self::Query(e) => e.status(),
            Self::Schema(SchemaError::UnknownModel(_)) => Status::NotFound,
            _ => Status::Internal,
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
