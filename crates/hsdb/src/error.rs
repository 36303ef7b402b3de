use hsdb_index::IndexError;
use hsdb_query::QueryError;
use hsdb_record::RecordError;
use hsdb_schema::SchemaError;
use hsdb_storage::StorageError;
use hsdb_types::{Status, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("expected a {expected} record, got {found}")]
    WrongModel { expected: String, found: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid record id {raw}: {source}")]
    InvalidId {
        raw: String,
        #[source]
        source: TypeError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl SdkError {
    /// Status code an adapter should report for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::UnknownModel(_) | Self::InvalidId { .. } => Status::NotFound,
            Self::Storage(e) => e.status(),
            Self::Index(e) => e.status(),
            Self::Query(e) => e.status(),
            Self::Record(e) => e.status(),
            Self::Schema(SchemaError::UnknownModel(_)) => Status::NotFound,
            Self::WrongModel { .. } | Self::Config(_) | Self::Schema(_) => Status::Internal,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
