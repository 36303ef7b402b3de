use thiserror::Error;

/// Errors produced by value and type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("invalid record id: {0}")]
    InvalidId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid {expected} literal: {raw:?}")]
    InvalidLiteral { expected: String, raw: String },
}
