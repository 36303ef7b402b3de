use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome code reported by mutating store operations.
///
/// The numeric values follow HTTP so adapters can forward them unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The addressed record does not exist.
    NotFound,
    /// A record with the same id (or unique value) already exists.
    Conflict,
    /// The index write succeeded but the durable write did not; the index
    /// entry was rolled back.
    Gone,
    /// Validation or backend failure.
    Internal,
}

impl Status {
    /// Numeric status code.
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Gone => 410,
            Self::Internal => 500,
        }
    }

    /// Returns `true` for [`Status::Ok`].
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "ok",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Gone => "gone",
            Self::Internal => "internal error",
        };
        write!(f, "{} {label}", self.code())
    }
}
