use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::RecordId;
use crate::value::{parse_timestamp, Value};

/// Declared type constraint of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// No constraint.
    #[default]
    Any,
    Bool,
    Integer,
    Float,
    String,
    /// UTC timestamp; RFC 3339 strings are accepted and converted.
    Timestamp,
    /// A record id in string form.
    Id,
    List,
    Map,
}

impl FieldType {
    /// Check `value` against this type, converting where the conversion is
    /// lossless (integer to float, integral float to integer, RFC 3339 string
    /// to timestamp). `Null` always passes; presence is a separate check.
    pub fn coerce(self, value: Value) -> Result<Value, TypeError> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Any, v) => Ok(v),
            (Self::Bool, v @ Value::Bool(_)) => Ok(v),
            (Self::Integer, v @ Value::Int(_)) => Ok(v),
            (Self::Integer, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                Ok(Value::Int(f as i64))
            }
            (Self::Float, v @ Value::Float(_)) => Ok(v),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::String, v @ Value::String(_)) => Ok(v),
            (Self::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
            (Self::Timestamp, Value::String(s)) => parse_timestamp(&s)
                .map(Value::Timestamp)
                .ok_or(TypeError::InvalidTimestamp(s)),
            (Self::Id, Value::String(s)) => Ok(Value::String(RecordId::parse(&s)?.to_string())),
            (Self::List, v @ Value::List(_)) => Ok(v),
            (Self::Map, v @ Value::Map(_)) => Ok(v),
            (expected, found) => Err(TypeError::Mismatch {
                expected: expected.to_string(),
                found: found.kind().to_string(),
            }),
        }
    }

    /// Returns `true` if `value` satisfies this type without conversion.
    pub fn accepts(self, value: &Value) -> bool {
        self.coerce(value.clone()).map_or(false, |coerced| &coerced == value)
    }

    /// Parse a query-string literal as a value of this type.
    pub fn parse_param(self, raw: &str) -> Result<Value, TypeError> {
        let invalid = || TypeError::InvalidLiteral {
            expected: self.to_string(),
            raw: raw.to_string(),
        };
        match self {
            Self::Any => Ok(parse_loose(raw)),
            Self::Bool => match raw.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Integer => raw.trim().parse::<i64>().map(Value::Int).map_err(|_| invalid()),
            Self::Float => raw.trim().parse::<f64>().map(Value::Float).map_err(|_| invalid()),
            Self::String | Self::Id | Self::Timestamp => self.coerce(Value::String(raw.to_string())),
            Self::List => Ok(Value::List(
                raw.split(',')
                    .filter(|s| !s.is_empty())
                    .map(parse_loose)
                    .collect(),
            )),
            Self::Map => serde_json::from_str::<serde_json::Value>(raw)
                .map(Value::from)
                .map_err(|_| invalid())
                .and_then(|v| self.coerce(v)),
        }
    }
}

/// Parse a literal without a declared type: bool, null, integer, float,
/// falling back to a string.
fn parse_loose(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                Value::Float(f)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Id => "id",
            Self::List => "list",
            Self::Map => "map",
        };
        write!(f, "{name}")
    }
}
