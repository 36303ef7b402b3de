//! Dynamically typed field values.
//!
//! A [`Value`] is what a record slot holds. Values convert losslessly to and
//! from `serde_json::Value` (timestamps travel as RFC 3339 strings), compare
//! numerically across integer/float kinds, and reduce to a canonical
//! [`ValueKey`] for hash-based indexing.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single field value.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Order two values.
    ///
    /// Integers and floats compare numerically with each other; strings,
    /// bools and timestamps compare within their own kind. A timestamp also
    /// compares with an RFC 3339 string. Every other pairing is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::String(b)) => parse_timestamp(b).map(|b| a.cmp(&b)),
            (Self::String(a), Self::Timestamp(b)) => parse_timestamp(a).map(|a| a.cmp(b)),
            _ => None,
        }
    }

    /// Equality under [`Value::compare`], falling back to structural
    /// equality for lists and maps.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    /// Canonical index key.
    ///
    /// Integral floats share the key of the equal integer, so `17` and
    /// `17.0` land in the same index bucket.
    pub fn index_key(&self) -> ValueKey {
        let key = match self {
            Self::Null => "n".to_string(),
            Self::Bool(b) => format!("b:{b}"),
            Self::Int(i) => format!("i:{i}"),
            Self::Float(f) if is_integral(*f) => format!("i:{}", *f as i64),
            Self::Float(f) => format!("f:{f}"),
            Self::String(s) => format!("s:{s}"),
            Self::Timestamp(t) => format!("t:{}", t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Self::List(_) | Self::Map(_) => {
                format!("j:{}", serde_json::Value::from(self.clone()))
            }
        };
        ValueKey(key)
    }

    /// Resolve a dotted path (`address.city`) through nested maps.
    ///
    /// An empty remainder returns the value itself.
    pub fn resolve_path<'a>(&'a self, path: &str) -> Option<&'a Value> {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Self::Map(map) => map.get(segment)?,
                Self::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Render as a query-parameter literal (lists joined by commas).
    ///
    /// Timestamps keep their full precision. List items are not escaped, so
    /// an item containing a comma reads back as several items.
    pub fn to_param(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::String(s) => s.clone(),
            Self::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::List(items) => items
                .iter()
                .map(Value::to_param)
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Timestamp(t) => Self::String(t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Value::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Canonical, hashable form of a [`Value`] used as an index bucket key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueKey(String);

impl ValueKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
