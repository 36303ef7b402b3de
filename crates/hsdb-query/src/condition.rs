use std::cmp::Ordering;
use std::fmt;

use hsdb_types::Value;
use serde::Serialize;

/// Comparison operator of a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    /// The record's value is a member of the target list.
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Self::Equals,
        Self::GreaterThan,
        Self::GreaterThanOrEquals,
        Self::LessThan,
        Self::LessThanOrEquals,
        Self::Contains,
    ];

    /// Suffix used in the parameter grammar (`field__gte`).
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEquals => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEquals => "lte",
            Self::Contains => "contains",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.suffix() == suffix)
    }

    /// Name of the builder method, for error messages.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEquals => "greater_than_or_equals",
            Self::LessThan => "less_than",
            Self::LessThanOrEquals => "less_than_or_equals",
            Self::Contains => "contains",
        }
    }

    /// Apply the operator. Incomparable values never match.
    pub fn evaluate(self, actual: &Value, target: &Value) -> bool {
        let ordering = || actual.compare(target);
        match self {
            Self::Equals => actual.loose_eq(target),
            Self::GreaterThan => ordering() == Some(Ordering::Greater),
            Self::GreaterThanOrEquals => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::LessThan => ordering() == Some(Ordering::Less),
            Self::LessThanOrEquals => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Self::Contains => match (actual, target) {
                (_, Value::List(items)) => items.iter().any(|item| actual.loose_eq(item)),
                (Value::List(items), scalar) => items.iter().any(|item| item.loose_eq(scalar)),
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// One closed `(field, operator, value)` condition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Condition {
    /// Field name, possibly a dotted path into a map value.
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    pub fn is_nested(&self) -> bool {
        self.field.contains('.')
    }

    /// Parameter-grammar key: bare field for equality, `field__op` otherwise.
    pub fn param_key(&self) -> String {
        match self.op {
            Operator::Equals => self.field.clone(),
            op => format!("{}__{}", self.field, op.suffix()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}
