//! Cell values for the in-memory engine, with SQL-style comparison.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::plan::Literal;

/// A single cell.
///
/// Untagged for JSON: `null`, booleans, integers, floats, `YYYY-MM-DD`
/// strings (dates) and other strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Str(String),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// SQL comparison: `None` when either side is null or the types do not
    /// compare. Strings compare against dates by parsing them as dates.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Str(s)) => Some(a.cmp(&parse_date(s)?)),
            (Value::Str(s), Value::Date(b)) => Some(parse_date(s)?.cmp(b)),
            _ => None,
        }
    }

    /// Hashable key used for join and group matching.
    ///
    /// Integers and floats with the same numeric value share a key.
    pub(crate) fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) if f.fract() == 0.0 && (I64_MIN..I64_MAX_EXCLUSIVE).contains(f) => {
                ValueKey::Int(*f as i64)
            }
            Value::Float(f) => ValueKey::Num(f.to_bits()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Str(s) => ValueKey::Str(s.clone()),
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::String(s) => Value::Str(s.clone()),
            Literal::Number(n) => Value::Float(*n),
            Literal::Date(d) => Value::Date(*d),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Bounds of the floats that convert to `i64` exactly.
const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Bits of a non-integral float.
    Num(u64),
    Date(NaiveDate),
    Str(String),
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
