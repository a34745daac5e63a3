//! Cell values produced by column accessors.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::column::SemanticType;

/// A raw value extracted from a row by a column accessor.
///
/// Filtering, sorting and export all operate on `Value`s, never on the
/// rendered display string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(f64),
  Text(String),
  Date(DateTime<Utc>),
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Numeric view of the value, only for `Number`.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  /// Lower-cased string form used by substring filters.
  pub fn search_text(&self) -> String {
    self.to_string().to_lowercase()
  }

  /// Compare two values for sorting.
  ///
  /// Only like-typed numbers, strings and dates are comparable. Every other
  /// pairing (including nulls and booleans) is `Equal`, so a stable sort
  /// leaves such rows where they were.
  pub fn compare(&self, other: &Value) -> Ordering {
    match (self, other) {
      (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
      (Value::Text(a), Value::Text(b)) => collate(a, b),
      (Value::Date(a), Value::Date(b)) => a.cmp(b),
      _ => Ordering::Equal,
    }
  }

  /// Build a value from a JSON node, coercing strings toward the declared type.
  pub fn from_json(json: &serde_json::Value, ty: SemanticType) -> Self {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(*b),
      serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
      serde_json::Value::String(s) => Self::coerce_str(s, ty),
      other => Value::Text(other.to_string()),
    }
  }

  fn coerce_str(s: &str, ty: SemanticType) -> Self {
    match ty {
      SemanticType::Number => s
        .trim()
        .parse::<f64>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::Text(s.to_string())),
      SemanticType::Date => parse_date(s)
        .map(Value::Date)
        .unwrap_or_else(|| Value::Text(s.to_string())),
      SemanticType::Boolean => match s.trim().to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(s.to_string()),
      },
      SemanticType::String => Value::Text(s.to_string()),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => Ok(()),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Number(n) => write!(f, "{}", n),
      Value::Text(s) => f.write_str(s),
      Value::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Text(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Text(s)
  }
}

impl From<&String> for Value {
  fn from(s: &String) -> Self {
    Value::Text(s.clone())
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    Value::Number(n)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n as f64)
  }
}

impl From<i32> for Value {
  fn from(n: i32) -> Self {
    Value::Number(n.into())
  }
}

impl From<u32> for Value {
  fn from(n: u32) -> Self {
    Value::Number(n.into())
  }
}

impl From<u64> for Value {
  fn from(n: u64) -> Self {
    Value::Number(n as f64)
  }
}

impl From<DateTime<Utc>> for Value {
  fn from(d: DateTime<Utc>) -> Self {
    Value::Date(d)
  }
}

impl From<NaiveDate> for Value {
  fn from(d: NaiveDate) -> Self {
    Value::Date(d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(Value::Null)
  }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
    return Some(dt.and_utc());
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

/// Case- and accent-insensitive string ordering.
///
/// Strings are decomposed, stripped of combining marks and lower-cased, then
/// compared by code point.
pub fn collate(a: &str, b: &str) -> Ordering {
  fold(a).cmp(fold(b))
}

fn fold(s: &str) -> impl Iterator<Item = char> + '_ {
  s.nfd()
    .filter(|c| !is_combining_mark(*c))
    .flat_map(char::to_lowercase)
}
