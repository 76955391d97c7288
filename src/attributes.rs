//! Attribute coercion for typed record access.
//!
//! The cache itself stores attributes exactly as the server sent them; casting
//! happens on read through [`AttributeDef::cast`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
  String,
  Number,
  Boolean,
  /// RFC 3339 timestamps, normalized to UTC
  Date,
  Array,
  Object,
  /// No coercion
  #[default]
  Any,
}

/// Declaration of one attribute on a resource schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
  #[serde(default)]
  pub kind: AttrKind,
  /// JSON key when it differs from the field name (e.g. `is-subscribed`)
  #[serde(default)]
  pub name: Option<String>,
  /// Returned when the attribute is absent
  #[serde(default)]
  pub default: Option<Value>,
}

impl AttributeDef {
  pub fn new(kind: AttrKind) -> Self {
    Self {
      kind,
      ..Self::default()
    }
  }

  pub fn string() -> Self {
    Self::new(AttrKind::String)
  }

  pub fn number() -> Self {
    Self::new(AttrKind::Number)
  }

  pub fn boolean() -> Self {
    Self::new(AttrKind::Boolean)
  }

  pub fn date() -> Self {
    Self::new(AttrKind::Date)
  }

  pub fn array() -> Self {
    Self::new(AttrKind::Array)
  }

  pub fn object() -> Self {
    Self::new(AttrKind::Object)
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_default(mut self, default: impl Into<Value>) -> Self {
    self.default = Some(default.into());
    self
  }

  /// Coerce a raw attribute value.
  ///
  /// Absent values yield the default (or null). Null and values already of
  /// the declared kind pass through untouched.
  pub fn cast(&self, value: Option<&Value>) -> Value {
    let value = match value {
      None => return self.default.clone().unwrap_or(Value::Null),
      Some(Value::Null) => return Value::Null,
      Some(v) => v,
    };

    match self.kind {
      AttrKind::Any => value.clone(),
      AttrKind::String => cast_string(value),
      AttrKind::Number => cast_number(value),
      AttrKind::Boolean => Value::Bool(cast_boolean(value)),
      AttrKind::Date => cast_date(value),
      AttrKind::Array => match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
      },
      AttrKind::Object => match value {
        Value::Object(_) => value.clone(),
        _ => Value::Object(Map::new()),
      },
    }
  }
}

fn cast_string(value: &Value) -> Value {
  match value {
    Value::String(_) => value.clone(),
    Value::Array(_) | Value::Object(_) => Value::String(String::new()),
    Value::Number(n) => Value::String(n.to_string()),
    Value::Bool(b) => Value::String(b.to_string()),
    Value::Null => Value::Null,
  }
}

fn cast_number(value: &Value) -> Value {
  match value {
    Value::Number(_) => value.clone(),
    Value::String(s) => s
      .trim()
      .parse::<f64>()
      .ok()
      .and_then(Number::from_f64)
      .map(Value::Number)
      .unwrap_or(Value::Null),
    _ => Value::Null,
  }
}

fn cast_boolean(value: &Value) -> bool {
  let text = match value {
    Value::Bool(b) => return *b,
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Null => return false,
    Value::Array(_) | Value::Object(_) => return true,
  };

  if text.eq_ignore_ascii_case("true") || text == "1" {
    return true;
  }
  if text.eq_ignore_ascii_case("false") || text == "0" {
    return false;
  }

  match value {
    Value::String(s) => !s.is_empty(),
    Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
    _ => false,
  }
}

fn cast_date(value: &Value) -> Value {
  let parsed: Option<DateTime<Utc>> = match value {
    Value::String(s) => DateTime::parse_from_rfc3339(s)
      .map(|dt| dt.with_timezone(&Utc))
      .ok(),
    // Epoch milliseconds
    Value::Number(n) => n
      .as_i64()
      .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
    _ => None,
  };

  parsed
    .map(|dt| Value::String(dt.to_rfc3339()))
    .unwrap_or(Value::Null)
}
