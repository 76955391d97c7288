//! Query keys: the deterministic hash identifying a logical query.
//!
//! The hash doubles as the query index key and the de-duplication key for
//! in-flight requests.

use serde_json::Value;
use std::fmt::Display;
use url::form_urlencoded;

/// Parameters of a query, either as ordered key/value pairs or a literal
/// query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
  Pairs(Vec<(String, String)>),
  Raw(String),
}

impl Default for QueryParams {
  fn default() -> Self {
    QueryParams::Pairs(Vec::new())
  }
}

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a parameter. Keys keep insertion order.
  pub fn param(self, key: impl Into<String>, value: impl Display) -> Self {
    self.push(key.into(), value.to_string())
  }

  /// Append a list parameter, rendered comma-separated.
  pub fn param_list<I, V>(self, key: impl Into<String>, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Display,
  {
    let joined = values
      .into_iter()
      .map(|v| v.to_string())
      .collect::<Vec<_>>()
      .join(",");
    self.push(key.into(), joined)
  }

  fn push(self, key: String, value: String) -> Self {
    match self {
      QueryParams::Pairs(mut pairs) => {
        pairs.push((key, value));
        QueryParams::Pairs(pairs)
      }
      QueryParams::Raw(mut raw) => {
        if !raw.is_empty() {
          raw.push('&');
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
          .append_pair(&key, &value)
          .finish();
        raw.push_str(&encoded);
        QueryParams::Raw(raw)
      }
    }
  }

  /// Build pairs from a JSON object. Arrays become comma-separated lists,
  /// nested objects are embedded as JSON. Non-objects yield no parameters.
  pub fn from_json(query: &Value) -> Self {
    let Value::Object(map) = query else {
      return Self::default();
    };

    let pairs = map
      .iter()
      .map(|(key, value)| (key.clone(), render_value(value)))
      .collect();
    QueryParams::Pairs(pairs)
  }

  /// `k1=v1,k2=v2` for pairs, the literal string (without a leading `?`)
  /// otherwise.
  pub fn hash_fragment(&self) -> String {
    match self {
      QueryParams::Pairs(pairs) => pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(","),
      QueryParams::Raw(raw) => raw.trim_start_matches('?').to_string(),
    }
  }

  /// URL-encoded query string, without the leading `?`.
  pub fn query_string(&self) -> String {
    match self {
      QueryParams::Pairs(pairs) => form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish(),
      QueryParams::Raw(raw) => raw.trim_start_matches('?').to_string(),
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      QueryParams::Pairs(pairs) => pairs.is_empty(),
      QueryParams::Raw(raw) => raw.trim_start_matches('?').is_empty(),
    }
  }
}

fn render_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

impl From<&str> for QueryParams {
  fn from(raw: &str) -> Self {
    QueryParams::Raw(raw.to_string())
  }
}

impl From<String> for QueryParams {
  fn from(raw: String) -> Self {
    QueryParams::Raw(raw)
  }
}

impl<K: Into<String>, V: Display> From<Vec<(K, V)>> for QueryParams {
  fn from(pairs: Vec<(K, V)>) -> Self {
    QueryParams::Pairs(
      pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect(),
    )
  }
}

/// Logical queries the facade can issue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKey {
  /// One resource by id
  Find { kind: String, id: String },
  /// Every resource of a type
  FindAll { kind: String },
  /// A filtered collection, optionally against a custom endpoint
  Query {
    kind: String,
    params: QueryParams,
    endpoint: Option<String>,
  },
}

impl QueryKey {
  pub fn kind(&self) -> &str {
    match self {
      Self::Find { kind, .. } | Self::FindAll { kind } | Self::Query { kind, .. } => kind,
    }
  }

  /// Deterministic cache key.
  ///
  /// Queries hash as `<type>.<k1>=<v1>,<k2>=<v2>` (or `<type>.<raw string>`),
  /// with `@<endpoint>` appended when a custom endpoint is used.
  pub fn cache_hash(&self) -> String {
    match self {
      Self::Find { kind, id } => format!("{}#{}", kind, id),
      Self::FindAll { kind } => kind.clone(),
      Self::Query {
        kind,
        params,
        endpoint,
      } => match endpoint {
        Some(endpoint) => format!("{}.{}@{}", kind, params.hash_fragment(), endpoint),
        None => format!("{}.{}", kind, params.hash_fragment()),
      },
    }
  }
}
