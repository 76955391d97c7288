//! Serde types matching JSON:API documents.
//!
//! Resources are kept close to the wire format so that a cached record can be
//! handed back to the server unchanged. Typed access lives in [`crate::model`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Accept both `"5"` and `5` for identifiers; servers disagree on this.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Str(String),
    Num(serde_json::Number),
    Null(()),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Str(s) => s,
    RawId::Num(n) => n.to_string(),
    RawId::Null(()) => String::new(),
  })
}

fn is_false(value: &bool) -> bool {
  !*value
}

// ============================================================================
// Identifiers and linkage
// ============================================================================

/// `{type, id}` pair identifying one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
  #[serde(rename = "type", default)]
  pub kind: String,
  #[serde(default, deserialize_with = "deserialize_id")]
  pub id: String,
}

impl ResourceIdentifier {
  pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
    }
  }
}

/// Relationship linkage: a single identifier or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
  Many(Vec<ResourceIdentifier>),
  One(ResourceIdentifier),
}

impl Linkage {
  /// Normalize to a slice-like list regardless of cardinality.
  pub fn to_vec(&self) -> Vec<ResourceIdentifier> {
    match self {
      Linkage::Many(ids) => ids.clone(),
      Linkage::One(id) => vec![id.clone()],
    }
  }

  pub fn contains_id(&self, id: &str) -> bool {
    match self {
      Linkage::Many(ids) => ids.iter().any(|r| r.id == id),
      Linkage::One(r) => r.id == id,
    }
  }
}

/// A relationship object as found under `relationships.<name>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
  #[serde(default)]
  pub data: Option<Linkage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Value>,
}

impl Relationship {
  pub fn one(target: ResourceIdentifier) -> Self {
    Self {
      data: Some(Linkage::One(target)),
      ..Self::default()
    }
  }

  pub fn many(targets: Vec<ResourceIdentifier>) -> Self {
    Self {
      data: Some(Linkage::Many(targets)),
      ..Self::default()
    }
  }
}

// ============================================================================
// Resources
// ============================================================================

/// The atomic cached entity.
///
/// Missing `type` or `id` deserialize to empty strings: the cache stores
/// what it was given and leaves validation to the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resource {
  #[serde(rename = "type", default)]
  pub kind: String,
  #[serde(default, deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub attributes: Map<String, Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub relationships: BTreeMap<String, Relationship>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Value>,
  /// Optimistic-write marker set while an update or delete is in flight
  #[serde(rename = "isPending", default, skip_serializing_if = "is_false")]
  pub is_pending: bool,
}

impl Resource {
  pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
      ..Self::default()
    }
  }

  pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.attributes.insert(key.into(), value.into());
    self
  }

  pub fn with_relationship(mut self, key: impl Into<String>, relationship: Relationship) -> Self {
    self.relationships.insert(key.into(), relationship);
    self
  }

  pub fn identifier(&self) -> ResourceIdentifier {
    ResourceIdentifier::new(&self.kind, &self.id)
  }
}

// ============================================================================
// Documents
// ============================================================================

/// Primary data of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
  Many(Vec<Resource>),
  One(Box<Resource>),
}

/// A top-level JSON:API document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
  #[serde(default)]
  pub data: Option<PrimaryData>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub included: Vec<Resource>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Value>,
}

impl Document {
  pub fn one(resource: Resource) -> Self {
    Self {
      data: Some(PrimaryData::One(Box::new(resource))),
      ..Self::default()
    }
  }

  pub fn many(resources: Vec<Resource>) -> Self {
    Self {
      data: Some(PrimaryData::Many(resources)),
      ..Self::default()
    }
  }

  pub fn with_included(mut self, included: Vec<Resource>) -> Self {
    self.included = included;
    self
  }

  /// Primary data normalized to a list, in server order.
  pub fn primary(&self) -> Vec<&Resource> {
    match &self.data {
      Some(PrimaryData::Many(resources)) => resources.iter().collect(),
      Some(PrimaryData::One(resource)) => vec![resource.as_ref()],
      None => Vec::new(),
    }
  }

  /// Primary data followed by included resources.
  pub fn resources(&self) -> impl Iterator<Item = &Resource> {
    self.primary().into_iter().chain(self.included.iter())
  }

  /// `{type, id}` of the primary data, in server order.
  pub fn identifiers(&self) -> Vec<ResourceIdentifier> {
    self.primary().into_iter().map(Resource::identifier).collect()
  }
}
