//! Resource schemas: attribute and relationship declarations per type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::attributes::AttributeDef;
use crate::document::Resource;
use crate::error::{CacheError, Result};

/// The four kinds of request a resource can be subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Read,
  Update,
  Delete,
}

impl Operation {
  pub fn method(self) -> &'static str {
    match self {
      Operation::Create => "POST",
      Operation::Read => "GET",
      Operation::Update => "PATCH",
      Operation::Delete => "DELETE",
    }
  }
}

/// Declared relationship from one type to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
  /// Target resource type
  pub resource: String,
  /// JSON key when it differs from the field name
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub is_array: bool,
}

impl RelationshipDef {
  pub fn has_one(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      name: None,
      is_array: false,
    }
  }

  pub fn has_many(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      name: None,
      is_array: true,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

/// The field on a related type that points back to an owner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackReference {
  /// JSON key under `relationships`
  pub key: String,
  pub is_array: bool,
}

/// URL templates per operation. `:param` segments are filled from the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
  #[serde(default = "Endpoints::collection")]
  pub create: String,
  #[serde(default = "Endpoints::collection")]
  pub read: String,
  #[serde(default = "Endpoints::member")]
  pub update: String,
  #[serde(default = "Endpoints::member")]
  pub delete: String,
}

impl Default for Endpoints {
  fn default() -> Self {
    Self {
      create: Self::collection(),
      read: Self::collection(),
      update: Self::member(),
      delete: Self::member(),
    }
  }
}

impl Endpoints {
  fn collection() -> String {
    ":type".to_string()
  }

  fn member() -> String {
    ":type/:id".to_string()
  }

  pub fn template(&self, operation: Operation) -> &str {
    match operation {
      Operation::Create => &self.create,
      Operation::Read => &self.read,
      Operation::Update => &self.update,
      Operation::Delete => &self.delete,
    }
  }

  /// Resolve the endpoint for `operation` against a resource.
  pub fn resolve(&self, operation: Operation, resource: &Resource) -> String {
    parse_params(self.template(operation), resource)
  }
}

/// Substitute `:name` placeholders with `type`, `id`, or a scalar attribute.
///
/// ```
/// use jsonapi_cache::document::Resource;
/// use jsonapi_cache::schema::parse_params;
///
/// let animal = Resource::new("animal", "5");
/// assert_eq!(parse_params("/api/v1/:type/:id", &animal), "/api/v1/animal/5");
/// ```
pub fn parse_params(template: &str, resource: &Resource) -> String {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(start) = rest.find(':') {
    out.push_str(&rest[..start]);
    let after = &rest[start + 1..];
    let end = after.find(['/', '.', '?']).unwrap_or(after.len());
    let param = &after[..end];

    match param {
      "" => out.push(':'),
      "type" => out.push_str(&resource.kind),
      "id" => out.push_str(&resource.id),
      name => match resource.attributes.get(name) {
        Some(Value::String(s)) => out.push_str(s),
        Some(Value::Number(n)) => out.push_str(&n.to_string()),
        Some(Value::Bool(b)) => out.push_str(&b.to_string()),
        _ => {}
      },
    }
    rest = &after[end..];
  }
  out.push_str(rest);
  out
}

/// Schema of one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub attributes: BTreeMap<String, AttributeDef>,
  #[serde(default)]
  pub relationships: BTreeMap<String, RelationshipDef>,
  #[serde(default)]
  pub endpoints: Endpoints,
}

impl ResourceSchema {
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      attributes: BTreeMap::new(),
      relationships: BTreeMap::new(),
      endpoints: Endpoints::default(),
    }
  }

  pub fn attribute(mut self, field: impl Into<String>, def: AttributeDef) -> Self {
    self.attributes.insert(field.into(), def);
    self
  }

  pub fn has_one(mut self, field: impl Into<String>, resource: impl Into<String>) -> Self {
    self
      .relationships
      .insert(field.into(), RelationshipDef::has_one(resource));
    self
  }

  pub fn has_many(mut self, field: impl Into<String>, resource: impl Into<String>) -> Self {
    self
      .relationships
      .insert(field.into(), RelationshipDef::has_many(resource));
    self
  }

  pub fn relationship(mut self, field: impl Into<String>, def: RelationshipDef) -> Self {
    self.relationships.insert(field.into(), def);
    self
  }

  pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
    self.endpoints = endpoints;
    self
  }

  /// JSON key for a relationship field.
  pub fn relationship_key<'a>(&'a self, field: &'a str) -> &'a str {
    self
      .relationships
      .get(field)
      .and_then(|def| def.name.as_deref())
      .unwrap_or(field)
  }

  /// JSON key for an attribute field.
  pub fn attribute_key<'a>(&'a self, field: &'a str) -> &'a str {
    self
      .attributes
      .get(field)
      .and_then(|def| def.name.as_deref())
      .unwrap_or(field)
  }

  /// The relationship on this type that targets `owner_type`.
  ///
  /// When several fields target the same type, the first in field order wins.
  pub fn back_reference(&self, owner_type: &str) -> Option<BackReference> {
    self
      .relationships
      .iter()
      .find(|(_, def)| def.resource == owner_type)
      .map(|(field, def)| BackReference {
        key: def.name.clone().unwrap_or_else(|| field.clone()),
        is_array: def.is_array,
      })
  }
}

/// Lookup table of schemas by type.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
  schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, schema: ResourceSchema) {
    self.schemas.insert(schema.kind.clone(), schema);
  }

  pub fn with(mut self, schema: ResourceSchema) -> Self {
    self.register(schema);
    self
  }

  pub fn get(&self, kind: &str) -> Result<&ResourceSchema> {
    self
      .schemas
      .get(kind)
      .ok_or_else(|| CacheError::UnregisteredType(kind.to_string()))
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.schemas.contains_key(kind)
  }

  /// Back-reference on `child_type` pointing at `owner_type`, if declared.
  pub fn back_reference(&self, child_type: &str, owner_type: &str) -> Option<BackReference> {
    self
      .schemas
      .get(child_type)
      .and_then(|schema| schema.back_reference(owner_type))
  }
}

impl FromIterator<ResourceSchema> for SchemaRegistry {
  fn from_iter<I: IntoIterator<Item = ResourceSchema>>(iter: I) -> Self {
    let mut registry = Self::new();
    for schema in iter {
      registry.register(schema);
    }
    registry
  }
}
