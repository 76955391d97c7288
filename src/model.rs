//! Schema-aware views over cached resources.
//!
//! [`Record`] reads a resource through its schema: attributes are cast to
//! their declared kind and relationships resolve to other records in the
//! same state. [`Model`] goes one step further and decodes the attributes
//! into a plain Rust struct.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::cache::CacheState;
use crate::document::{Resource, ResourceIdentifier};
use crate::error::{CacheError, Result};
use crate::schema::{ResourceSchema, SchemaRegistry};

/// A resource paired with its schema and the state it was read from.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
  resource: &'a Resource,
  schema: &'a ResourceSchema,
  state: &'a CacheState,
  registry: &'a SchemaRegistry,
}

impl<'a> Record<'a> {
  /// Fails with `UnregisteredType` when the resource's type has no schema.
  pub fn new(resource: &'a Resource, state: &'a CacheState, registry: &'a SchemaRegistry) -> Result<Self> {
    Ok(Self {
      resource,
      schema: registry.get(&resource.kind)?,
      state,
      registry,
    })
  }

  /// Look up `(kind, id)` in `state`.
  pub fn find(
    state: &'a CacheState,
    registry: &'a SchemaRegistry,
    kind: &str,
    id: &str,
  ) -> Result<Option<Self>> {
    let schema = registry.get(kind)?;
    Ok(state.resource(kind, id).map(|resource| Self {
      resource,
      schema,
      state,
      registry,
    }))
  }

  pub fn resource(&self) -> &'a Resource {
    self.resource
  }

  pub fn id(&self) -> &'a str {
    &self.resource.id
  }

  pub fn kind(&self) -> &'a str {
    &self.resource.kind
  }

  pub fn is_pending(&self) -> bool {
    self.resource.is_pending
  }

  /// Attribute by field name, cast to its declared kind.
  ///
  /// Undeclared fields are returned as stored, or `null` when absent.
  pub fn attr(&self, field: &str) -> Value {
    let value = self.resource.attributes.get(self.schema.attribute_key(field));
    match self.schema.attributes.get(field) {
      Some(def) => def.cast(value),
      None => value.cloned().unwrap_or(Value::Null),
    }
  }

  /// Every declared attribute keyed by field name, plus any undeclared
  /// attributes under their JSON key.
  pub fn attributes(&self) -> Map<String, Value> {
    let mut out = Map::new();

    for field in self.schema.attributes.keys() {
      out.insert(field.clone(), self.attr(field));
    }

    for (key, value) in &self.resource.attributes {
      let declared = self
        .schema
        .attributes
        .iter()
        .any(|(field, def)| def.name.as_deref().unwrap_or(field) == key);
      if !declared {
        out.insert(key.clone(), value.clone());
      }
    }

    out
  }

  /// Linked identifiers for a relationship field, in server order.
  pub fn relationship_ids(&self, field: &str) -> Vec<ResourceIdentifier> {
    self
      .resource
      .relationships
      .get(self.schema.relationship_key(field))
      .and_then(|r| r.data.as_ref())
      .map(|linkage| linkage.to_vec())
      .unwrap_or_default()
  }

  /// The related record, or `None` when unlinked or not cached.
  pub fn has_one(&self, field: &str) -> Result<Option<Record<'a>>> {
    match self.relationship_ids(field).first() {
      Some(target) => self.related(target),
      None => Ok(None),
    }
  }

  /// Related records that are cached. Missing ones are skipped.
  pub fn has_many(&self, field: &str) -> Result<Vec<Record<'a>>> {
    let mut out = Vec::new();
    for target in self.relationship_ids(field) {
      if let Some(record) = self.related(&target)? {
        out.push(record);
      }
    }
    Ok(out)
  }

  fn related(&self, target: &ResourceIdentifier) -> Result<Option<Record<'a>>> {
    Record::find(self.state, self.registry, &target.kind, &target.id)
  }

  /// Decode the cast attributes, plus `id`, into `M`.
  pub fn decode<M: DeserializeOwned>(&self) -> Result<M> {
    let mut attributes = self.attributes();
    attributes.insert("id".to_string(), Value::String(self.resource.id.clone()));

    serde_json::from_value(Value::Object(attributes)).map_err(|e| CacheError::Decode {
      what: format!("{} {}", self.resource.kind, self.resource.id),
      message: e.to_string(),
    })
  }
}

/// A Rust type backed by one resource type.
///
/// ```
/// use jsonapi_cache::attributes::AttributeDef;
/// use jsonapi_cache::model::Model;
/// use jsonapi_cache::schema::ResourceSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Person {
///   id: String,
///   name: String,
/// }
///
/// impl Model for Person {
///   const TYPE: &'static str = "people";
///
///   fn schema() -> ResourceSchema {
///     ResourceSchema::new(Self::TYPE)
///       .attribute("name", AttributeDef::string())
///       .has_many("comments", "comments")
///   }
/// }
/// ```
pub trait Model: DeserializeOwned {
  const TYPE: &'static str;

  fn schema() -> ResourceSchema {
    ResourceSchema::new(Self::TYPE)
  }
}

impl SchemaRegistry {
  pub fn register_model<M: Model>(&mut self) {
    self.register(M::schema());
  }

  pub fn with_model<M: Model>(mut self) -> Self {
    self.register_model::<M>();
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::attributes::AttributeDef;
  use crate::cache::{reduce, Action, CacheOptions};
  use crate::document::{Document, Relationship};
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Person {
    id: String,
    name: String,
    age: Option<f64>,
    #[serde(rename = "isSubscribed")]
    is_subscribed: bool,
  }

  impl Model for Person {
    const TYPE: &'static str = "people";

    fn schema() -> ResourceSchema {
      ResourceSchema::new(Self::TYPE)
        .attribute("name", AttributeDef::string())
        .attribute("age", AttributeDef::number())
        .attribute(
          "isSubscribed",
          AttributeDef::boolean().named("is-subscribed").with_default(false),
        )
        .has_many("comments", "comments")
    }
  }

  fn registry() -> SchemaRegistry {
    SchemaRegistry::new().with_model::<Person>().with(
      ResourceSchema::new("comments")
        .attribute("body", AttributeDef::string())
        .has_one("author", "people"),
    )
  }

  fn state(registry: &SchemaRegistry) -> CacheState {
    let person = Resource::new("people", "9")
      .with_attribute("name", "Joe")
      .with_attribute("age", "42")
      .with_attribute("is-subscribed", "1")
      .with_relationship(
        "comments",
        Relationship::many(vec![
          ResourceIdentifier::new("comments", "5"),
          ResourceIdentifier::new("comments", "404"),
        ]),
      );
    let comment = Resource::new("comments", "5").with_attribute("body", "First");

    // the comment is cached first so the person's link is mirrored onto it
    [comment, person].into_iter().fold(CacheState::new(), |state, resource| {
      reduce(
        &state,
        &Action::Hydrate(Document::one(resource)),
        registry,
        &CacheOptions::default(),
      )
    })
  }

  #[test]
  fn test_attributes_are_cast() {
    let registry = registry();
    let state = state(&registry);
    let person = Record::find(&state, &registry, "people", "9").unwrap().unwrap();

    assert_eq!(person.attr("age"), json!(42.0));
    assert_eq!(person.attr("isSubscribed"), json!(true));
    assert_eq!(person.attr("nickname"), Value::Null);
  }

  #[test]
  fn test_relationships_resolve_in_both_directions() {
    let registry = registry();
    let state = state(&registry);
    let person = Record::find(&state, &registry, "people", "9").unwrap().unwrap();

    let comments = person.has_many("comments").unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].attr("body"), json!("First"));

    let author = comments[0].has_one("author").unwrap().unwrap();
    assert_eq!(author.id(), "9");
  }

  #[test]
  fn test_unregistered_related_type_is_an_error() {
    let registry = registry();
    let state = reduce(
      &CacheState::new(),
      &Action::Hydrate(Document::one(Resource::new("comments", "1").with_relationship(
        "author",
        Relationship::one(ResourceIdentifier::new("robots", "1")),
      ))),
      &registry,
      &CacheOptions::default(),
    );
    let comment = Record::find(&state, &registry, "comments", "1").unwrap().unwrap();

    assert_eq!(
      comment.has_one("author").unwrap_err(),
      CacheError::UnregisteredType("robots".to_string())
    );
  }

  #[test]
  fn test_decode_model() {
    let registry = registry();
    let state = state(&registry);
    let person: Person = Record::find(&state, &registry, "people", "9")
      .unwrap()
      .unwrap()
      .decode()
      .unwrap();

    assert_eq!(
      person,
      Person {
        id: "9".to_string(),
        name: "Joe".to_string(),
        age: Some(42.0),
        is_subscribed: true,
      }
    );
  }

  #[test]
  fn test_decode_failure_names_the_resource() {
    let registry = registry();
    let state = reduce(
      &CacheState::new(),
      &Action::Hydrate(Document::one(Resource::new("comments", "3"))),
      &registry,
      &CacheOptions::default(),
    );
    let err = Record::find(&state, &registry, "comments", "3")
      .unwrap()
      .unwrap()
      .decode::<Person>()
      .unwrap_err();

    assert!(matches!(err, CacheError::Decode { what, .. } if what == "comments 3"));
  }
}
