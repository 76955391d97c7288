//! Merging documents into, and clearing them from, the resource table.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::relationships;
use super::state::{CacheState, ResourceTable};
use crate::document::{Document, Resource, ResourceIdentifier};
use crate::schema::SchemaRegistry;

/// How an incoming resource combines with a cached one of the same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
  /// The incoming resource replaces the cached one wholesale
  #[default]
  Replace,
  /// Attributes and relationships are merged key by key, so partial
  /// (e.g. PATCH) responses keep fields they do not mention
  Deep,
}

/// Which resources a clear removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearSelector {
  /// Empty the whole table
  All,
  /// Empty one type, keeping its (now empty) entry
  Type(String),
  One(ResourceIdentifier),
  Many(Vec<ResourceIdentifier>),
}

impl From<ResourceIdentifier> for ClearSelector {
  fn from(identifier: ResourceIdentifier) -> Self {
    ClearSelector::One(identifier)
  }
}

impl From<Vec<ResourceIdentifier>> for ClearSelector {
  fn from(identifiers: Vec<ResourceIdentifier>) -> Self {
    ClearSelector::Many(identifiers)
  }
}

impl From<&str> for ClearSelector {
  fn from(kind: &str) -> Self {
    ClearSelector::Type(kind.to_string())
  }
}

/// Merge every resource of a document (primary data, then included) into `state`.
///
/// Each resource is written before its relationships are mirrored onto the
/// resources it references, and before the next resource is processed.
pub fn merge(
  state: &CacheState,
  document: &Document,
  registry: &SchemaRegistry,
  strategy: MergeStrategy,
) -> CacheState {
  let mut next = state.clone();

  for incoming in document.resources() {
    write_resource(&mut next.resources, incoming, strategy);
    relationships::synchronize(&mut next.resources, incoming, registry);
  }

  next
}

fn write_resource(table: &mut ResourceTable, incoming: &Resource, strategy: MergeStrategy) {
  let by_id = table.entry(incoming.kind.clone()).or_default();

  match (strategy, by_id.get_mut(&incoming.id)) {
    (MergeStrategy::Deep, Some(existing)) => {
      existing
        .attributes
        .extend(incoming.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
      existing.relationships.extend(
        incoming
          .relationships
          .iter()
          .map(|(k, v)| (k.clone(), v.clone())),
      );
      if incoming.links.is_some() {
        existing.links = incoming.links.clone();
      }
      if incoming.meta.is_some() {
        existing.meta = incoming.meta.clone();
      }
      existing.is_pending = incoming.is_pending;
    }
    _ => {
      by_id.insert(incoming.id.clone(), incoming.clone());
    }
  }
}

/// Remove resources from the table. Relationships pointing at removed
/// resources are left in place.
pub fn clear(state: &CacheState, selector: &ClearSelector) -> CacheState {
  let mut next = state.clone();

  match selector {
    ClearSelector::All => next.resources.clear(),
    ClearSelector::Type(kind) => {
      next.resources.insert(kind.clone(), Default::default());
    }
    ClearSelector::One(identifier) => remove(&mut next.resources, identifier),
    ClearSelector::Many(identifiers) => {
      for identifier in identifiers {
        remove(&mut next.resources, identifier);
      }
    }
  }

  next
}

fn remove(table: &mut ResourceTable, identifier: &ResourceIdentifier) {
  let removed = table
    .get_mut(&identifier.kind)
    .and_then(|by_id| by_id.remove(&identifier.id));
  if removed.is_none() {
    debug!(kind = %identifier.kind, id = %identifier.id, "clear: resource not cached");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::{Linkage, Relationship};
  use crate::schema::ResourceSchema;
  use serde_json::json;

  fn person() -> Resource {
    Resource::new("people", "5")
      .with_attribute("hair", "black")
      .with_attribute("age", 25)
  }

  fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
      .with(ResourceSchema::new("people").has_many("comments", "comments"))
      .with(ResourceSchema::new("comments").has_one("author", "people"))
  }

  fn populated() -> CacheState {
    let doc = Document::many(vec![
      person(),
      Resource::new("people", "2").with_attribute("name", "Yangster"),
      Resource::new("comments", "1"),
    ]);
    merge(&CacheState::new(), &doc, &registry(), MergeStrategy::Replace)
  }

  #[test]
  fn test_merge_single_resource() {
    let state = merge(
      &CacheState::new(),
      &Document::one(person()),
      &registry(),
      MergeStrategy::Replace,
    );
    assert_eq!(state.resource("people", "5"), Some(&person()));
  }

  #[test]
  fn test_merge_does_not_mutate_input() {
    let before = populated();
    let snapshot = before.clone();
    let doc = Document::one(Resource::new("people", "5").with_attribute("hair", "grey"));

    let after = merge(&before, &doc, &registry(), MergeStrategy::Replace);

    assert_eq!(before, snapshot);
    assert_eq!(after.resource("people", "5").unwrap().attributes["hair"], json!("grey"));
  }

  #[test]
  fn test_replace_drops_missing_fields() {
    let doc = Document::one(Resource::new("people", "5").with_attribute("hair", "grey"));
    let state = merge(&populated(), &doc, &registry(), MergeStrategy::Replace);

    let cached = state.resource("people", "5").unwrap();
    assert_eq!(cached.attributes.get("age"), None);
  }

  #[test]
  fn test_deep_merge_keeps_missing_fields() {
    let doc = Document::one(Resource::new("people", "5").with_attribute("hair", "grey"));
    let state = merge(&populated(), &doc, &registry(), MergeStrategy::Deep);

    let cached = state.resource("people", "5").unwrap();
    assert_eq!(cached.attributes["hair"], json!("grey"));
    assert_eq!(cached.attributes["age"], json!(25));
  }

  #[test]
  fn test_merge_is_idempotent() {
    let doc = Document::one(Resource::new("people", "9").with_relationship(
      "comments",
      Relationship::many(vec![
        ResourceIdentifier::new("comments", "5"),
        ResourceIdentifier::new("comments", "12"),
      ]),
    ))
    .with_included(vec![
      Resource::new("comments", "5").with_relationship(
        "author",
        Relationship::one(ResourceIdentifier::new("people", "9")),
      ),
      Resource::new("comments", "12").with_relationship(
        "author",
        Relationship::one(ResourceIdentifier::new("people", "9")),
      ),
    ]);

    let once = merge(&CacheState::new(), &doc, &registry(), MergeStrategy::Replace);
    let twice = merge(&once, &doc, &registry(), MergeStrategy::Replace);
    assert_eq!(once, twice);
    assert_eq!(
      once.resource("people", "9").unwrap().relationships["comments"].data,
      Some(Linkage::Many(vec![
        ResourceIdentifier::new("comments", "5"),
        ResourceIdentifier::new("comments", "12"),
      ]))
    );
  }

  #[test]
  fn test_merge_then_clear_type() {
    let state = merge(
      &CacheState::new(),
      &Document::one(person()),
      &registry(),
      MergeStrategy::Replace,
    );
    let cleared = clear(&state, &"people".into());
    assert_eq!(cleared.resources["people"].len(), 0);
  }

  #[test]
  fn test_clear_one() {
    let state = populated();
    let cleared = clear(&state, &ResourceIdentifier::new("people", "5").into());

    assert!(cleared.resource("people", "5").is_none());
    assert!(cleared.resource("people", "2").is_some());
    assert!(cleared.resource("comments", "1").is_some());
    assert!(state.resource("people", "5").is_some());
  }

  #[test]
  fn test_clear_many() {
    let cleared = clear(
      &populated(),
      &vec![
        ResourceIdentifier::new("people", "5"),
        ResourceIdentifier::new("comments", "1"),
        ResourceIdentifier::new("planets", "1"),
      ]
      .into(),
    );
    assert_eq!(cleared.resources_of("people").len(), 1);
    assert!(cleared.resources["comments"].is_empty());
    assert!(!cleared.resources.contains_key("planets"));
  }

  #[test]
  fn test_clear_type_leaves_other_types() {
    let state = populated();
    let cleared = clear(&state, &ClearSelector::Type("people".to_string()));

    assert!(cleared.resources["people"].is_empty());
    assert_eq!(cleared.resources["comments"].len(), 1);
  }

  #[test]
  fn test_clear_all() {
    let cleared = clear(&populated(), &ClearSelector::All);
    assert!(cleared.resources.is_empty());
  }

  #[test]
  fn test_clear_does_not_cascade() {
    let doc = Document::many(vec![
      Resource::new("people", "9"),
      Resource::new("comments", "5").with_relationship(
        "author",
        Relationship::one(ResourceIdentifier::new("people", "9")),
      ),
    ]);
    let state = merge(&CacheState::new(), &doc, &registry(), MergeStrategy::Replace);
    let cleared = clear(&state, &ResourceIdentifier::new("comments", "5").into());

    assert_eq!(
      cleared.resource("people", "9").unwrap().relationships["comments"].data,
      Some(Linkage::Many(vec![ResourceIdentifier::new("comments", "5")]))
    );
  }
}
