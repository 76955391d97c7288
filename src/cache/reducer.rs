//! State transitions, one per [`Action`].

use chrono::{DateTime, Utc};
use tracing::debug;

use super::counters::{decrement, increment, mark_pending};
use super::index::{begin_fetch, clear_index, complete_fetch, fail_fetch};
use super::state::{CacheOptions, CacheState};
use super::table::{clear, merge, ClearSelector};
use crate::config::ApiConfig;
use crate::document::{Document, ResourceIdentifier};
use crate::schema::{Operation, SchemaRegistry};

/// Everything that can happen to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  Configure(ApiConfig),
  Clear(ClearSelector),
  /// Merge a document without any request (preloaded or embedded data)
  Hydrate(Document),

  /// A request was issued. The document is what was sent (or identifies
  /// what was asked for).
  Will(Operation, Document),
  /// A request succeeded. For deletes the document identifies what was removed.
  Done(Operation, Document),
  Failed(Operation),

  WillIndex {
    hash: String,
    ticket: u64,
  },
  IndexDone {
    hash: String,
    ticket: u64,
    ids: Vec<ResourceIdentifier>,
    at: DateTime<Utc>,
  },
  IndexFailed {
    hash: String,
    ticket: u64,
  },
  IndexClear(String),
}

/// Apply one action. Never mutates `state`.
pub fn reduce(
  state: &CacheState,
  action: &Action,
  registry: &SchemaRegistry,
  options: &CacheOptions,
) -> CacheState {
  debug!(?action, "reduce");

  match action {
    Action::Configure(config) => CacheState {
      api_config: config.clone(),
      ..state.clone()
    },
    Action::Clear(selector) => clear(state, selector),
    Action::Hydrate(document) => merge(state, document, registry, options.merge_strategy),

    Action::Will(operation, document) => {
      let next = increment(state, *operation);
      match operation {
        Operation::Update | Operation::Delete => mark_pending(&next, document),
        Operation::Create | Operation::Read => next,
      }
    }
    Action::Done(Operation::Delete, document) => {
      let next = clear(state, &ClearSelector::Many(document.identifiers()));
      decrement(&next, Operation::Delete)
    }
    Action::Done(operation, document) => {
      let next = merge(state, document, registry, options.merge_strategy);
      decrement(&next, *operation)
    }
    Action::Failed(operation) => decrement(state, *operation),

    Action::WillIndex { hash, ticket } => begin_fetch(state, hash, *ticket),
    Action::IndexDone {
      hash,
      ticket,
      ids,
      at,
    } => complete_fetch(state, hash, *ticket, ids.clone(), *at),
    Action::IndexFailed { hash, ticket } => fail_fetch(state, hash, *ticket),
    Action::IndexClear(hash) => clear_index(state, hash),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::Resource;
  use crate::schema::ResourceSchema;
  use serde_json::json;

  fn person() -> Resource {
    Resource::new("people", "5")
      .with_attribute("hair", "black")
      .with_attribute("age", 25)
  }

  fn run(state: &CacheState, actions: &[Action]) -> CacheState {
    let registry = SchemaRegistry::new().with(ResourceSchema::new("people"));
    let options = CacheOptions::default();
    actions
      .iter()
      .fold(state.clone(), |acc, action| reduce(&acc, action, &registry, &options))
  }

  fn full_store() -> CacheState {
    serde_json::from_value(json!({
      "resources": {
        "people": {
          "5": { "type": "people", "id": "5", "attributes": { "name": "Johnny" } },
          "2": { "type": "people", "id": "2", "attributes": { "name": "Yangster" } }
        }
      }
    }))
    .unwrap()
  }

  #[test]
  fn test_configure_sets_api_config() {
    let config = ApiConfig {
      base_url: Some("http://example.com/api".to_string()),
      ..ApiConfig::default()
    };
    let state = run(&CacheState::new(), &[Action::Configure(config.clone())]);
    assert_eq!(state.api_config, config);
  }

  #[test]
  fn test_hydrate_populates_resources() {
    let state = run(&CacheState::new(), &[Action::Hydrate(Document::one(person()))]);
    assert_eq!(state.resource("people", "5"), Some(&person()));
    assert_eq!(state.is_reading, 0);
  }

  #[test]
  fn test_read_lifecycle() {
    let pending = run(
      &CacheState::new(),
      &[Action::Will(Operation::Read, Document::default())],
    );
    assert_eq!(pending.is_reading, 1);

    let done = run(&pending, &[Action::Done(Operation::Read, Document::one(person()))]);
    assert_eq!(done.is_reading, 0);
    assert!(done.resource("people", "5").is_some());
  }

  #[test]
  fn test_update_marks_pending_until_done() {
    let update = Document::one(Resource::new("people", "5").with_attribute("name", "Jimmy"));
    let state = run(&full_store(), &[Action::Will(Operation::Update, update.clone())]);

    assert_eq!(state.is_updating, 1);
    assert!(state.resource("people", "5").unwrap().is_pending);
    assert!(!state.resource("people", "2").unwrap().is_pending);

    let state = run(&state, &[Action::Done(Operation::Update, update)]);
    let cached = state.resource("people", "5").unwrap();
    assert_eq!(state.is_updating, 0);
    assert!(!cached.is_pending);
    assert_eq!(cached.attributes["name"], json!("Jimmy"));
  }

  #[test]
  fn test_delete_removes_resource() {
    let target = Document::one(Resource::new("people", "5"));
    let state = run(
      &full_store(),
      &[
        Action::Will(Operation::Delete, target.clone()),
        Action::Done(Operation::Delete, target),
      ],
    );

    assert_eq!(state.is_deleting, 0);
    assert!(state.resource("people", "5").is_none());
    assert!(state.resource("people", "2").is_some());
  }

  #[test]
  fn test_failures_decrement_and_keep_resources() {
    let target = Document::one(Resource::new("people", "5"));
    let state = run(
      &full_store(),
      &[
        Action::Will(Operation::Create, Document::default()),
        Action::Will(Operation::Delete, target),
        Action::Failed(Operation::Create),
        Action::Failed(Operation::Delete),
      ],
    );

    assert!(!state.is_busy());
    assert!(state.resource("people", "5").is_some());
  }

  #[test]
  fn test_index_actions() {
    let state = run(
      &CacheState::new(),
      &[
        Action::WillIndex {
          hash: "people.".to_string(),
          ticket: 1,
        },
        Action::IndexDone {
          hash: "people.".to_string(),
          ticket: 1,
          ids: vec![ResourceIdentifier::new("people", "5")],
          at: Utc::now(),
        },
      ],
    );
    let entry = state.index("people.").unwrap();
    assert_eq!(entry.ids, vec![ResourceIdentifier::new("people", "5")]);

    let state = run(&state, &[Action::IndexClear("people.".to_string())]);
    assert!(state.index("people.").unwrap().ids.is_empty());
  }
}
