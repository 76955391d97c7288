//! The serializable cache snapshot.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::index::QueryIndexEntry;
use super::table::MergeStrategy;
use crate::config::ApiConfig;
use crate::document::{Resource, ResourceIdentifier};
use crate::schema::Operation;

/// `type -> id -> resource`
pub type ResourceTable = BTreeMap<String, BTreeMap<String, Resource>>;

/// The complete cache state.
///
/// Values are never mutated in place by the cache: every transition clones
/// and returns a new state, so a reader holding an older snapshot keeps a
/// consistent view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheState {
  #[serde(default)]
  pub api_config: ApiConfig,
  #[serde(default)]
  pub resources: ResourceTable,
  #[serde(default)]
  pub indices: BTreeMap<String, QueryIndexEntry>,
  #[serde(default)]
  pub is_creating: i64,
  #[serde(default)]
  pub is_reading: i64,
  #[serde(default)]
  pub is_updating: i64,
  #[serde(default)]
  pub is_deleting: i64,
}

impl CacheState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn resource(&self, kind: &str, id: &str) -> Option<&Resource> {
    self.resources.get(kind).and_then(|by_id| by_id.get(id))
  }

  pub fn resource_by(&self, identifier: &ResourceIdentifier) -> Option<&Resource> {
    self.resource(&identifier.kind, &identifier.id)
  }

  /// All cached resources of one type, ordered by id.
  pub fn resources_of(&self, kind: &str) -> Vec<&Resource> {
    self
      .resources
      .get(kind)
      .map(|by_id| by_id.values().collect())
      .unwrap_or_default()
  }

  pub fn index(&self, hash: &str) -> Option<&QueryIndexEntry> {
    self.indices.get(hash)
  }

  pub fn counter(&self, operation: Operation) -> i64 {
    match operation {
      Operation::Create => self.is_creating,
      Operation::Read => self.is_reading,
      Operation::Update => self.is_updating,
      Operation::Delete => self.is_deleting,
    }
  }

  pub(crate) fn counter_mut(&mut self, operation: Operation) -> &mut i64 {
    match operation {
      Operation::Create => &mut self.is_creating,
      Operation::Read => &mut self.is_reading,
      Operation::Update => &mut self.is_updating,
      Operation::Delete => &mut self.is_deleting,
    }
  }

  /// True while any request of any kind is outstanding.
  pub fn is_busy(&self) -> bool {
    self.is_creating > 0 || self.is_reading > 0 || self.is_updating > 0 || self.is_deleting > 0
  }
}

/// Behavioural knobs for the reducer and fetch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
  pub merge_strategy: MergeStrategy,
  /// Age after which a settled index no longer satisfies a cache-first read
  pub stale_time: Duration,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      merge_strategy: MergeStrategy::Replace,
      stale_time: Duration::minutes(5),
    }
  }
}
