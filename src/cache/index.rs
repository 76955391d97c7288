//! Query index: which resources answer a query hash, and whether that
//! answer is being refreshed.
//!
//! Each hash moves through three states:
//! - absent (no entry)
//! - fetching (`is_fetching`, ids from the last settle or empty)
//! - settled (`!is_fetching`, ids from the last completed fetch)
//!
//! Every `begin_fetch` carries a ticket. Completions and failures only apply
//! while the entry is still fetching under that ticket, so an explicit
//! `clear_index` in the meantime wins over a late response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::state::CacheState;
use crate::document::ResourceIdentifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIndexEntry {
  pub hash: String,
  /// Identifiers in the order the server returned them
  pub ids: Vec<ResourceIdentifier>,
  pub is_fetching: bool,
  /// When the current `ids` were settled by a completed fetch
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub settled_at: Option<DateTime<Utc>>,
  #[serde(skip)]
  pub(crate) ticket: u64,
}

impl QueryIndexEntry {
  fn settled(hash: &str) -> Self {
    Self {
      hash: hash.to_string(),
      ids: Vec::new(),
      is_fetching: false,
      settled_at: None,
      ticket: 0,
    }
  }

  /// True when this entry was settled by a fetch no older than `max_age`.
  pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
    !self.is_fetching && self.settled_at.is_some_and(|at| now - at <= max_age)
  }

  fn accepts(&self, ticket: u64) -> bool {
    self.is_fetching && self.ticket == ticket
  }
}

/// absent -> fetching (empty ids), settled -> fetching (ids preserved).
pub fn begin_fetch(state: &CacheState, hash: &str, ticket: u64) -> CacheState {
  let mut next = state.clone();
  let entry = next
    .indices
    .entry(hash.to_string())
    .or_insert_with(|| QueryIndexEntry::settled(hash));
  entry.is_fetching = true;
  entry.ticket = ticket;
  next
}

/// fetching -> settled with `ids`. Dropped if the entry was invalidated or
/// re-fetched under another ticket.
pub fn complete_fetch(
  state: &CacheState,
  hash: &str,
  ticket: u64,
  ids: Vec<ResourceIdentifier>,
  at: DateTime<Utc>,
) -> CacheState {
  if !state.indices.get(hash).is_some_and(|e| e.accepts(ticket)) {
    warn!(hash, ticket, "dropping stale index completion");
    return state.clone();
  }

  let mut next = state.clone();
  if let Some(entry) = next.indices.get_mut(hash) {
    entry.ids = ids;
    entry.is_fetching = false;
    entry.settled_at = Some(at);
  }
  next
}

/// fetching -> settled, keeping the previously settled ids.
pub fn fail_fetch(state: &CacheState, hash: &str, ticket: u64) -> CacheState {
  if !state.indices.get(hash).is_some_and(|e| e.accepts(ticket)) {
    return state.clone();
  }

  let mut next = state.clone();
  if let Some(entry) = next.indices.get_mut(hash) {
    entry.is_fetching = false;
  }
  next
}

/// Any state -> settled and empty.
pub fn clear_index(state: &CacheState, hash: &str) -> CacheState {
  let mut next = state.clone();
  let ticket = next.indices.get(hash).map(|e| e.ticket).unwrap_or_default();
  next.indices.insert(
    hash.to_string(),
    QueryIndexEntry {
      ticket,
      ..QueryIndexEntry::settled(hash)
    },
  );
  next
}
