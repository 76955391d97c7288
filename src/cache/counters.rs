//! In-flight request counters and optimistic pending markers.

use super::state::CacheState;
use crate::document::Document;
use crate::schema::Operation;

pub fn increment(state: &CacheState, operation: Operation) -> CacheState {
  let mut next = state.clone();
  *next.counter_mut(operation) += 1;
  next
}

/// Decrementing below zero means a caller settled a request twice; the
/// counter goes negative rather than hiding that bug.
pub fn decrement(state: &CacheState, operation: Operation) -> CacheState {
  let mut next = state.clone();
  *next.counter_mut(operation) -= 1;
  next
}

/// Flag the primary data of `document` as pending. Resources that are not
/// cached are skipped.
pub fn mark_pending(state: &CacheState, document: &Document) -> CacheState {
  let mut next = state.clone();

  for identifier in document.identifiers() {
    if let Some(resource) = next
      .resources
      .get_mut(&identifier.kind)
      .and_then(|by_id| by_id.get_mut(&identifier.id))
    {
      resource.is_pending = true;
    }
  }

  next
}
