//! Normalized resource cache.
//!
//! This module is pure state: every function takes a [`CacheState`] and
//! returns a new one. It covers:
//! - the per-type resource table and document merging
//! - reverse relationship synthesis from the schema registry
//! - in-flight request counters and pending markers
//! - the query index with stale-while-revalidate semantics

pub mod counters;
pub mod index;
pub mod reducer;
pub mod relationships;
pub mod state;
pub mod table;

pub use index::QueryIndexEntry;
pub use reducer::{reduce, Action};
pub use state::{CacheOptions, CacheState, ResourceTable};
pub use table::{ClearSelector, MergeStrategy};
