//! The cache context: owns the current state, the schema registry and the
//! transport, and applies actions one at a time.
//!
//! State lives in a `tokio::sync::watch` channel so that any number of
//! readers can observe every transition. `dispatch` holds the channel's
//! write lock for the duration of one reducer step, which makes each step
//! atomic with respect to readers and other writers.

mod coordinator;
mod facade;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::cache::{reduce, Action, CacheOptions, CacheState, ClearSelector};
use crate::config::ApiConfig;
use crate::document::Document;
use crate::error::{CacheError, Result};
use crate::query_key::QueryKey;
use crate::schema::SchemaRegistry;
use crate::transport::Transport;

pub use coordinator::Request;
pub use facade::{FetchPolicy, QueryOptions};

use coordinator::InFlight;

struct Inner {
  state: watch::Sender<Arc<CacheState>>,
  registry: SchemaRegistry,
  options: CacheOptions,
  transport: Option<Arc<dyn Transport>>,
  inflight: Mutex<HashMap<String, InFlight>>,
  tickets: AtomicU64,
}

/// Handle to a cache. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Store {
  inner: Arc<Inner>,
}

impl Store {
  pub fn builder() -> StoreBuilder {
    StoreBuilder::default()
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> Arc<CacheState> {
    self.inner.state.borrow().clone()
  }

  /// Receiver that is notified after every dispatched action.
  pub fn subscribe(&self) -> watch::Receiver<Arc<CacheState>> {
    self.inner.state.subscribe()
  }

  pub fn registry(&self) -> &SchemaRegistry {
    &self.inner.registry
  }

  pub fn options(&self) -> &CacheOptions {
    &self.inner.options
  }

  /// Apply one action and publish the resulting state.
  pub fn dispatch(&self, action: Action) -> Arc<CacheState> {
    let inner = &self.inner;
    let mut published = Arc::default();

    inner.state.send_modify(|current| {
      *current = Arc::new(reduce(&**current, &action, &inner.registry, &inner.options));
      published = Arc::clone(current);
    });

    published
  }

  /// Replace the transport configuration.
  pub fn configure(&self, config: ApiConfig) {
    self.dispatch(Action::Configure(config));
  }

  /// Merge a document without issuing a request.
  pub fn hydrate(&self, document: Document) {
    self.dispatch(Action::Hydrate(document));
  }

  pub fn clear(&self, selector: impl Into<ClearSelector>) {
    self.dispatch(Action::Clear(selector.into()));
  }

  /// Force-invalidate a query: its index becomes settled and empty, and a
  /// request still in flight for it will not overwrite that.
  pub fn invalidate(&self, key: &QueryKey) {
    let hash = key.cache_hash();
    self.lock_inflight().remove(&hash);
    self.dispatch(Action::IndexClear(hash));
  }

  /// The bound transport. Fails immediately when none was configured.
  pub(crate) fn transport(&self) -> Result<Arc<dyn Transport>> {
    self
      .inner
      .transport
      .clone()
      .ok_or(CacheError::MissingBinding)
  }

  pub(crate) fn next_ticket(&self) -> u64 {
    self.inner.tickets.fetch_add(1, Ordering::Relaxed) + 1
  }

  pub(crate) fn lock_inflight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
    self
      .inner
      .inflight
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

/// Explicit construction of a [`Store`].
#[derive(Default)]
pub struct StoreBuilder {
  registry: SchemaRegistry,
  options: CacheOptions,
  transport: Option<Arc<dyn Transport>>,
  api_config: Option<ApiConfig>,
  initial_state: Option<CacheState>,
}

impl StoreBuilder {
  pub fn registry(mut self, registry: SchemaRegistry) -> Self {
    self.registry = registry;
    self
  }

  pub fn options(mut self, options: CacheOptions) -> Self {
    self.options = options;
    self
  }

  pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
    self.transport = Some(Arc::new(transport));
    self
  }

  pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
    self.transport = Some(transport);
    self
  }

  pub fn api_config(mut self, config: ApiConfig) -> Self {
    self.api_config = Some(config);
    self
  }

  /// Start from a previously serialized snapshot.
  pub fn initial_state(mut self, state: CacheState) -> Self {
    self.initial_state = Some(state);
    self
  }

  pub fn build(self) -> Store {
    let mut state = self.initial_state.unwrap_or_default();
    if let Some(config) = self.api_config {
      state.api_config = config;
    }
    let (sender, _) = watch::channel(Arc::new(state));

    Store {
      inner: Arc::new(Inner {
        state: sender,
        registry: self.registry,
        options: self.options,
        transport: self.transport,
        inflight: Mutex::new(HashMap::new()),
        tickets: AtomicU64::new(0),
      }),
    }
  }
}
