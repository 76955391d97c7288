//! The handle returned by fetch operations.
//!
//! A [`Pending`] pairs the eventual result of a fetch with a live,
//! memoized read of the same data. Callers can render `current()` right
//! away, `await` the handle for the settled value, and call `changed()`
//! to follow later cache mutations.
//!
//! # Example
//!
//! ```ignore
//! let mut person = store.find("people", "5")?;
//!
//! // Whatever is cached now, possibly nothing
//! render(person.current());
//!
//! // Wait for the network read, then keep following updates
//! while let Some(latest) = person.changed().await {
//!     render(latest);
//! }
//! ```

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::watch;

use crate::cache::CacheState;
use crate::error::Result;
use crate::selector::{Memoized, Select};
use crate::store::{Request, Store};

pub struct Pending<S: Select> {
  result: BoxFuture<'static, Result<S::Output>>,
  selector: Memoized<S>,
  receiver: watch::Receiver<Arc<CacheState>>,
}

impl<S: Select> Pending<S> {
  /// Resolves to the selector's value once `request` has settled.
  pub(crate) fn new(store: &Store, request: Request, selector: S) -> Self {
    let selector = Memoized::new(selector);
    let resolve = selector.clone();
    let source = store.clone();

    let result = async move {
      request.await?;
      Ok(resolve.get(&source.state()))
    }
    .boxed();

    Self {
      result,
      selector,
      receiver: store.subscribe(),
    }
  }

  /// Resolves immediately to the selector's value on the current state.
  pub(crate) fn ready(store: &Store, selector: S) -> Self {
    let selector = Memoized::new(selector);
    let output = selector.get(&store.state());

    Self {
      result: future::ready(Ok(output)).boxed(),
      selector,
      receiver: store.subscribe(),
    }
  }

  /// Value of the selector on the latest published state.
  pub fn current(&self) -> S::Output {
    let state = self.receiver.borrow().clone();
    self.selector.get(&state)
  }

  /// Wait for the next state change and return the recomputed value.
  ///
  /// Returns `None` once the store has been dropped.
  pub async fn changed(&mut self) -> Option<S::Output> {
    self.receiver.changed().await.ok()?;
    let state = self.receiver.borrow_and_update().clone();
    Some(self.selector.get(&state))
  }

  pub fn selector(&self) -> &Memoized<S> {
    &self.selector
  }

  /// Stop observing. The underlying request still runs to completion so the
  /// cache settles either way.
  pub fn cancel(self) {}
}

impl<S: Select> Future for Pending<S> {
  type Output = Result<S::Output>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.get_mut().result.poll_unpin(cx)
  }
}
