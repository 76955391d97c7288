//! Request de-duplication and index bookkeeping for in-flight fetches.

use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use super::Store;
use crate::cache::Action;
use crate::document::{Document, ResourceIdentifier};
use crate::error::{CacheError, Result};
use crate::schema::Operation;
use crate::transport::RequestOptions;

/// Handle to a spawned request. Every clone resolves to the same outcome.
pub type Request = Shared<BoxFuture<'static, Result<Option<Document>>>>;

pub(crate) struct InFlight {
  ticket: u64,
  request: Request,
}

/// Run `future` on the runtime so that it settles (and its counters and index
/// transitions are applied) even if every handle to it is dropped.
pub(crate) fn spawn_request(future: BoxFuture<'static, Result<Option<Document>>>) -> Request {
  let handle = tokio::spawn(future);

  async move {
    handle.await.unwrap_or_else(|e| {
      Err(CacheError::transport(
        "",
        None,
        format!("Request task failed: {}", e),
      ))
    })
  }
  .boxed()
  .shared()
}

impl Store {
  /// Issue a fetch for `hash` unless one is already outstanding.
  ///
  /// While the index entry for `hash` is fetching, callers get a clone of
  /// the outstanding request and `issue` is not called. Otherwise the entry
  /// moves to fetching, `issue` starts the request, and its settlement moves
  /// the entry to settled: with the response's ids on success, with the
  /// previous ids on failure.
  pub(crate) fn coordinate<F>(&self, hash: &str, issue: F) -> Result<Request>
  where
    F: FnOnce() -> Result<BoxFuture<'static, Result<Option<Document>>>>,
  {
    let mut inflight = self.lock_inflight();

    let is_fetching = self.state().index(hash).is_some_and(|e| e.is_fetching);
    if is_fetching {
      if let Some(existing) = inflight.get(hash) {
        debug!(hash, ticket = existing.ticket, "joining in-flight request");
        return Ok(existing.request.clone());
      }
    }

    let fetch = issue()?;
    let ticket = self.next_ticket();
    self.dispatch(Action::WillIndex {
      hash: hash.to_string(),
      ticket,
    });

    let store = self.clone();
    let owned_hash = hash.to_string();
    let request = spawn_request(
      async move {
        let result = fetch.await;
        let action = match &result {
          Ok(document) => Action::IndexDone {
            hash: owned_hash.clone(),
            ticket,
            ids: document
              .as_ref()
              .map(Document::identifiers)
              .unwrap_or_default(),
            at: Utc::now(),
          },
          Err(_) => Action::IndexFailed {
            hash: owned_hash.clone(),
            ticket,
          },
        };
        store.dispatch(action);
        store.release(&owned_hash, ticket);
        result
      }
      .boxed(),
    );

    inflight.insert(
      hash.to_string(),
      InFlight {
        ticket,
        request: request.clone(),
      },
    );
    Ok(request)
  }

  /// Start one transport call bracketed by the operation's counter.
  ///
  /// `sent` is what the counter action describes: the body for writes, or
  /// the identity being read or deleted. Errors are tagged with `subject`.
  /// Fails without side effects when no transport is bound.
  pub(crate) fn issue(
    &self,
    operation: Operation,
    endpoint: String,
    body: Option<Document>,
    subject: Option<ResourceIdentifier>,
    sent: Document,
  ) -> Result<BoxFuture<'static, Result<Option<Document>>>> {
    let transport = self.transport()?;
    let options = RequestOptions {
      operation,
      config: self.state().api_config.clone(),
      body,
    };

    self.dispatch(Action::Will(operation, sent.clone()));
    let call = transport.request(&endpoint, options);
    let store = self.clone();

    Ok(
      async move {
        match call.await {
          Ok(document) => {
            let merged = match (operation, &document) {
              (Operation::Delete, _) | (Operation::Update, None) => sent,
              (_, Some(document)) => document.clone(),
              (_, None) => Document::default(),
            };
            store.dispatch(Action::Done(operation, merged));
            Ok(document)
          }
          Err(error) => {
            warn!(%endpoint, %error, "request failed");
            store.dispatch(Action::Failed(operation));
            Err(match subject {
              Some(subject) => error.with_resource(subject),
              None => error,
            })
          }
        }
      }
      .boxed(),
    )
  }

  fn release(&self, hash: &str, ticket: u64) {
    let mut inflight = self.lock_inflight();
    if inflight.get(hash).is_some_and(|f| f.ticket == ticket) {
      inflight.remove(hash);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::{Resource, ResourceIdentifier};
  use crate::schema::SchemaRegistry;
  use futures::future;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use tokio::sync::oneshot;

  const HASH: &str = "people.id=5";

  fn store() -> Store {
    Store::builder().registry(SchemaRegistry::new()).build()
  }

  fn person_doc() -> Document {
    Document::one(Resource::new("people", "5"))
  }

  #[tokio::test]
  async fn test_is_fetching_until_settled() {
    let store = store();
    let (tx, rx) = oneshot::channel::<Result<Option<Document>>>();

    let request = store
      .coordinate(HASH, || {
        Ok(async move { rx.await.unwrap_or(Ok(None)) }.boxed())
      })
      .unwrap();

    let entry = store.state().index(HASH).cloned().unwrap();
    assert!(entry.is_fetching);
    assert!(entry.ids.is_empty());

    tx.send(Ok(Some(person_doc()))).unwrap();
    request.await.unwrap();

    let entry = store.state().index(HASH).cloned().unwrap();
    assert!(!entry.is_fetching);
    assert_eq!(entry.ids, vec![ResourceIdentifier::new("people", "5")]);
  }

  #[tokio::test]
  async fn test_second_caller_joins_outstanding_request() {
    let store = store();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel::<Result<Option<Document>>>();

    let issue = |rx: Option<oneshot::Receiver<Result<Option<Document>>>>| {
      let calls = Arc::clone(&calls);
      move || -> Result<BoxFuture<'static, Result<Option<Document>>>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(
          async move {
            match rx {
              Some(rx) => rx.await.unwrap_or(Ok(None)),
              None => Ok(None),
            }
          }
          .boxed(),
        )
      }
    };

    let first = store.coordinate(HASH, issue(Some(rx))).unwrap();
    let second = store.coordinate(HASH, issue(None)).unwrap();

    tx.send(Ok(Some(person_doc()))).unwrap();
    let (a, b) = future::join(first, second).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a, b);
    assert_eq!(a.unwrap(), Some(person_doc()));
    assert!(store.lock_inflight().is_empty());
  }

  #[tokio::test]
  async fn test_failure_keeps_previous_ids() {
    let store = store();

    store
      .coordinate(HASH, || Ok(future::ready(Ok(Some(person_doc()))).boxed()))
      .unwrap()
      .await
      .unwrap();

    let err = store
      .coordinate(HASH, || {
        Ok(future::ready(Err(CacheError::transport("people", Some(500), "boom"))).boxed())
      })
      .unwrap()
      .await
      .unwrap_err();
    assert!(matches!(err, CacheError::Transport { status: Some(500), .. }));

    let entry = store.state().index(HASH).cloned().unwrap();
    assert!(!entry.is_fetching);
    assert_eq!(entry.ids, vec![ResourceIdentifier::new("people", "5")]);
  }

  #[tokio::test]
  async fn test_issue_error_leaves_index_untouched() {
    let store = store();
    let err = store
      .coordinate(HASH, || Err(CacheError::MissingBinding))
      .unwrap_err();

    assert_eq!(err, CacheError::MissingBinding);
    assert!(store.state().index(HASH).is_none());
  }
}
