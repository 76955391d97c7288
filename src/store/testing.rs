//! In-memory transport for exercising the store without a network.

use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::document::Document;
use crate::error::{CacheError, Result};
use crate::transport::{RequestOptions, Transport, TransportFuture};

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
  responses: Arc<Mutex<HashMap<String, Result<Option<Document>>>>>,
  requests: Arc<Mutex<Vec<(String, RequestOptions)>>>,
  gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
  calls: Arc<AtomicUsize>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, endpoint: &str, document: Document) -> Self {
    self.set(endpoint, Ok(Some(document)));
    self
  }

  pub fn respond_empty(self, endpoint: &str) -> Self {
    self.set(endpoint, Ok(None));
    self
  }

  pub fn fail(self, endpoint: &str, status: u16) -> Self {
    self.set(
      endpoint,
      Err(CacheError::transport(endpoint, Some(status), "mock failure")),
    );
    self
  }

  /// Replace the response for `endpoint` after the transport is bound.
  pub fn set(&self, endpoint: &str, response: Result<Option<Document>>) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(endpoint.to_string(), response);
  }

  /// Hold the next request until the returned sender fires or is dropped.
  pub fn gate(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.gate.lock().unwrap() = Some(rx);
    tx
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn requests(&self) -> Vec<(String, RequestOptions)> {
    self.requests.lock().unwrap().clone()
  }
}

impl Transport for MockTransport {
  fn request(&self, endpoint: &str, options: RequestOptions) -> TransportFuture {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .requests
      .lock()
      .unwrap()
      .push((endpoint.to_string(), options));

    let gate = self.gate.lock().unwrap().take();
    let response = self
      .responses
      .lock()
      .unwrap()
      .get(endpoint)
      .cloned()
      .unwrap_or_else(|| Err(CacheError::transport(endpoint, Some(404), "no mock response")));

    async move {
      if let Some(gate) = gate {
        let _ = gate.await;
      }
      response
    }
    .boxed()
  }
}
