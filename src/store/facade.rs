//! The public read and write surface.
//!
//! `peek*` reads only the cache. `find`, `find_all` and `query` issue a read
//! through the fetch coordinator and hand back a [`Pending`] that resolves
//! once the response has been merged. `create`, `update` and `delete` issue
//! writes and resolve to the server's response document.

use chrono::Utc;

use super::coordinator::{spawn_request, Request};
use super::Store;
use crate::document::{Document, Resource};
use crate::error::Result;
use crate::model::{Model, Record};
use crate::pending::Pending;
use crate::query_key::{QueryKey, QueryParams};
use crate::schema::Operation;
use crate::selector::{PeekAll, PeekOne, QueryResult, QueryResults, Select};

/// Whether a read may be answered from the cache alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Always issue a request
  #[default]
  Network,
  /// Skip the request when the resource is cached, or the query settled
  /// within the configured stale time
  CacheFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
  /// Endpoint to query instead of the type's read endpoint
  pub endpoint: Option<String>,
  pub policy: FetchPolicy,
}

impl QueryOptions {
  pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = Some(endpoint.into());
    self
  }

  pub fn policy(mut self, policy: FetchPolicy) -> Self {
    self.policy = policy;
    self
  }
}

impl Store {
  pub fn peek(&self, kind: &str, id: &str) -> Option<Resource> {
    PeekOne::new(kind, id).compute(&self.state())
  }

  pub fn peek_all(&self, kind: &str) -> Vec<Resource> {
    PeekAll::new(kind).compute(&self.state())
  }

  /// Last known answer to a query, and whether a refresh is in flight.
  pub fn peek_query(&self, key: &QueryKey) -> QueryResult {
    QueryResults::new(key.cache_hash()).compute(&self.state())
  }

  /// Cached resource decoded as `M`.
  pub fn peek_as<M: Model>(&self, id: &str) -> Result<Option<M>> {
    let state = self.state();
    match Record::find(&state, self.registry(), M::TYPE, id)? {
      Some(record) => record.decode().map(Some),
      None => Ok(None),
    }
  }

  pub fn find(&self, kind: &str, id: &str) -> Result<Pending<PeekOne>> {
    self.find_with(kind, id, FetchPolicy::Network)
  }

  pub fn find_with(&self, kind: &str, id: &str, policy: FetchPolicy) -> Result<Pending<PeekOne>> {
    let schema = self.registry().get(kind)?;
    let selector = PeekOne::new(kind, id);

    if policy == FetchPolicy::CacheFirst && self.state().resource(kind, id).is_some() {
      return Ok(Pending::ready(self, selector));
    }

    let subject = Resource::new(kind, id);
    let endpoint = format!("{}/{}", schema.endpoints.resolve(Operation::Read, &subject), id);
    let key = QueryKey::Find {
      kind: kind.to_string(),
      id: id.to_string(),
    };

    let request = self.coordinate(&key.cache_hash(), || {
      self.issue(
        Operation::Read,
        endpoint,
        None,
        Some(subject.identifier()),
        Document::one(subject.clone()),
      )
    })?;
    Ok(Pending::new(self, request, selector))
  }

  /// Fetch every resource of a type. Resolves to all cached resources of
  /// that type, not only the ones in the response.
  pub fn find_all(&self, kind: &str) -> Result<Pending<PeekAll>> {
    self.find_all_with(kind, FetchPolicy::Network)
  }

  pub fn find_all_with(&self, kind: &str, policy: FetchPolicy) -> Result<Pending<PeekAll>> {
    let schema = self.registry().get(kind)?;
    let key = QueryKey::FindAll {
      kind: kind.to_string(),
    };
    let hash = key.cache_hash();
    let selector = PeekAll::new(kind);

    if policy == FetchPolicy::CacheFirst && self.is_fresh(&hash) {
      return Ok(Pending::ready(self, selector));
    }

    let endpoint = schema
      .endpoints
      .resolve(Operation::Read, &Resource::new(kind, ""));

    let request = self.coordinate(&hash, || {
      self.issue(Operation::Read, endpoint, None, None, Document::default())
    })?;
    Ok(Pending::new(self, request, selector))
  }

  /// Fetch a filtered collection. Resolves to the resources the server
  /// returned, in its order.
  pub fn query(
    &self,
    kind: &str,
    params: impl Into<QueryParams>,
    options: QueryOptions,
  ) -> Result<Pending<QueryResults>> {
    let schema = self.registry().get(kind)?;
    let params = params.into();
    let key = QueryKey::Query {
      kind: kind.to_string(),
      params: params.clone(),
      endpoint: options.endpoint.clone(),
    };
    let hash = key.cache_hash();
    let selector = QueryResults::new(hash.clone());

    if options.policy == FetchPolicy::CacheFirst && self.is_fresh(&hash) {
      return Ok(Pending::ready(self, selector));
    }

    let base = options
      .endpoint
      .unwrap_or_else(|| schema.endpoints.resolve(Operation::Read, &Resource::new(kind, "")));
    let endpoint = if params.is_empty() {
      base
    } else {
      format!("{}?{}", base, params.query_string())
    };

    let request = self.coordinate(&hash, || {
      self.issue(Operation::Read, endpoint, None, None, Document::default())
    })?;
    Ok(Pending::new(self, request, selector))
  }

  /// POST the resource. The response document is merged.
  pub fn create(&self, resource: Resource) -> Result<Request> {
    self.write(Operation::Create, resource, true)
  }

  /// PATCH the resource, marking it pending until the server answers.
  pub fn update(&self, resource: Resource) -> Result<Request> {
    self.write(Operation::Update, resource, true)
  }

  /// DELETE the resource, removing it from the cache on success.
  pub fn delete(&self, resource: Resource) -> Result<Request> {
    self.write(Operation::Delete, resource, false)
  }

  fn write(&self, operation: Operation, resource: Resource, with_body: bool) -> Result<Request> {
    let schema = self.registry().get(&resource.kind)?;
    let endpoint = schema.endpoints.resolve(operation, &resource);
    let subject = resource.identifier();
    let sent = Document::one(resource);
    let body = with_body.then(|| sent.clone());

    let fetch = self.issue(operation, endpoint, body, Some(subject), sent)?;
    Ok(spawn_request(fetch))
  }

  fn is_fresh(&self, hash: &str) -> bool {
    self
      .state()
      .index(hash)
      .is_some_and(|entry| entry.is_fresh(Utc::now(), self.options().stale_time))
  }
}
