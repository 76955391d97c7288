//! Error types for cache operations.

use thiserror::Error;

use crate::document::ResourceIdentifier;

/// Errors surfaced by the cache and its collaborators.
///
/// `Clone` so that every waiter on a de-duplicated fetch receives the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
  /// Network or HTTP failure reported by the transport.
  #[error("Request to {endpoint} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
  Transport {
    endpoint: String,
    status: Option<u16>,
    message: String,
    /// The resource (or type) the failed request was issued for
    resource: Option<ResourceIdentifier>,
  },

  /// A query or record references a type missing from the schema registry.
  #[error("Unregistered resource type: {0}")]
  UnregisteredType(String),

  /// A network operation was attempted on a store without a transport.
  #[error("No transport bound to the store. Call StoreBuilder::transport before issuing requests.")]
  MissingBinding,

  #[error("Invalid URL {url}: {message}")]
  InvalidUrl { url: String, message: String },

  #[error("Failed to decode {what}: {message}")]
  Decode { what: String, message: String },
}

impl CacheError {
  /// Build a transport error without resource metadata.
  pub fn transport(endpoint: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
    Self::Transport {
      endpoint: endpoint.into(),
      status,
      message: message.into(),
      resource: None,
    }
  }

  /// Attach the originating resource to a transport error.
  ///
  /// Other variants are returned unchanged.
  pub fn with_resource(self, resource: ResourceIdentifier) -> Self {
    match self {
      Self::Transport {
        endpoint,
        status,
        message,
        ..
      } => Self::Transport {
        endpoint,
        status,
        message,
        resource: Some(resource),
      },
      other => other,
    }
  }

  /// The resource a transport error was raised for, if any.
  pub fn resource(&self) -> Option<&ResourceIdentifier> {
    match self {
      Self::Transport { resource, .. } => resource.as_ref(),
      _ => None,
    }
  }
}

pub type Result<T> = std::result::Result<T, CacheError>;
