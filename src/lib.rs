//! A normalized client-side cache for JSON:API backends.
//!
//! Resources from every response are flattened into one table keyed by type
//! and id, with inverse relationships filled in from the schema registry.
//! Queries are tracked by a deterministic hash so that concurrent reads of
//! the same query share one request, and a refresh keeps serving the last
//! known answer until it settles.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::builder()
//!     .registry(
//!         SchemaRegistry::new()
//!             .with(ResourceSchema::new("people").has_many("comments", "comments"))
//!             .with(ResourceSchema::new("comments").has_one("author", "people")),
//!     )
//!     .transport(HttpTransport::new()?)
//!     .api_config(ApiConfig::with_base_url("https://blog.example.com/api"))
//!     .build();
//!
//! let person = store.find("people", "9")?.await?;
//! let page = store
//!     .query("comments", QueryParams::new().param("page", 2), QueryOptions::default())?
//!     .await?;
//! ```

pub mod attributes;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod pending;
pub mod query_key;
pub mod schema;
pub mod selector;
pub mod store;
pub mod transport;

pub use cache::{CacheOptions, CacheState, MergeStrategy};
pub use config::ApiConfig;
pub use document::{Document, Relationship, Resource, ResourceIdentifier};
pub use error::{CacheError, Result};
pub use model::{Model, Record};
pub use pending::Pending;
pub use query_key::{QueryKey, QueryParams};
pub use schema::{ResourceSchema, SchemaRegistry};
pub use store::{FetchPolicy, QueryOptions, Request, Store, StoreBuilder};
pub use transport::{HttpTransport, Transport};
