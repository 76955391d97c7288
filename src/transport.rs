//! The network collaborator: sends one request and returns the parsed body.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::{info, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::document::Document;
use crate::error::{CacheError, Result};
use crate::schema::Operation;

pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

const JSON_CONTENT_TYPES: &[&str] = &["application/json", JSONAPI_MEDIA_TYPE];

/// A single outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
  pub operation: Operation,
  pub config: ApiConfig,
  pub body: Option<Document>,
}

/// Future returned by a transport. `Ok(None)` means the server sent no body.
pub type TransportFuture = BoxFuture<'static, Result<Option<Document>>>;

/// Sends requests to the backend.
///
/// Any `Err` is a failed request; any `Ok` is a success. Implementations
/// should not retry.
pub trait Transport: Send + Sync {
  fn request(&self, endpoint: &str, options: RequestOptions) -> TransportFuture;
}

/// JSON:API over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .gzip(true)
      .build()
      .map_err(|e| CacheError::transport("", None, format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { client })
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

/// Resolve an endpoint against the configured base URL.
pub fn build_url(config: &ApiConfig, endpoint: &str) -> Result<Url> {
  let invalid = |message: String| CacheError::InvalidUrl {
    url: endpoint.to_string(),
    message,
  };

  match &config.base_url {
    Some(base) => {
      let base = if base.ends_with('/') {
        base.clone()
      } else {
        format!("{}/", base)
      };
      let base = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
      base
        .join(endpoint.trim_start_matches('/'))
        .map_err(|e| invalid(e.to_string()))
    }
    None => Url::parse(endpoint).map_err(|e| invalid(e.to_string())),
  }
}

fn build_headers(config: &ApiConfig) -> Result<HeaderMap> {
  let mut headers = HeaderMap::new();
  headers.insert(ACCEPT, HeaderValue::from_static(JSONAPI_MEDIA_TYPE));
  headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSONAPI_MEDIA_TYPE));

  for (name, value) in &config.headers {
    let name = HeaderName::from_bytes(name.as_bytes())
      .map_err(|e| CacheError::transport("", None, format!("Invalid header name {}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
      .map_err(|e| CacheError::transport("", None, format!("Invalid header value for {}: {}", name, e)))?;
    headers.insert(name, value);
  }

  Ok(headers)
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
  headers
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(';').next())
    .map(|v| JSON_CONTENT_TYPES.contains(&v.trim()))
    .unwrap_or(false)
}

impl Transport for HttpTransport {
  fn request(&self, endpoint: &str, options: RequestOptions) -> TransportFuture {
    let client = self.client.clone();
    let endpoint = endpoint.to_string();

    async move {
      let url = build_url(&options.config, &endpoint)?;
      let headers = build_headers(&options.config)?;
      let method = Method::from_bytes(options.operation.method().as_bytes())
        .map_err(|e| CacheError::transport(&endpoint, None, e.to_string()))?;

      info!(%method, %url, "request");

      let mut request = client.request(method, url.clone()).headers(headers);
      if let Some(body) = &options.body {
        let bytes = serde_json::to_vec(body).map_err(|e| CacheError::Decode {
          what: "request body".to_string(),
          message: e.to_string(),
        })?;
        request = request.body(bytes);
      }

      let response = request.send().await.map_err(|e| {
        warn!(%url, error = %e, "request failed");
        CacheError::transport(&endpoint, None, e.to_string())
      })?;

      let status = response.status();
      if status == StatusCode::NO_CONTENT {
        return Ok(None);
      }

      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
          status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
          body
        };
        warn!(%url, status = status.as_u16(), "request rejected");
        return Err(CacheError::transport(&endpoint, Some(status.as_u16()), message));
      }

      if !is_json_content_type(response.headers()) {
        return Err(CacheError::transport(
          &endpoint,
          Some(status.as_u16()),
          "Invalid Content-Type in response",
        ));
      }

      let bytes = response
        .bytes()
        .await
        .map_err(|e| CacheError::transport(&endpoint, Some(status.as_u16()), e.to_string()))?;
      if bytes.is_empty() {
        return Ok(None);
      }

      let document: Document = serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode {
        what: format!("response from {}", endpoint),
        message: e.to_string(),
      })?;
      Ok(Some(document))
    }
    .boxed()
  }
}
