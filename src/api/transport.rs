//! HTTP transport abstraction for testability.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::endpoint::{Endpoint, HttpMethod};

/// A request ready to be issued.
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: HttpMethod,
  pub url: Url,
  pub timeout: Duration,
}

impl From<&Endpoint> for HttpRequest {
  fn from(endpoint: &Endpoint) -> Self {
    Self {
      method: endpoint.method(),
      url: endpoint.url().clone(),
      timeout: endpoint.timeout(),
    }
  }
}

/// A response as returned by the transport, before any validation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Bytes,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }
}

/// Network-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
  #[error("Request timed out")]
  Timeout,

  #[error("Connection lost: {0}")]
  ConnectionLost(String),

  #[error("Not connected: {0}")]
  NotConnected(String),

  #[error("Request cancelled")]
  Cancelled,

  /// The request could not be built, e.g. an unsupported URL scheme.
  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("{0}")]
  Other(String),
}

impl TransportError {
  /// Whether retrying the same request may succeed.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      TransportError::Timeout | TransportError::ConnectionLost(_) | TransportError::NotConnected(_)
    )
  }
}

/// Trait for HTTP transport operations.
///
/// Cancellation is cooperative: the caller drops the returned future, so
/// implementations must not rely on running to completion.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Real transport implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new() -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let method = match request.method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
    };

    let response = self
      .client
      .request(method, request.url.clone())
      .timeout(request.timeout)
      .send()
      .await
      .map_err(classify)?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.as_str().to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();

    let body = response.bytes().await.map_err(classify)?;

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}

/// Map a reqwest error onto the transport taxonomy.
fn classify(e: reqwest::Error) -> TransportError {
  if e.is_builder() {
    TransportError::InvalidRequest(e.to_string())
  } else if e.is_timeout() {
    TransportError::Timeout
  } else if e.is_connect() {
    TransportError::NotConnected(e.to_string())
  } else if e.is_request() || e.is_body() {
    TransportError::ConnectionLost(e.to_string())
  } else {
    TransportError::Other(e.to_string())
  }
}
