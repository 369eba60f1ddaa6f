//! Endpoint descriptors for fetchable HTTP resources.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Categories collection of the public paperclip dataset.
pub const CATEGORIES_URL: &str =
  "https://raw.githubusercontent.com/leboncoin/paperclip/master/categories.json";

/// Listings collection of the public paperclip dataset.
pub const LISTINGS_URL: &str =
  "https://raw.githubusercontent.com/leboncoin/paperclip/master/listing.json";

/// Retry budget used by the conventional endpoints.
pub const DEFAULT_RETRY_COUNT: u32 = 2;

/// Request timeout used by the conventional endpoints.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
  #[default]
  Get,
  Post,
  Put,
  Delete,
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Delete => "DELETE",
    }
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors raised while building an endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
  #[error("Invalid URL '{url}': {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("Endpoint timeout must be greater than zero")]
  ZeroTimeout,
}

/// Immutable description of one fetchable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
  url: Url,
  method: HttpMethod,
  retry_count: u32,
  timeout: Duration,
}

impl Endpoint {
  pub fn new(
    url: &str,
    method: HttpMethod,
    retry_count: u32,
    timeout: Duration,
  ) -> Result<Self, EndpointError> {
    let parsed = Url::parse(url).map_err(|source| EndpointError::InvalidUrl {
      url: url.to_string(),
      source,
    })?;

    if timeout.is_zero() {
      return Err(EndpointError::ZeroTimeout);
    }

    Ok(Self {
      url: parsed,
      method,
      retry_count,
      timeout,
    })
  }

  /// A GET endpoint with the default retry budget and timeout.
  pub fn get(url: &str) -> Result<Self, EndpointError> {
    Self::new(url, HttpMethod::Get, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT)
  }

  /// The conventional categories endpoint.
  pub fn categories() -> Self {
    Self::conventional(CATEGORIES_URL)
  }

  /// The conventional listings endpoint.
  pub fn listings() -> Self {
    Self::conventional(LISTINGS_URL)
  }

  fn conventional(url: &'static str) -> Self {
    Self {
      url: Url::parse(url).expect("built-in endpoint URL is valid"),
      method: HttpMethod::Get,
      retry_count: DEFAULT_RETRY_COUNT,
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  pub fn method(&self) -> HttpMethod {
    self.method
  }

  /// Number of retries after the first attempt.
  pub fn retry_count(&self) -> u32 {
    self.retry_count
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  /// Total attempts allowed for one fetch.
  pub fn max_attempts(&self) -> u32 {
    self.retry_count.saturating_add(1)
  }

  /// Filesystem-safe cache key derived from the URL.
  pub fn cache_key(&self) -> String {
    self.url.as_str().replace(['/', ':'], "_")
  }
}
