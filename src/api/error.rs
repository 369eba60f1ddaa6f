//! Fetch error taxonomy.

use thiserror::Error;

use super::endpoint::EndpointError;
use super::transport::TransportError;

/// Errors returned by [`FetchClient::fetch`](super::FetchClient::fetch).
///
/// Only `RequestFailed` with a transient transport error is retried; every
/// other variant ends the fetch on first occurrence.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("Invalid URL: {0}")]
  InvalidUrl(String),

  #[error("Request failed: {0}")]
  RequestFailed(#[source] TransportError),

  #[error("Invalid server response")]
  InvalidResponse,

  #[error("Failed to decode response: {0}")]
  DecodingFailed(#[source] serde_json::Error),

  #[error("Server error with status code: {0}")]
  ServerError(u16),

  #[error("No data received")]
  NoData,

  /// Every attempt failed with a transient error.
  #[error("Gave up after {attempts} attempts, last error: {last_error}")]
  MaxRetryReached {
    attempts: u32,
    last_error: TransportError,
  },

  #[error("Request was cancelled")]
  Cancelled,
}

impl FetchError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, FetchError::Cancelled)
  }
}

impl From<EndpointError> for FetchError {
  fn from(e: EndpointError) -> Self {
    FetchError::InvalidUrl(e.to_string())
  }
}
