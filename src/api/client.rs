//! Fetch client: cache-first reads, retry with backoff, bulk cancellation.

use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::endpoint::Endpoint;
use super::error::FetchError;
use super::registry::RequestRegistry;
use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::cache::{CacheError, TieredCache};

/// Upper bound of the exponential part of the backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound (in milliseconds) of the random jitter added to each backoff.
const MAX_JITTER_MS: u64 = 500;

/// Exponential backoff before retrying after failed attempt `attempt` (1-based):
/// `min(30s, 2^attempt s)`, without jitter.
pub fn base_backoff(attempt: u32) -> Duration {
  2u64
    .checked_pow(attempt)
    .map(Duration::from_secs)
    .unwrap_or(MAX_BACKOFF)
    .min(MAX_BACKOFF)
}

fn backoff_with_jitter(attempt: u32) -> Duration {
  let jitter = rand::rng().random_range(0..=MAX_JITTER_MS);
  base_backoff(attempt) + Duration::from_millis(jitter)
}

/// HTTP client with transparent caching, retries and cancellation.
///
/// A populated cache entry is always served without touching the network;
/// entries are refreshed only after they are removed or the cache is cleared.
pub struct FetchClient {
  transport: Arc<dyn Transport>,
  cache: Arc<TieredCache>,
  registry: RequestRegistry,
}

impl FetchClient {
  pub fn new(transport: Arc<dyn Transport>, cache: Arc<TieredCache>) -> Self {
    Self {
      transport,
      cache,
      registry: RequestRegistry::new(),
    }
  }

  pub fn cache(&self) -> &Arc<TieredCache> {
    &self.cache
  }

  /// Fetch and decode the resource described by `endpoint`.
  pub async fn fetch<T>(&self, endpoint: &Endpoint) -> Result<T, FetchError>
  where
    T: Serialize + DeserializeOwned + Send,
  {
    self.fetch_inner(endpoint, None).await
  }

  /// Like [`fetch`](Self::fetch), but also abandoned when `cancel` fires.
  pub async fn fetch_with_cancel<T>(
    &self,
    endpoint: &Endpoint,
    cancel: &CancellationToken,
  ) -> Result<T, FetchError>
  where
    T: Serialize + DeserializeOwned + Send,
  {
    self.fetch_inner(endpoint, Some(cancel)).await
  }

  /// Cancel every in-flight request and refuse new attempts until
  /// [`reset_cancellation`](Self::reset_cancellation) is called.
  ///
  /// Idempotent and callable from any context.
  pub fn cancel_all(&self) {
    debug!(active = self.registry.len(), "Cancelling all requests");
    self.registry.cancel_all();
  }

  /// Allow requests again after `cancel_all`.
  pub fn reset_cancellation(&self) {
    self.registry.reset();
  }

  pub fn is_cancelled(&self) -> bool {
    self.registry.is_cancelled()
  }

  /// Number of requests currently on the wire.
  pub fn active_requests(&self) -> usize {
    self.registry.len()
  }

  async fn fetch_inner<T>(
    &self,
    endpoint: &Endpoint,
    cancel: Option<&CancellationToken>,
  ) -> Result<T, FetchError>
  where
    T: Serialize + DeserializeOwned + Send,
  {
    let key = endpoint.cache_key();

    match self.cache.fetch::<T>(&key) {
      Ok(value) => {
        debug!(url = %endpoint.url(), "Serving from cache");
        return Ok(value);
      }
      Err(CacheError::NotFound(_)) => {}
      Err(e) => {
        // The network result will overwrite the bad entry
        warn!(key = %key, error = %e, "Ignoring unreadable cache entry");
      }
    }

    let request = HttpRequest::from(endpoint);
    let max_attempts = endpoint.max_attempts();
    let mut attempt = 0;

    loop {
      attempt += 1;

      let response = match self.attempt(&request, cancel).await {
        Ok(response) => response,
        Err(TransportError::Cancelled) => return Err(FetchError::Cancelled),
        Err(e) if e.is_transient() => {
          if attempt >= max_attempts {
            warn!(
              url = %endpoint.url(),
              attempts = attempt,
              error = %e,
              "Max retries exhausted"
            );
            return Err(FetchError::MaxRetryReached {
              attempts: attempt,
              last_error: e,
            });
          }

          let backoff = backoff_with_jitter(attempt);
          warn!(
            url = %endpoint.url(),
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %e,
            "Retrying after transient error"
          );
          self.sleep_cancellable(backoff, cancel).await?;
          continue;
        }
        Err(TransportError::InvalidRequest(reason)) => return Err(FetchError::InvalidUrl(reason)),
        Err(e) => return Err(FetchError::RequestFailed(e)),
      };

      let value: T = decode_response(response)?;

      if let Err(e) = self.cache.save(&value, &key) {
        warn!(key = %key, error = %e, "Failed to cache response");
      }

      info!(url = %endpoint.url(), attempt, "Fetched resource");
      return Ok(value);
    }
  }

  /// Issue one request, bounded by its timeout and abandoned on cancellation.
  async fn attempt(
    &self,
    request: &HttpRequest,
    cancel: Option<&CancellationToken>,
  ) -> Result<HttpResponse, TransportError> {
    let active = self
      .registry
      .register(cancel)
      .ok_or(TransportError::Cancelled)?;

    if active.token().is_cancelled() {
      return Err(TransportError::Cancelled);
    }

    tokio::select! {
      biased;

      _ = active.token().cancelled() => Err(TransportError::Cancelled),

      result = tokio::time::timeout(request.timeout, self.transport.send(request)) => {
        match result {
          Ok(result) => result,
          Err(_) => Err(TransportError::Timeout),
        }
      }
    }
  }

  async fn sleep_cancellable(
    &self,
    duration: Duration,
    cancel: Option<&CancellationToken>,
  ) -> Result<(), FetchError> {
    let shutdown = self.registry.shutdown_token();
    let caller = cancel.cloned().unwrap_or_default();

    tokio::select! {
      biased;

      _ = shutdown.cancelled() => Err(FetchError::Cancelled),
      _ = caller.cancelled() => Err(FetchError::Cancelled),
      _ = tokio::time::sleep(duration) => Ok(()),
    }
  }
}

/// Validate a response and decode its body.
fn decode_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T, FetchError> {
  if !(100..=599).contains(&response.status) {
    return Err(FetchError::InvalidResponse);
  }

  if !(200..300).contains(&response.status) {
    return Err(FetchError::ServerError(response.status));
  }

  if response.body.is_empty() {
    return Err(FetchError::NoData);
  }

  serde_json::from_slice(&response.body).map_err(FetchError::DecodingFailed)
}
