//! Load state for asynchronously fetched data.
//!
//! `Query<T>` runs a fetcher on the Tokio runtime and tracks the
//! `Idle -> Loading -> Loaded | Failed` progression as plain data, so a
//! consumer can render whatever state it finds.
//!
//! # Example
//!
//! ```ignore
//! let repo = repository.clone();
//! let mut query = Query::new(move || {
//!     let repo = repo.clone();
//!     async move { repo.get_listings(false).await }
//! });
//!
//! query.fetch();
//! query.settle().await;
//! query.refine(|listings| sort_listings(listings, SortOption::PriceAscending));
//!
//! match query.state() {
//!     LoadState::Loading => render_spinner(),
//!     LoadState::Loaded(listings) => render(listings),
//!     LoadState::Failed(e) => render_error(e),
//!     LoadState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::api::FetchError;

/// Where a query is in its lifecycle.
#[derive(Debug)]
pub enum LoadState<T> {
  /// Not started
  Idle,
  /// A fetch is in flight
  Loading,
  Loaded(T),
  Failed(FetchError),
}

impl<T> LoadState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading)
  }

  pub fn is_loaded(&self) -> bool {
    matches!(self, LoadState::Loaded(_))
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, LoadState::Failed(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      LoadState::Loaded(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&FetchError> {
    match self {
      LoadState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query with state management.
///
/// The fetcher closure is called on every `fetch()`; its result arrives
/// over a channel and is applied by `settle()`. A fetch task that dies
/// without sending leaves the query `Failed(Cancelled)`.
pub struct Query<T> {
  state: LoadState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, FetchError>>>,
}

impl<T: Send + 'static> Query<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    Self {
      state: LoadState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &LoadState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.state.error()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start fetching unless a fetch is already in flight.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Wait for the pending fetch, if any, and return the resulting state.
  pub async fn settle(&mut self) -> &LoadState<T> {
    if let Some(receiver) = &mut self.receiver {
      let result = receiver.recv().await.unwrap_or(Err(FetchError::Cancelled));
      self.apply(result);
    }
    &self.state
  }

  /// Transform loaded data in place without going back through `Loading`.
  ///
  /// Returns `false` when there is no loaded data to refine.
  pub fn refine<F>(&mut self, f: F) -> bool
  where
    F: FnOnce(&mut T),
  {
    match &mut self.state {
      LoadState::Loaded(data) => {
        f(data);
        true
      }
      _ => false,
    }
  }

  fn apply(&mut self, result: Result<T, FetchError>) {
    self.state = match result {
      Ok(data) => LoadState::Loaded(data),
      Err(e) => LoadState::Failed(e),
    };
    self.receiver = None;
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = LoadState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // Receiver may have been dropped with the query
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_loaded() {
    let mut query = Query::new(|| async { Ok::<_, FetchError>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), LoadState::Idle));

    query.fetch();
    assert!(query.is_loading());

    assert!(query.settle().await.is_loaded());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_failed() {
    let mut query: Query<i32> =
      Query::new(|| async { Err::<i32, _>(FetchError::ServerError(503)) });

    query.fetch();
    let state = query.settle().await;

    assert!(state.is_failed());
    assert!(matches!(query.error(), Some(FetchError::ServerError(503))));
  }

  #[tokio::test]
  async fn test_settle_without_fetch_is_idle() {
    let mut query = Query::new(|| async { Ok::<_, FetchError>(1) });
    assert!(matches!(query.settle().await, LoadState::Idle));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_while_loading_is_noop() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, FetchError>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    assert!(query.is_loading());

    query.fetch();
    assert!(query.is_loading());

    query.settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_panicking_fetch_becomes_cancelled() {
    let mut query: Query<i32> = Query::new(|| async {
      if true {
        panic!("fetch task died");
      }
      Ok::<_, FetchError>(0)
    });

    query.fetch();
    let state = query.settle().await;
    assert!(matches!(state, LoadState::Failed(FetchError::Cancelled)));
  }

  #[tokio::test]
  async fn test_refine_loaded_data() {
    let mut query = Query::new(|| async { Ok::<_, FetchError>(vec![3, 1, 2]) });

    assert!(!query.refine(|v| v.sort()));

    query.fetch();
    query.settle().await;

    assert!(query.refine(|v| v.sort()));
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
    assert!(query.state().is_loaded());
  }
}
