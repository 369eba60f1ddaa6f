//! Registry of in-flight requests, used for bulk cancellation.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Opaque handle identifying one registered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

struct RegistryState {
  /// Sticky cancellation flag. Set by `cancel_all`, cleared by `reset`.
  cancelled: bool,
  /// Client-wide token, cancelled together with the flag. Backoff sleeps wait on it.
  shutdown: CancellationToken,
  next_id: u64,
  active: HashMap<RequestId, CancellationToken>,
}

/// Cancellation flag plus the set of in-flight request handles.
///
/// Both live under one lock, so a request either registers before
/// `cancel_all` runs (and is cancelled by it) or observes the flag and never
/// starts.
pub struct RequestRegistry {
  state: Mutex<RegistryState>,
}

impl Default for RequestRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl RequestRegistry {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(RegistryState {
        cancelled: false,
        shutdown: CancellationToken::new(),
        next_id: 0,
        active: HashMap::new(),
      }),
    }
  }

  /// Register a new in-flight request.
  ///
  /// Returns `None` if the registry has been cancelled. When `parent` is
  /// given, the request token is its child, so cancelling the parent cancels
  /// the request too.
  pub fn register(&self, parent: Option<&CancellationToken>) -> Option<ActiveRequest<'_>> {
    let mut state = self.state.lock();
    if state.cancelled {
      return None;
    }

    let id = RequestId(state.next_id);
    state.next_id += 1;

    let token = match parent {
      Some(parent) => parent.child_token(),
      None => CancellationToken::new(),
    };
    state.active.insert(id, token.clone());

    Some(ActiveRequest {
      id,
      token,
      registry: self,
    })
  }

  /// Remove a request. Returns false if it was already gone.
  pub fn deregister(&self, id: RequestId) -> bool {
    self.state.lock().active.remove(&id).is_some()
  }

  /// Set the flag, cancel every registered request and empty the registry.
  ///
  /// Safe to call repeatedly.
  pub fn cancel_all(&self) {
    let mut state = self.state.lock();
    state.cancelled = true;
    state.shutdown.cancel();
    for (_, token) in state.active.drain() {
      token.cancel();
    }
  }

  /// Clear the cancellation flag so new requests may start again.
  pub fn reset(&self) {
    let mut state = self.state.lock();
    if state.cancelled {
      state.cancelled = false;
      state.shutdown = CancellationToken::new();
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.state.lock().cancelled
  }

  /// Token cancelled by the next (or a past, not yet reset) `cancel_all`.
  pub fn shutdown_token(&self) -> CancellationToken {
    self.state.lock().shutdown.clone()
  }

  /// Number of requests currently registered.
  pub fn len(&self) -> usize {
    self.state.lock().active.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Registration of one in-flight request. Deregisters on drop.
pub struct ActiveRequest<'a> {
  id: RequestId,
  token: CancellationToken,
  registry: &'a RequestRegistry,
}

impl ActiveRequest<'_> {
  pub fn id(&self) -> RequestId {
    self.id
  }

  pub fn token(&self) -> &CancellationToken {
    &self.token
  }
}

impl Drop for ActiveRequest<'_> {
  fn drop(&mut self) {
    // May already be gone if cancel_all drained it
    self.registry.deregister(self.id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_register_and_drop() {
    let registry = RequestRegistry::new();

    let first = registry.register(None).unwrap();
    let second = registry.register(None).unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(registry.len(), 2);

    drop(first);
    assert_eq!(registry.len(), 1);
    drop(second);
    assert!(registry.is_empty());
  }

  #[test]
  fn test_deregister_is_idempotent() {
    let registry = RequestRegistry::new();
    let request = registry.register(None).unwrap();
    let id = request.id();

    assert!(registry.deregister(id));
    assert!(!registry.deregister(id));
    // Drop after manual removal is a no-op
    drop(request);
    assert!(registry.is_empty());
  }

  #[test]
  fn test_cancel_all_cancels_registered_tokens() {
    let registry = RequestRegistry::new();
    let shutdown = registry.shutdown_token();
    let request = registry.register(None).unwrap();

    registry.cancel_all();

    assert!(request.token().is_cancelled());
    assert!(shutdown.is_cancelled());
    assert!(registry.is_empty());
    assert!(registry.is_cancelled());

    // Second call is harmless
    registry.cancel_all();
    drop(request);
  }

  #[test]
  fn test_register_after_cancel_is_refused() {
    let registry = RequestRegistry::new();
    registry.cancel_all();
    assert!(registry.register(None).is_none());

    registry.reset();
    assert!(!registry.is_cancelled());
    assert!(!registry.shutdown_token().is_cancelled());
    assert!(registry.register(None).is_some());
  }

  #[test]
  fn test_parent_token_cancels_request() {
    let registry = RequestRegistry::new();
    let parent = CancellationToken::new();
    let request = registry.register(Some(&parent)).unwrap();

    parent.cancel();
    assert!(request.token().is_cancelled());
    assert!(!registry.is_cancelled());
  }
}
