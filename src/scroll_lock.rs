use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tracing::debug;

// --- Scroll lock ---

/// Reference-counted scroll lock. Background lists stop scrolling while any
/// guard is alive.
#[derive(Clone, Default)]
pub struct ScrollLock {
  holders: Arc<AtomicUsize>,
}

impl ScrollLock {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn acquire(&self) -> ScrollLockGuard {
    let held = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(held, "scroll lock acquired");
    ScrollLockGuard { holders: Arc::clone(&self.holders) }
  }

  pub fn is_locked(&self) -> bool {
    self.holders.load(Ordering::SeqCst) > 0
  }

  pub fn holders(&self) -> usize {
    self.holders.load(Ordering::SeqCst)
  }
}

#[must_use = "the scroll lock is released as soon as the guard is dropped"]
pub struct ScrollLockGuard {
  holders: Arc<AtomicUsize>,
}

impl Drop for ScrollLockGuard {
  fn drop(&mut self) {
    let held = self.holders.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
    debug!(held, "scroll lock released");
  }
}

// --- Key listeners ---

#[derive(Debug, Clone, PartialEq, Eq)]
struct Listener {
  id: u64,
  name: &'static str,
}

/// Stack of registered key listeners. The most recently registered one is
/// the active receiver; the gallery handles keys when the stack is empty.
#[derive(Clone, Default)]
pub struct KeyListeners {
  stack: Arc<StdMutex<Vec<Listener>>>,
  next_id: Arc<AtomicU64>,
}

impl KeyListeners {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, name: &'static str) -> KeyListenerGuard {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(Listener { id, name });
    debug!(name, id, "key listener registered");
    KeyListenerGuard { id, stack: Arc::clone(&self.stack) }
  }

  /// Name of the listener currently receiving keys.
  pub fn active(&self) -> Option<&'static str> {
    self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).last().map(|l| l.name)
  }

  pub fn len(&self) -> usize {
    self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
  }
}

#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct KeyListenerGuard {
  id: u64,
  stack: Arc<StdMutex<Vec<Listener>>>,
}

impl Drop for KeyListenerGuard {
  fn drop(&mut self) {
    let mut stack = self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    stack.retain(|l| l.id != self.id);
    debug!(id = self.id, "key listener removed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scroll_lock_counts_holders() {
    let lock = ScrollLock::new();
    assert!(!lock.is_locked());
    let a = lock.acquire();
    let b = lock.acquire();
    assert_eq!(lock.holders(), 2);
    drop(a);
    assert!(lock.is_locked());
    drop(b);
    assert!(!lock.is_locked());
  }

  #[test]
  fn scroll_lock_released_on_unwind() {
    let lock = ScrollLock::new();
    let shared = lock.clone();
    let result = std::panic::catch_unwind(move || {
      let _guard = shared.acquire();
      panic!("boom");
    });
    assert!(result.is_err());
    assert!(!lock.is_locked());
  }

  #[test]
  fn key_listeners_topmost_wins() {
    let keys = KeyListeners::new();
    assert_eq!(keys.active(), None);
    let outer = keys.register("quote");
    let inner = keys.register("video-modal");
    assert_eq!(keys.active(), Some("video-modal"));
    drop(inner);
    assert_eq!(keys.active(), Some("quote"));
    drop(outer);
    assert_eq!(keys.len(), 0);
  }

  #[test]
  fn key_listener_out_of_order_release() {
    let keys = KeyListeners::new();
    let first = keys.register("a");
    let second = keys.register("b");
    drop(first);
    assert_eq!(keys.active(), Some("b"));
    drop(second);
    assert_eq!(keys.active(), None);
  }
}
