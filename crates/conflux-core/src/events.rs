//! Change events and the listener registry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};
use tracing::warn;

/// Event describing a configuration change
///
/// Constructed only when the newly merged snapshot structurally differs from
/// the cached one. On the very first successful scan `previous` is the empty
/// tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChange {
    /// The snapshot before the change
    pub previous: Value,
    /// The snapshot after the change
    pub current: Value,
}

impl ConfigChange {
    /// Create a change event
    pub fn new(previous: Value, current: Value) -> Self {
        Self { previous, current }
    }
}

/// A registered change listener
pub type Listener = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

/// Registration-ordered set of change listeners
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

impl ListenerSet {
    fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    fn snapshot(&self) -> Vec<Listener> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Shared listener registry owned by the retriever
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<ListenerSet>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a listener; the handle removes it again
    pub(crate) fn add(&self, listener: Listener) -> ListenerHandle {
        let id = self.inner.lock().expect("listener registry poisoned").add(listener);
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a change to every listener in registration order
    ///
    /// A panicking listener is logged and skipped; delivery continues with
    /// the remaining listeners.
    pub(crate) fn notify(&self, change: &ConfigChange) {
        let listeners = self
            .inner
            .lock()
            .expect("listener registry poisoned")
            .snapshot();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
                warn!("configuration change listener panicked; continuing with remaining listeners");
            }
        }
    }

    /// Drop all listeners (teardown)
    pub(crate) fn clear(&self) {
        self.inner
            .lock()
            .expect("listener registry poisoned")
            .listeners
            .clear();
    }
}

/// Handle returned by listener registration; unregisters the listener
///
/// Dropping the handle does *not* unregister; call
/// [`ListenerHandle::unregister`] explicitly. Listeners otherwise live until
/// the retriever is closed.
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Mutex<ListenerSet>>,
}

impl ListenerHandle {
    /// Remove the listener this handle was returned for
    pub fn unregister(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().expect("listener registry poisoned").remove(self.id);
        }
    }
}
