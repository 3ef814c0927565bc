//! Change notification for views that render task state.
//!
//! Observers get no payload: they re-read whatever they need from the state
//! manager. A failing observer is logged and skipped, never propagated, so one
//! broken view cannot starve the others.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked after every state change.
pub type Observer = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered registry of observers.
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Observers run in registration order.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every observer once.
    ///
    /// The list is snapshotted first, so observers may subscribe or
    /// unsubscribe from inside their callback.
    pub fn notify(&self) {
        let snapshot: Vec<(ObserverId, Observer)> = self.observers.lock().clone();
        for (id, observer) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| observer())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(observer = id.0, error = %e, "change observer failed");
                }
                Err(_) => {
                    tracing::error!(observer = id.0, "change observer panicked");
                }
            }
        }
    }
}
