//! Per-task serialization of in-flight persistence.
//!
//! Each task id gets a fair (FIFO) async mutex while anything is using it.
//! Operations on the same id queue in arrival order; operations on different
//! ids proceed independently. Idle slots are dropped so the map only holds ids
//! with work in flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::task::TaskId;

type Slot = Arc<AsyncMutex<()>>;

#[derive(Default)]
pub struct IdLocks {
    slots: Mutex<HashMap<TaskId, Slot>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `id`.
    pub async fn acquire(&self, id: TaskId) -> IdGuard<'_> {
        let slot = Arc::clone(self.slots.lock().entry(id).or_default());
        let guard = Arc::clone(&slot).lock_owned().await;
        IdGuard {
            locks: self,
            id,
            slot,
            guard: Some(guard),
        }
    }

    /// Number of ids that currently have a holder or waiters.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Exclusive use of one task id. Released on drop.
pub struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: TaskId,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots.lock();
        // Only the map and this guard still reference the slot: nobody is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slot_removed_when_idle() {
        let locks = IdLocks::new();
        {
            let _guard = locks.acquire(1).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_block() {
        let locks = IdLocks::new();
        let _a = locks.acquire(1).await;
        let _b = locks.acquire(2).await;
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_same_id_waits_in_fifo_order() {
        let locks = IdLocks::new();
        let order = Mutex::new(Vec::new());

        let first = locks.acquire(7).await;
        let second = async {
            let _g = locks.acquire(7).await;
            order.lock().push("second");
        };
        let third = async {
            let _g = locks.acquire(7).await;
            order.lock().push("third");
        };
        let release = async {
            tokio::task::yield_now().await;
            order.lock().push("first");
            drop(first);
        };
        tokio::join!(second, third, release);

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
        assert_eq!(locks.active(), 0);
    }
}
