//! The task state manager.
//!
//! `TaskStateManager` owns the authoritative in-memory task list and is the only
//! path through which anything is persisted. Every mutation follows the same
//! order: validate, take the task's id slot, persist, and only once the store
//! reports success apply the change in memory and notify observers. A failed
//! store call therefore leaves the in-memory state exactly as it was.
//!
//! The collection lock is a plain mutex held only for short, synchronous
//! sections, never across an `.await`. Readers copy out a snapshot and never
//! wait on persistence.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{TaskError, TaskResult};
use crate::fields::FilterMode;
use crate::filter;
use crate::locks::IdLocks;
use crate::notifier::{ChangeNotifier, ObserverId};
use crate::store::TaskStore;
use crate::task::{normalise_name, TaskId, TaskRecord};

#[derive(Default)]
struct State {
    tasks: Vec<TaskRecord>,
    filter: FilterMode,
}

impl State {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

pub struct TaskStateManager {
    store: Arc<dyn TaskStore>,
    state: Mutex<State>,
    locks: IdLocks,
    // Creation is serialized so tail appends follow store insertion order.
    create_lock: tokio::sync::Mutex<()>,
    notifier: ChangeNotifier,
}

impl TaskStateManager {
    /// A manager over `store` with an empty collection. Call `initialize` to load.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        TaskStateManager {
            store,
            state: Mutex::new(State::default()),
            locks: IdLocks::new(),
            create_lock: tokio::sync::Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Create a manager and load the store's contents.
    pub async fn open(store: Arc<dyn TaskStore>) -> TaskResult<Self> {
        let manager = Self::new(store);
        manager.initialize().await?;
        Ok(manager)
    }

    /// Replace the collection with the store's contents and reset the filter.
    pub async fn initialize(&self) -> TaskResult<()> {
        let tasks = self.store.load_all().await?;
        let mut seen = std::collections::HashSet::with_capacity(tasks.len());
        if let Some(dup) = tasks.iter().find(|t| !seen.insert(t.id)) {
            return Err(TaskError::DuplicateId(dup.id));
        }
        tracing::info!(count = tasks.len(), "loaded tasks");
        {
            let mut state = self.state.lock();
            state.tasks = tasks;
            state.filter = FilterMode::All;
        }
        self.notifier.notify();
        Ok(())
    }

    /// Close the underlying store.
    pub async fn close(&self) -> TaskResult<()> {
        self.store.close().await?;
        Ok(())
    }

    // Intents

    /// Add a task at the end of the list.
    ///
    /// A blank name is ignored: `Ok(None)`, no store call, no notification.
    pub async fn add_task(&self, name: &str) -> TaskResult<Option<TaskRecord>> {
        let Some(name) = normalise_name(name) else {
            tracing::debug!("ignoring blank task name");
            return Ok(None);
        };

        let _create = self.create_lock.lock().await;
        let id = self.store.create_task(name).await?;
        let record = TaskRecord::new(id, name);
        {
            let mut state = self.state.lock();
            if state.position(id).is_some() {
                tracing::error!(id, "store returned an id that is already live");
                return Err(TaskError::DuplicateId(id));
            }
            state.tasks.push(record.clone());
        }
        tracing::debug!(id, "task added");
        self.notifier.notify();
        Ok(Some(record))
    }

    /// Rename a task. Returns `Ok(false)` when the new name is blank.
    pub async fn rename_task(&self, id: TaskId, new_name: &str) -> TaskResult<bool> {
        let Some(name) = normalise_name(new_name) else {
            tracing::debug!(id, "ignoring blank rename");
            return Ok(false);
        };
        self.ensure_present(id)?;

        let _slot = self.locks.acquire(id).await;
        self.ensure_present(id)?;
        self.store.update_task_name(id, name).await?;
        self.apply(id, |t| t.name = name.to_string())?;
        tracing::debug!(id, "task renamed");
        self.notifier.notify();
        Ok(true)
    }

    /// Mark a task completed or active.
    pub async fn set_completed(&self, id: TaskId, completed: bool) -> TaskResult<()> {
        self.ensure_present(id)?;

        let _slot = self.locks.acquire(id).await;
        self.ensure_present(id)?;
        self.store.update_task_completion(id, completed).await?;
        self.apply(id, |t| t.completed = completed)?;
        tracing::debug!(id, completed, "task completion changed");
        self.notifier.notify();
        Ok(())
    }

    /// Delete a task. An id unknown to the collection is a `NotFound` error.
    pub async fn delete_task(&self, id: TaskId) -> TaskResult<()> {
        self.ensure_present(id)?;

        let _slot = self.locks.acquire(id).await;
        self.delete_locked(id).await?;
        self.notifier.notify();
        Ok(())
    }

    /// Delete every completed task, lowest id first, one store call each.
    ///
    /// Stops at the first failure. Tasks deleted before it stay deleted and
    /// observers are told about them; the error reports how far it got.
    pub async fn clear_completed(&self) -> TaskResult<usize> {
        let mut targets: Vec<TaskId> = {
            let state = self.state.lock();
            state.tasks.iter().filter(|t| t.completed).map(|t| t.id).collect()
        };
        targets.sort_unstable();

        let mut deleted = 0;
        for id in targets {
            let _slot = self.locks.acquire(id).await;
            // Another intent may have reopened or removed it while we waited.
            if !self.is_completed(id) {
                continue;
            }
            if let Err(source) = self.delete_locked(id).await {
                let remaining = self.state.lock().tasks.iter().filter(|t| t.completed).count();
                tracing::warn!(deleted, remaining, error = %source, "clear completed stopped early");
                if deleted > 0 {
                    self.notifier.notify();
                }
                return Err(TaskError::ClearCompleted {
                    deleted,
                    remaining,
                    source: Box::new(source),
                });
            }
            deleted += 1;
        }

        if deleted > 0 {
            tracing::debug!(deleted, "cleared completed tasks");
            self.notifier.notify();
        }
        Ok(deleted)
    }

    /// Change which tasks `visible_tasks` returns. Not persisted.
    pub fn set_filter(&self, mode: FilterMode) {
        self.state.lock().filter = mode;
        self.notifier.notify();
    }

    // Reads

    /// Tasks admitted by the current filter, in list order.
    pub fn visible_tasks(&self) -> Vec<TaskRecord> {
        let state = self.state.lock();
        filter::visible_tasks(&state.tasks, state.filter)
    }

    /// Tasks not yet completed across the whole list, whatever the filter.
    pub fn active_count(&self) -> usize {
        filter::active_count(&self.state.lock().tasks)
    }

    pub fn current_filter(&self) -> FilterMode {
        self.state.lock().filter
    }

    /// Snapshot of the full list.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().tasks.clone()
    }

    /// Number of tasks in the full list.
    pub fn task_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
        let state = self.state.lock();
        state.position(id).map(|idx| state.tasks[idx].clone())
    }

    // Observers

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // Helpers

    fn ensure_present(&self, id: TaskId) -> TaskResult<()> {
        if self.state.lock().position(id).is_some() {
            Ok(())
        } else {
            Err(TaskError::NotFound(id))
        }
    }

    fn is_completed(&self, id: TaskId) -> bool {
        let state = self.state.lock();
        state.position(id).is_some_and(|idx| state.tasks[idx].completed)
    }

    fn apply(&self, id: TaskId, edit: impl FnOnce(&mut TaskRecord)) -> TaskResult<()> {
        let mut state = self.state.lock();
        let idx = state.position(id).ok_or(TaskError::NotFound(id))?;
        edit(&mut state.tasks[idx]);
        Ok(())
    }

    /// Persist and apply a deletion. Caller holds the id's slot.
    async fn delete_locked(&self, id: TaskId) -> TaskResult<()> {
        self.ensure_present(id)?;
        self.store.delete_task(id).await?;
        let mut state = self.state.lock();
        if let Some(idx) = state.position(id) {
            state.tasks.remove(idx);
        }
        tracing::debug!(id, "task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{StoreError, StoreResult};
    use crate::store::SqliteStore;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(String),
        Rename(TaskId, String),
        Complete(TaskId, bool),
        Delete(TaskId),
    }

    #[derive(Default)]
    struct Inner {
        tasks: Vec<TaskRecord>,
        next_id: TaskId,
        calls: Vec<Call>,
        fail_deletes: HashSet<TaskId>,
        fail_all: bool,
        in_flight: HashMap<TaskId, usize>,
        max_same_id: usize,
        max_total: usize,
    }

    /// In-memory store that records calls, can fail on demand and yields
    /// mid-call so overlapping operations interleave.
    #[derive(Default)]
    struct ScriptedStore {
        inner: Mutex<Inner>,
    }

    impl ScriptedStore {
        fn new() -> Arc<Self> {
            let store = ScriptedStore::default();
            store.inner.lock().next_id = 1;
            Arc::new(store)
        }

        fn calls(&self) -> Vec<Call> {
            self.inner.lock().calls.clone()
        }

        fn stored(&self) -> Vec<TaskRecord> {
            self.inner.lock().tasks.clone()
        }

        fn fail_delete_of(&self, id: TaskId) {
            self.inner.lock().fail_deletes.insert(id);
        }

        fn fail_everything(&self, fail: bool) {
            self.inner.lock().fail_all = fail;
        }

        async fn track<T>(
            &self,
            id: TaskId,
            call: Call,
            op: impl FnOnce(&mut Inner) -> StoreResult<T>,
        ) -> StoreResult<T> {
            {
                let mut inner = self.inner.lock();
                let count = inner.in_flight.entry(id).or_default();
                *count += 1;
                let same = *count;
                let total: usize = inner.in_flight.values().sum();
                inner.max_same_id = inner.max_same_id.max(same);
                inner.max_total = inner.max_total.max(total);
            }
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            let mut inner = self.inner.lock();
            *inner.in_flight.entry(id).or_default() -= 1;
            inner.calls.push(call);
            if inner.fail_all {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            op(&mut inner)
        }

        fn position(inner: &Inner, id: TaskId) -> StoreResult<usize> {
            inner
                .tasks
                .iter()
                .position(|t| t.id == id)
                .ok_or(StoreError::NotFound(id))
        }
    }

    #[async_trait]
    impl TaskStore for ScriptedStore {
        async fn create_task(&self, name: &str) -> StoreResult<TaskId> {
            self.track(0, Call::Create(name.to_string()), |inner| {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.tasks.push(TaskRecord::new(id, name));
                Ok(id)
            })
            .await
        }

        async fn update_task_name(&self, id: TaskId, name: &str) -> StoreResult<()> {
            self.track(id, Call::Rename(id, name.to_string()), |inner| {
                let idx = Self::position(inner, id)?;
                inner.tasks[idx].name = name.to_string();
                Ok(())
            })
            .await
        }

        async fn update_task_completion(&self, id: TaskId, completed: bool) -> StoreResult<()> {
            self.track(id, Call::Complete(id, completed), |inner| {
                let idx = Self::position(inner, id)?;
                inner.tasks[idx].completed = completed;
                Ok(())
            })
            .await
        }

        async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
            self.track(id, Call::Delete(id), |inner| {
                if inner.fail_deletes.contains(&id) {
                    return Err(StoreError::Io(std::io::Error::other("write failed")));
                }
                let idx = Self::position(inner, id)?;
                inner.tasks.remove(idx);
                Ok(())
            })
            .await
        }

        async fn load_all(&self) -> StoreResult<Vec<TaskRecord>> {
            Ok(self.stored())
        }
    }

    async fn manager_with(store: &Arc<ScriptedStore>) -> TaskStateManager {
        let dyn_store: Arc<dyn TaskStore> = store.clone();
        TaskStateManager::open(dyn_store).await.unwrap()
    }

    fn count_notifications(manager: &TaskStateManager) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        manager.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hits
    }

    #[tokio::test]
    async fn test_add_buy_milk() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;

        let record = manager.add_task("Buy milk").await.unwrap().unwrap();
        assert_eq!(record, TaskRecord::new(1, "Buy milk"));
        assert_eq!(manager.tasks(), vec![TaskRecord::new(1, "Buy milk")]);
        assert_eq!(manager.active_count(), 1);
        assert_eq!(store.stored(), manager.tasks());
    }

    #[tokio::test]
    async fn test_blank_add_is_silent() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        let hits = count_notifications(&manager);

        assert_eq!(manager.add_task("   ").await.unwrap(), None);
        assert_eq!(manager.add_task("").await.unwrap(), None);
        assert!(manager.tasks().is_empty());
        assert!(store.calls().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completed_filter_scenario() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        manager.add_task("B").await.unwrap();
        manager.set_completed(1, true).await.unwrap();
        manager.set_filter(FilterMode::Completed);

        assert_eq!(manager.current_filter(), FilterMode::Completed);
        assert_eq!(
            manager.visible_tasks(),
            vec![TaskRecord { id: 1, name: "A".into(), completed: true }]
        );
        // Active count ignores the filter.
        assert_eq!(manager.active_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_completed_deletes_all_done() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        manager.add_task("B").await.unwrap();
        manager.set_completed(2, true).await.unwrap();
        manager.set_completed(1, true).await.unwrap();

        assert_eq!(manager.clear_completed().await.unwrap(), 2);
        assert!(manager.tasks().is_empty());
        assert!(store.stored().is_empty());
        let deletes: Vec<_> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Delete(_)))
            .collect();
        assert_eq!(deletes, vec![Call::Delete(1), Call::Delete(2)]);
    }

    #[tokio::test]
    async fn test_clear_completed_stops_at_first_failure() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        for name in ["A", "B", "C", "D"] {
            manager.add_task(name).await.unwrap();
        }
        for id in [1, 2, 3] {
            manager.set_completed(id, true).await.unwrap();
        }
        store.fail_delete_of(2);
        let hits = count_notifications(&manager);

        let err = manager.clear_completed().await.unwrap_err();
        match err {
            TaskError::ClearCompleted { deleted, remaining, source } => {
                assert_eq!(deleted, 1);
                assert_eq!(remaining, 2);
                assert!(matches!(*source, TaskError::Storage(StoreError::Io(_))));
            }
            other => panic!("unexpected error: {other}"),
        }
        let ids: Vec<_> = manager.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(store.stored().len(), 3);
        assert!(!store.calls().contains(&Call::Delete(3)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rename_unknown_id_is_not_found() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        let before = manager.tasks();

        let err = manager.rename_task(99, "x").await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound(99)));
        assert_eq!(manager.tasks(), before);
        assert_eq!(store.calls(), vec![Call::Create("A".into())]);
    }

    #[tokio::test]
    async fn test_rename_blank_is_ignored() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();

        assert!(!manager.rename_task(1, "  ").await.unwrap());
        assert!(manager.rename_task(1, " Apples ").await.unwrap());
        assert_eq!(manager.get(1).unwrap().name, "Apples");
        assert_eq!(store.stored()[0].name, "Apples");
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_surfaced() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        assert!(matches!(manager.delete_task(5).await, Err(TaskError::NotFound(5))));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_completed_is_idempotent() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();

        manager.set_completed(1, true).await.unwrap();
        let once = (manager.tasks(), manager.active_count(), store.stored());
        manager.set_completed(1, true).await.unwrap();
        let twice = (manager.tasks(), manager.active_count(), store.stored());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_state_unchanged() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        let before = manager.tasks();
        let hits = count_notifications(&manager);
        store.fail_everything(true);

        assert!(matches!(manager.add_task("B").await, Err(TaskError::Storage(_))));
        assert!(matches!(manager.rename_task(1, "Z").await, Err(TaskError::Storage(_))));
        assert!(matches!(manager.set_completed(1, true).await, Err(TaskError::Storage(_))));
        assert!(matches!(manager.delete_task(1).await, Err(TaskError::Storage(_))));
        assert_eq!(manager.tasks(), before);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        store.fail_everything(false);
        manager.set_completed(1, true).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ids_unique_across_adds_and_deletes() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        let mut issued = HashSet::new();
        for round in 0..5 {
            for n in 0..4 {
                let record = manager.add_task(&format!("task {round}.{n}")).await.unwrap().unwrap();
                assert!(issued.insert(record.id), "id {} issued twice", record.id);
            }
            let first = manager.tasks()[0].id;
            manager.delete_task(first).await.unwrap();
        }
        let live: Vec<_> = manager.tasks().iter().map(|t| t.id).collect();
        let unique: HashSet<_> = live.iter().copied().collect();
        assert_eq!(live.len(), unique.len());
        assert_eq!(live.len(), 15);
    }

    #[tokio::test]
    async fn test_views_consistent_under_every_filter() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        for name in ["A", "B", "C", "D", "E"] {
            manager.add_task(name).await.unwrap();
        }
        manager.set_completed(2, true).await.unwrap();
        manager.set_completed(4, true).await.unwrap();

        for mode in [FilterMode::Completed, FilterMode::Active, FilterMode::All, FilterMode::Active] {
            manager.set_filter(mode);
            let all = filter::visible_tasks(&manager.tasks(), FilterMode::All);
            assert_eq!(all, manager.tasks());
            let active = filter::visible_tasks(&manager.tasks(), FilterMode::Active);
            assert_eq!(manager.active_count(), active.len());
        }
        manager.set_filter(FilterMode::All);
        assert_eq!(manager.visible_tasks(), manager.tasks());
    }

    #[tokio::test]
    async fn test_same_id_mutations_are_serialized_fifo() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        manager.add_task("B").await.unwrap();

        let (r1, r2, r3) = tokio::join!(
            manager.set_completed(1, true),
            manager.set_completed(1, false),
            manager.rename_task(2, "B2"),
        );
        r1.unwrap();
        r2.unwrap();
        r3.unwrap();

        let inner = store.inner.lock();
        assert_eq!(inner.max_same_id, 1);
        // Different ids were allowed to overlap.
        assert_eq!(inner.max_total, 2);
        let completes: Vec<_> = inner
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Complete(1, _)))
            .cloned()
            .collect();
        assert_eq!(completes, vec![Call::Complete(1, true), Call::Complete(1, false)]);
        drop(inner);
        assert!(!manager.get(1).unwrap().completed);
    }

    #[tokio::test]
    async fn test_queued_mutation_after_delete_is_not_found() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();

        let (deleted, renamed) = tokio::join!(manager.delete_task(1), manager.rename_task(1, "late"));
        deleted.unwrap();
        assert!(matches!(renamed, Err(TaskError::NotFound(1))));
        assert!(!store.calls().contains(&Call::Rename(1, "late".into())));
    }

    #[tokio::test]
    async fn test_every_mutation_notifies() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        let hits = count_notifications(&manager);

        manager.add_task("A").await.unwrap();
        manager.rename_task(1, "A2").await.unwrap();
        manager.set_completed(1, true).await.unwrap();
        manager.set_filter(FilterMode::Active);
        manager.clear_completed().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 5);

        // Nothing to clear: no notification.
        assert_eq!(manager.clear_completed().await.unwrap(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_initialize_loads_in_store_order() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for name in ["first", "second", "third"] {
            store.create_task(name).await.unwrap();
        }
        store.update_task_completion(2, true).await.unwrap();

        let manager = TaskStateManager::open(store.clone()).await.unwrap();
        manager.set_filter(FilterMode::Active);
        manager.initialize().await.unwrap();

        let names: Vec<_> = manager.tasks().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(manager.current_filter(), FilterMode::All);
        assert_eq!(manager.active_count(), 2);
    }

    #[tokio::test]
    async fn test_restart_sees_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");
        {
            let manager = TaskStateManager::open(crate::store::open_store(&path).await.unwrap())
                .await
                .unwrap();
            manager.add_task("Buy milk").await.unwrap();
            manager.add_task("Walk dog").await.unwrap();
            manager.set_completed(1, true).await.unwrap();
            manager.close().await.unwrap();
        }
        let manager = TaskStateManager::open(crate::store::open_store(&path).await.unwrap())
            .await
            .unwrap();
        assert_eq!(
            manager.tasks(),
            vec![
                TaskRecord { id: 1, name: "Buy milk".into(), completed: true },
                TaskRecord::new(2, "Walk dog"),
            ]
        );
    }

    fn deletes_of(store: &ScriptedStore, id: TaskId) -> usize {
        store
            .calls()
            .iter()
            .filter(|c| **c == Call::Delete(id))
            .count()
    }

    #[tokio::test]
    async fn test_clear_completed_skips_task_reopened_while_waiting() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        manager.add_task("B").await.unwrap();
        manager.set_completed(1, true).await.unwrap();
        manager.set_completed(2, true).await.unwrap();

        // The reopen holds id 2 while clear_completed is still deleting id 1.
        let (cleared, reopened) =
            tokio::join!(manager.clear_completed(), manager.set_completed(2, false));

        assert_eq!(cleared.unwrap(), 1);
        reopened.unwrap();
        assert_eq!(manager.tasks(), vec![TaskRecord::new(2, "B")]);
        assert_eq!(store.stored(), manager.tasks());
        assert_eq!(deletes_of(&store, 1), 1);
        assert_eq!(deletes_of(&store, 2), 0);
    }

    #[tokio::test]
    async fn test_clear_completed_skips_task_deleted_while_waiting() {
        let store = ScriptedStore::new();
        let manager = manager_with(&store).await;
        manager.add_task("A").await.unwrap();
        manager.add_task("B").await.unwrap();
        manager.add_task("C").await.unwrap();
        manager.set_completed(1, true).await.unwrap();
        manager.set_completed(2, true).await.unwrap();

        let (cleared, deleted) = tokio::join!(manager.clear_completed(), manager.delete_task(2));

        assert_eq!(cleared.unwrap(), 1);
        deleted.unwrap();
        assert_eq!(manager.tasks(), vec![TaskRecord::new(3, "C")]);
        assert_eq!(deletes_of(&store, 1), 1);
        // Only the explicit delete reached the store.
        assert_eq!(deletes_of(&store, 2), 1);
    }
}
