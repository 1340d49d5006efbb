//! In-memory task store.
//!
//! Used by tests and by the single-process `--store memory` mode. Every
//! scheduler that shares one `InMemoryTaskStore` sees the same task set, so it
//! behaves like many workers racing against one shared store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{StoreError, Task, TaskKey};
use crate::ports::{ChangeEvent, ChangeFeed, ChangeNotifier, IndexStrategy, TaskStore};

/// Ordered enumeration of pending keys.
///
/// Both implementations answer `earliest` identically; they differ only in
/// how much work an insert and a peek cost.
pub trait OrderedTaskIndex: Send + Sync {
    fn insert(&mut self, key: TaskKey);

    fn remove(&mut self, key: &TaskKey);

    fn earliest(&self, pending: &HashMap<TaskKey, String>) -> Option<TaskKey>;
}

/// Keys kept sorted by `(due_at, suffix)`.
#[derive(Debug, Default)]
pub struct SortedIndex {
    keys: BTreeSet<TaskKey>,
}

impl OrderedTaskIndex for SortedIndex {
    fn insert(&mut self, key: TaskKey) {
        self.keys.insert(key);
    }

    fn remove(&mut self, key: &TaskKey) {
        self.keys.remove(key);
    }

    fn earliest(&self, _pending: &HashMap<TaskKey, String>) -> Option<TaskKey> {
        self.keys.first().copied()
    }
}

/// No index at all: the minimum is recomputed from every pending key.
#[derive(Debug, Default)]
pub struct ScanIndex;

impl OrderedTaskIndex for ScanIndex {
    fn insert(&mut self, _key: TaskKey) {}

    fn remove(&mut self, _key: &TaskKey) {}

    fn earliest(&self, pending: &HashMap<TaskKey, String>) -> Option<TaskKey> {
        pending.keys().min().copied()
    }
}

pub fn index_for(strategy: IndexStrategy) -> Box<dyn OrderedTaskIndex> {
    match strategy {
        IndexStrategy::SortedIndex => Box::new(SortedIndex::default()),
        IndexStrategy::FullScan => Box::new(ScanIndex),
    }
}

struct InMemoryStoreState {
    /// Pending payloads (single source of truth).
    payloads: HashMap<TaskKey, String>,

    index: Box<dyn OrderedTaskIndex>,

    /// Live change feeds.
    subscribers: Vec<ChangeNotifier>,
}

impl InMemoryStoreState {
    fn broadcast(&mut self) {
        self.subscribers
            .retain(|notifier| notifier.notify(ChangeEvent::Changed));
    }
}

/// In-memory task store.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    strategy: IndexStrategy,
    /// Number of upcoming operations that should fail.
    injected_failures: Arc<AtomicU32>,
}

impl InMemoryTaskStore {
    pub fn new(strategy: IndexStrategy) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState {
                payloads: HashMap::new(),
                index: index_for(strategy),
                subscribers: Vec::new(),
            })),
            strategy,
            injected_failures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.payloads.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.payloads.is_empty()
    }

    /// Make the next `n` store operations fail with `StoreError::Unavailable`.
    pub fn inject_failures(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    /// Drop every open change feed, as if the connection behind them was lost.
    pub async fn close_feeds(&self) {
        let dropped = {
            let mut state = self.state.lock().await;
            std::mem::take(&mut state.subscribers).len()
        };
        debug!(dropped, "closed in-memory change feeds");
    }

    /// Emit a change event without touching any task.
    pub async fn notify_spurious(&self) {
        self.state.lock().await.broadcast();
    }

    fn check_failure(&self, op: &'static str) -> Result<(), StoreError> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::unavailable(op, "injected failure")),
            Err(_) => Ok(()),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new(IndexStrategy::default())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn enqueue(&self, task: &Task) -> Result<bool, StoreError> {
        self.check_failure("enqueue")?;
        let mut state = self.state.lock().await;
        if state.payloads.contains_key(&task.key()) {
            return Ok(false);
        }
        state.payloads.insert(task.key(), task.payload().to_string());
        state.index.insert(task.key());
        state.broadcast();
        Ok(true)
    }

    async fn peek_earliest(&self) -> Result<Option<TaskKey>, StoreError> {
        self.check_failure("peek_earliest")?;
        let state = self.state.lock().await;
        Ok(state.index.earliest(&state.payloads))
    }

    async fn fetch_payload(&self, key: &TaskKey) -> Result<Option<String>, StoreError> {
        self.check_failure("fetch_payload")?;
        let state = self.state.lock().await;
        Ok(state.payloads.get(key).cloned())
    }

    async fn claim(&self, key: &TaskKey) -> Result<bool, StoreError> {
        self.check_failure("claim")?;
        let mut state = self.state.lock().await;
        if state.payloads.remove(key).is_none() {
            return Ok(false);
        }
        state.index.remove(key);
        state.broadcast();
        Ok(true)
    }

    async fn subscribe(&self) -> Result<ChangeFeed, StoreError> {
        let (notifier, feed) = ChangeFeed::channel();
        self.state.lock().await.subscribers.push(notifier);
        Ok(feed)
    }

    fn index_strategy(&self) -> IndexStrategy {
        self.strategy
    }
}
