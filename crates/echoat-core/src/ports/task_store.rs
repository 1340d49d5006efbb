//! TaskStore port - 共有ストアが実装する正本（source of truth）
//!
//! TaskStore は以下を提供します：
//! - 条件付き挿入（enqueue）
//! - 最も早いタスクの参照（peek_earliest）
//! - アトミックな取得＋削除（claim）
//! - 変更通知（subscribe）
//!
//! # 設計原則
//! - タスクはストアにだけ存在する（プロセス内にキャッシュしない）
//! - claim の勝者は常に 1 つ（ストアのアトミック削除が唯一の排他制御）
//! - 変更通知は「何か変わった」だけを伝える。中身は信用せず、必ず peek し直す

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{StoreError, Task, TaskKey};

/// How pending keys are enumerated to find the earliest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStrategy {
    /// Keys are kept in a structure ordered by due time. O(log n) insert/remove.
    #[default]
    SortedIndex,

    /// Every pending key is scanned on each peek. O(n) per recompute.
    FullScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown index strategy `{0}` (expected `sorted-index` or `full-scan`)")]
pub struct UnknownIndexStrategy(String);

impl FromStr for IndexStrategy {
    type Err = UnknownIndexStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sorted-index" | "sorted" | "index" => Ok(Self::SortedIndex),
            "full-scan" | "scan" => Ok(Self::FullScan),
            other => Err(UnknownIndexStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SortedIndex => f.write_str("sorted-index"),
            Self::FullScan => f.write_str("full-scan"),
        }
    }
}

/// A content-free change signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Something under the task namespace was inserted or removed.
    Changed,

    /// The underlying subscription was lost and re-established; events may
    /// have been missed in between.
    Resubscribed,
}

/// Producer half of a change feed, held by the store implementation.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Returns `false` once the consumer has dropped its feed.
    pub fn notify(&self, event: ChangeEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the consumer drops its feed.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Consumer half: an unbounded, best-effort stream of change events.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn channel() -> (ChangeNotifier, ChangeFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChangeNotifier { tx }, ChangeFeed { rx })
    }

    /// Next event, or `None` once every notifier is gone (subscription lost).
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Discard events that are already buffered and return how many there were.
    ///
    /// A recompute that starts after this call observes everything those
    /// events were announcing.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

/// TaskStore は保留中タスクの唯一の所有者
///
/// `Ok(false)` / `Ok(None)` は「起きなかった / 無かった」という正常な結果で、
/// I/O 障害は必ず `Err(StoreError)` で返すこと。
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert the task unless its key already exists. Returns whether it was inserted.
    async fn enqueue(&self, task: &Task) -> Result<bool, StoreError>;

    /// The pending key with the smallest due time. Never mutates.
    async fn peek_earliest(&self) -> Result<Option<TaskKey>, StoreError>;

    /// Payload for a key, or `None` if it was already claimed.
    async fn fetch_payload(&self, key: &TaskKey) -> Result<Option<String>, StoreError>;

    /// Atomically remove the task. Only the caller that actually removed it gets `true`.
    async fn claim(&self, key: &TaskKey) -> Result<bool, StoreError>;

    /// Open a new change feed scoped to the task namespace.
    async fn subscribe(&self) -> Result<ChangeFeed, StoreError>;

    fn index_strategy(&self) -> IndexStrategy;
}
