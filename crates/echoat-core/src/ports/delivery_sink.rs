//! DeliverySink port - claim に成功したメッセージの受け取り先
//!
//! # 保証
//! - 1 タスクにつき高々 1 プロセスからしか呼ばれない
//! - claim 後・配送前にプロセスが落ちた場合は呼ばれない（メッセージは失われる）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{SinkError, Task, TaskKey};

/// A claimed task on its way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub key: TaskKey,
    pub due_at: DateTime<Utc>,
    pub payload: String,
}

impl From<Task> for Delivery {
    fn from(task: Task) -> Self {
        Self {
            key: task.key(),
            due_at: task.due_at(),
            payload: task.into_payload(),
        }
    }
}

/// DeliverySink は claim 済みメッセージを外部へ渡す
///
/// 呼び出しは fire-and-forget です。エラーはログに残るだけで、
/// タスクはすでにストアから消えているのでリトライされません。
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), SinkError>;
}
