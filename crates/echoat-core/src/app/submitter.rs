//! Submitter - 入力を検証してタスクをストアに登録する
//!
//! キーは `(due_at, ランダムな suffix)` なので、ほぼ衝突しません。衝突した場合は
//! suffix を引き直して `max_attempts` 回まで試し、それでも駄目ならエラーを返します
//! （既存のタスクを上書きすることはありません）。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::SubmitConfig;
use crate::domain::{Submission, SubmitError, Task, TaskKey};
use crate::ports::{Clock, KeyGenerator, TaskStore};

pub struct Submitter {
    store: Arc<dyn TaskStore>,
    keys: Arc<dyn KeyGenerator>,
    clock: Arc<dyn Clock>,
    config: SubmitConfig,
}

impl Submitter {
    pub fn new(
        store: Arc<dyn TaskStore>,
        keys: Arc<dyn KeyGenerator>,
        clock: Arc<dyn Clock>,
        config: SubmitConfig,
    ) -> Self {
        Self {
            store,
            keys,
            clock,
            config,
        }
    }

    /// Validate a raw submission against the current time and enqueue it.
    pub async fn submit(&self, submission: &Submission) -> Result<TaskKey, SubmitError> {
        let accepted = submission.validate(self.clock.now())?;
        self.enqueue(accepted.due_at, accepted.message).await
    }

    /// Enqueue an already validated message. Past due times are accepted here
    /// and fire as soon as a scheduler sees them.
    pub async fn enqueue(
        &self,
        due_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Result<TaskKey, SubmitError> {
        let attempts = self.config.max_attempts.max(1);
        let mut task = Task::new(due_at, message, self.keys.as_ref());

        for attempt in 1..=attempts {
            if self.store.enqueue(&task).await? {
                info!(key = %task.key(), due_at = %task.due_at(), "task queued");
                return Ok(task.key());
            }
            if attempt < attempts {
                debug!(key = %task.key(), attempt, "task key collision; drawing a new one");
                task.regenerate_key(self.keys.as_ref());
            }
        }

        warn!(key = %task.key(), attempts, "gave up allocating a task key");
        Err(SubmitError::KeyAllocation {
            attempts,
            last_key: task.key(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationError;
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{FixedClock, FixedSuffixGenerator, RandomKeyGenerator};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn submitter(store: &InMemoryTaskStore, keys: Arc<dyn KeyGenerator>) -> Submitter {
        Submitter::new(
            Arc::new(store.clone()),
            keys,
            Arc::new(FixedClock::new(now())),
            SubmitConfig::default(),
        )
    }

    #[tokio::test]
    async fn accepted_submission_lands_in_store() {
        let store = InMemoryTaskStore::default();
        let submitter = submitter(&store, Arc::new(RandomKeyGenerator));

        let due = now().timestamp_millis() + 5_000;
        let key = submitter
            .submit(&Submission::new(due, "hello"))
            .await
            .unwrap();

        assert_eq!(key.due_at_ms(), due);
        assert_eq!(store.fetch_payload(&key).await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn invalid_submission_writes_nothing() {
        let store = InMemoryTaskStore::default();
        let submitter = submitter(&store, Arc::new(RandomKeyGenerator));

        let err = submitter
            .submit(&Submission::new(now().timestamp_millis() - 1, "late"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Validation(ValidationError::NotInFuture)));
        assert!(!err.is_retryable());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn same_time_and_message_twice_gives_two_tasks() {
        let store = InMemoryTaskStore::default();
        let submitter = submitter(&store, Arc::new(RandomKeyGenerator));
        let submission = Submission::new(now().timestamp_millis() + 1_000, "twice");

        let a = submitter.submit(&submission).await.unwrap();
        let b = submitter.submit(&submission).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn collision_is_reported_without_overwriting() {
        let store = InMemoryTaskStore::default();
        let submitter = submitter(&store, Arc::new(FixedSuffixGenerator::new(7)));
        let due = now() + chrono::Duration::seconds(1);

        let first = submitter.enqueue(due, "original").await.unwrap();
        let err = submitter.enqueue(due, "intruder").await.unwrap_err();

        match err {
            SubmitError::KeyAllocation { attempts, last_key } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_key, first);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            store.fetch_payload(&first).await.unwrap().as_deref(),
            Some("original")
        );
        assert_eq!(store.len().await, 1);
    }

    /// Hands out the given suffixes in order, then repeats the last one.
    struct ScriptedKeys(std::sync::Mutex<Vec<u128>>);

    impl KeyGenerator for ScriptedKeys {
        fn generate(&self, due_at_ms: i64) -> TaskKey {
            let mut suffixes = self.0.lock().unwrap();
            let suffix = if suffixes.len() > 1 {
                suffixes.remove(0)
            } else {
                suffixes[0]
            };
            TaskKey::new(due_at_ms, suffix)
        }
    }

    #[tokio::test]
    async fn collision_draws_a_new_key() {
        let store = InMemoryTaskStore::default();
        let due = now() + chrono::Duration::seconds(1);
        let taken = TaskKey::new(due.timestamp_millis(), 1);
        store.enqueue(&Task::with_key(taken, "first")).await.unwrap();

        let keys = ScriptedKeys(std::sync::Mutex::new(vec![1, 2]));
        let submitter = submitter(&store, Arc::new(keys));

        let key = submitter.enqueue(due, "second").await.unwrap();

        assert_eq!(key, TaskKey::new(due.timestamp_millis(), 2));
        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.fetch_payload(&taken).await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn store_errors_are_retryable() {
        let store = InMemoryTaskStore::default();
        store.inject_failures(1);
        let submitter = submitter(&store, Arc::new(RandomKeyGenerator));

        let err = submitter
            .submit(&Submission::new(now().timestamp_millis() + 1_000, "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Store(_)));
        assert!(err.is_retryable());
    }
}
