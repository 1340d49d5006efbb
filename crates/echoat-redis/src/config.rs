use std::time::Duration;

use echoat_core::ports::IndexStrategy;
use serde::{Deserialize, Serialize};

/// Connection and layout settings for `RedisTaskStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    pub url: String,

    /// Key prefix shared by every node that should see the same tasks.
    pub namespace: String,

    /// Logical database. `None` keeps whatever the URL selects and listens for
    /// notifications from any database.
    pub db: Option<u32>,

    pub index: IndexStrategy,

    /// Add missing `notify-keyspace-events` flags on connect instead of
    /// refusing to start. Managed Redis offerings often forbid `CONFIG`, so
    /// this is off by default.
    pub configure_keyspace_events: bool,

    /// Wait between attempts to re-establish a lost notification subscription.
    pub resubscribe_backoff_ms: u64,
}

impl RedisStoreConfig {
    pub fn resubscribe_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_backoff_ms)
    }
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "tasks".to_string(),
            db: None,
            index: IndexStrategy::default(),
            configure_keyspace_events: false,
            resubscribe_backoff_ms: 1_000,
        }
    }
}
