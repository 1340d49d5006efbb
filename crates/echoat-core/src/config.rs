//! Tunables for the scheduler and the submit path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause after a store error before recomputing again, so a failing store
    /// is not hammered in a tight loop.
    pub error_backoff_ms: u64,

    /// How many extra times a recompute is retried when the earliest task
    /// vanished between peek and fetch.
    pub stale_retries: u32,
}

impl SchedulerConfig {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            error_backoff_ms: 1_000,
            stale_retries: 1,
        }
    }
}

/// Submit-path tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    /// Insert attempts before giving up on finding a free key.
    pub max_attempts: u32,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
