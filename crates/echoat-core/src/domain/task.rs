use chrono::{DateTime, Utc};

use super::TaskKey;
use crate::ports::KeyGenerator;

/// A pending delivery: due time + payload under a unique key.
///
/// The due time lives inside the key, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    key: TaskKey,
    payload: String,
}

impl Task {
    /// Build a task with a freshly generated key.
    pub fn new(due_at: DateTime<Utc>, payload: impl Into<String>, keys: &dyn KeyGenerator) -> Self {
        Self {
            key: keys.generate(due_at.timestamp_millis()),
            payload: payload.into(),
        }
    }

    /// Rebuild a task read back from the store.
    pub fn with_key(key: TaskKey, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
        }
    }

    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.key.due_at()
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Draw a new key for the same due time (after an insert collision).
    pub fn regenerate_key(&mut self, keys: &dyn KeyGenerator) {
        self.key = keys.generate(self.key.due_at_ms());
    }
}
