//! Redis key names for one namespace.

use echoat_core::domain::TaskKey;

/// Builds and parses the Redis keys used under a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    namespace: String,
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `{ns}:{due_at_ms}:{suffix}`, holding the message.
    pub fn payload_key(&self, key: &TaskKey) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// `{ns}:index`, the ZSET of pending keys.
    pub fn index_key(&self) -> String {
        format!("{}:index", self.namespace)
    }

    /// `SCAN MATCH` pattern for every key in the namespace.
    pub fn scan_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    /// Pattern for keyspace notification channels of this namespace.
    pub fn keyspace_pattern(&self, db: Option<u32>) -> String {
        match db {
            Some(db) => format!("__keyspace@{db}__:{}:*", self.namespace),
            None => format!("__keyspace@*__:{}:*", self.namespace),
        }
    }

    /// The task key inside a payload key, or `None` for anything else in the
    /// namespace (the index, foreign keys).
    pub fn parse_payload_key(&self, full: &str) -> Option<TaskKey> {
        full.strip_prefix(self.namespace.as_str())?
            .strip_prefix(':')?
            .parse()
            .ok()
    }
}
