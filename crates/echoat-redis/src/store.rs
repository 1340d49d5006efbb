//! RedisTaskStore - 共有 Redis 上の TaskStore
//!
//! # アトミック性
//! - enqueue: `SET NX`（sorted の場合は Lua で `SET NX` + `ZADD` を一括）
//! - claim: `DEL`（sorted の場合は Lua で `DEL` + `ZREM` を一括）。`DEL` が 1 を返した
//!   ノードだけが配送する
//!
//! コマンド用の接続は `ConnectionManager`（自動再接続）、変更通知は専用の pub/sub 接続。

use async_trait::async_trait;
use echoat_core::domain::{StoreError, Task, TaskKey};
use echoat_core::ports::{ChangeFeed, IndexStrategy, TaskStore};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo, RedisError, Script};
use tracing::{debug, info, warn};

use crate::config::RedisStoreConfig;
use crate::feed;
use crate::keyspace;
use crate::layout::KeyLayout;

/// KEYS[1] = payload key, KEYS[2] = index; ARGV = payload, score, member.
const ENQUEUE_SORTED: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
  redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
  return 1
end
return 0
";

/// KEYS[1] = payload key, KEYS[2] = index; ARGV[1] = member.
const CLAIM_SORTED: &str = r"
local removed = redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
return removed
";

const SCAN_BATCH: usize = 500;

fn unavailable(op: &'static str) -> impl FnOnce(RedisError) -> StoreError {
    move |err| StoreError::unavailable(op, err)
}

pub struct RedisTaskStore {
    client: redis::Client,
    conn: ConnectionManager,
    layout: KeyLayout,
    config: RedisStoreConfig,
    enqueue_sorted: Script,
    claim_sorted: Script,
}

impl RedisTaskStore {
    /// Connect and make sure keyspace notifications reach the feed.
    ///
    /// Fails when the server has them disabled, unless
    /// `configure_keyspace_events` allows turning them on here.
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, StoreError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(unavailable("connect"))?;
        if let Some(db) = config.db {
            info.redis.db = i64::from(db);
        }

        let client = redis::Client::open(info).map_err(unavailable("connect"))?;
        let mut conn = ConnectionManager::new(client.clone())
            .await
            .map_err(unavailable("connect"))?;

        keyspace::ensure(&mut conn, config.configure_keyspace_events).await?;

        info!(
            namespace = %config.namespace,
            index = %config.index,
            "connected to redis"
        );

        Ok(Self {
            client,
            conn,
            layout: KeyLayout::new(config.namespace.clone()),
            config,
            enqueue_sorted: Script::new(ENQUEUE_SORTED),
            claim_sorted: Script::new(CLAIM_SORTED),
        })
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    async fn earliest_from_index(&self) -> Result<Option<TaskKey>, StoreError> {
        let mut conn = self.conn.clone();
        let index = self.layout.index_key();

        loop {
            let members: Vec<String> = conn
                .zrange(&index, 0, 0)
                .await
                .map_err(unavailable("peek_earliest"))?;
            let Some(member) = members.into_iter().next() else {
                return Ok(None);
            };

            match member.parse::<TaskKey>() {
                Ok(key) => return Ok(Some(key)),
                Err(err) => {
                    // Nothing can ever claim it; left in place it hides every later task.
                    warn!(member = %member, error = %err, "dropping unparsable index entry");
                    let _: i64 = conn
                        .zrem(&index, &member)
                        .await
                        .map_err(unavailable("peek_earliest"))?;
                }
            }
        }
    }

    async fn earliest_from_scan(&self) -> Result<Option<TaskKey>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = self.layout.scan_pattern();
        let mut cursor: u64 = 0;
        let mut earliest: Option<TaskKey> = None;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable("peek_earliest"))?;

            earliest = keys
                .iter()
                .filter_map(|full| self.layout.parse_payload_key(full))
                .chain(earliest)
                .min();

            if next == 0 {
                return Ok(earliest);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn enqueue(&self, task: &Task) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let key = task.key();
        let payload_key = self.layout.payload_key(&key);

        match self.config.index {
            IndexStrategy::SortedIndex => {
                let inserted: i64 = self
                    .enqueue_sorted
                    .key(payload_key)
                    .key(self.layout.index_key())
                    .arg(task.payload())
                    .arg(key.due_at_ms())
                    .arg(key.to_string())
                    .invoke_async(&mut conn)
                    .await
                    .map_err(unavailable("enqueue"))?;
                Ok(inserted == 1)
            }
            IndexStrategy::FullScan => conn
                .set_nx(payload_key, task.payload())
                .await
                .map_err(unavailable("enqueue")),
        }
    }

    async fn peek_earliest(&self) -> Result<Option<TaskKey>, StoreError> {
        match self.config.index {
            IndexStrategy::SortedIndex => self.earliest_from_index().await,
            IndexStrategy::FullScan => self.earliest_from_scan().await,
        }
    }

    async fn fetch_payload(&self, key: &TaskKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(self.layout.payload_key(key))
            .await
            .map_err(unavailable("fetch_payload"))?;

        if payload.is_none() && self.config.index == IndexStrategy::SortedIndex {
            // Enqueue and claim keep payload and index in step, so a member
            // without a payload was removed behind our back. Drop it so it
            // cannot shadow later tasks.
            let pruned: i64 = conn
                .zrem(self.layout.index_key(), key.to_string())
                .await
                .map_err(unavailable("fetch_payload"))?;
            if pruned > 0 {
                debug!(key = %key, "pruned orphaned index entry");
            }
        }
        Ok(payload)
    }

    async fn claim(&self, key: &TaskKey) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let payload_key = self.layout.payload_key(key);

        let removed: i64 = match self.config.index {
            IndexStrategy::SortedIndex => self
                .claim_sorted
                .key(payload_key)
                .key(self.layout.index_key())
                .arg(key.to_string())
                .invoke_async(&mut conn)
                .await
                .map_err(unavailable("claim"))?,
            IndexStrategy::FullScan => conn.del(payload_key).await.map_err(unavailable("claim"))?,
        };
        Ok(removed > 0)
    }

    async fn subscribe(&self) -> Result<ChangeFeed, StoreError> {
        let pattern = self.layout.keyspace_pattern(self.config.db);
        let pubsub = feed::open(&self.client, &pattern).await?;
        debug!(pattern = %pattern, "subscribed to keyspace notifications");

        let (notifier, change_feed) = ChangeFeed::channel();
        tokio::spawn(feed::forward(
            self.client.clone(),
            pattern,
            self.config.resubscribe_backoff(),
            notifier,
            pubsub,
        ));
        Ok(change_feed)
    }

    fn index_strategy(&self) -> IndexStrategy {
        self.config.index
    }
}
