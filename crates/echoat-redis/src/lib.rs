//! echoat-redis
//!
//! Redis implementation of the `TaskStore` port.
//!
//! # キー構成（namespace = `tasks` の場合）
//! - `tasks:{due_at_ms}:{suffix}` → メッセージ本文（String）
//! - `tasks:index` → ZSET（score = due_at_ms, member = `{due_at_ms}:{suffix}`）。
//!   `IndexStrategy::SortedIndex` のときだけ使う
//!
//! 変更通知は keyspace notifications（`__keyspace@{db}__:tasks:*`）を購読します。
//! 接続時に `notify-keyspace-events` を確認し、足りなければエラーにします
//! （`configure_keyspace_events` なら既存のフラグを残したまま足します）。

pub mod config;
mod feed;
mod keyspace;
pub mod layout;
pub mod store;

pub use self::config::RedisStoreConfig;
pub use self::layout::KeyLayout;
pub use self::store::RedisTaskStore;
