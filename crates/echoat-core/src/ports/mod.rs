//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（共有 KV ストア、配送先、時計など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 共有ストアが source of truth（正本）
//! - Scheduler はストアの通知の形に依存しない（「見直せ」という合図だけ）

pub mod clock;
pub mod delivery_sink;
pub mod key_generator;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery_sink::{Delivery, DeliverySink};
pub use self::key_generator::{FixedSuffixGenerator, KeyGenerator, RandomKeyGenerator};
pub use self::task_store::{
    ChangeEvent, ChangeFeed, ChangeNotifier, IndexStrategy, TaskStore, UnknownIndexStrategy,
};
