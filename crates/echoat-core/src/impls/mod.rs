//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: 単一プロセス用・テスト用の正本
//! - **StdoutSink**: メッセージを標準出力に書く
//! - **RecordingSink**: テスト用の配送先
//!
//! # 本番用実装
//! 共有ストアの実装は別クレートに配置します：
//! - `echoat-redis`: RedisTaskStore

pub mod inmem_store;
pub mod sinks;

// 主要な型を再エクスポート
pub use self::inmem_store::{InMemoryTaskStore, OrderedTaskIndex, ScanIndex, SortedIndex};
pub use self::sinks::{RecordingSink, StdoutSink};
