//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Submitter**: 入力検証とタスク登録（キー衝突時のリトライ）
//! - **Scheduler**: 最も早いタスクを見張り、期限に claim して配送する
//! - **SchedulerGroup**: 複数 Scheduler の起動と停止
//! - **SchedulerObserver**: 実行中の Scheduler の状態と統計

pub mod group;
pub mod scheduler;
pub mod status;
pub mod submitter;
mod timer;

// 主要な型を再エクスポート
pub use self::group::SchedulerGroup;
pub use self::scheduler::Scheduler;
pub use self::status::{SchedulerObserver, SchedulerStats, SchedulerStatus};
pub use self::submitter::Submitter;
