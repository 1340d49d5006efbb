//! KeyGenerator port - TaskKey 生成の抽象化
//!
//! KeyGenerator は複数プロセスが調整なしで衝突しないキーを作るための
//! インターフェースです。テストで衝突を強制できるように trait にしています。
//!
//! # 実装
//! - **RandomKeyGenerator**: 128-bit 乱数（本番用）
//! - **FixedSuffixGenerator**: 常に同じ suffix（衝突テスト用）

use crate::domain::TaskKey;

/// KeyGenerator は due time からキーを作る
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, due_at_ms: i64) -> TaskKey;
}

/// 128 bits of randomness per key.
///
/// At that width a collision at the same millisecond is not a practical
/// concern; the submit retry loop only guards against broken generators.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self, due_at_ms: i64) -> TaskKey {
        TaskKey::new(due_at_ms, rand::random())
    }
}

/// Always produces the same suffix, so two tasks with the same due time collide.
#[derive(Debug, Clone, Copy)]
pub struct FixedSuffixGenerator {
    suffix: u128,
}

impl FixedSuffixGenerator {
    pub fn new(suffix: u128) -> Self {
        Self { suffix }
    }
}

impl KeyGenerator for FixedSuffixGenerator {
    fn generate(&self, due_at_ms: i64) -> TaskKey {
        TaskKey::new(due_at_ms, self.suffix)
    }
}
