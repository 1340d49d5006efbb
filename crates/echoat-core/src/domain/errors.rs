//! Errors - エラー型と分類
//!
//! - `ValidationError`: 入力不正（境界で拒否、コアには届かない）
//! - `StoreError`: 共有ストアの I/O 障害（「タスクなし」とは絶対に混同しない）
//! - `SubmitError`: 投入時のエラー（validation / key 割り当て / store）
//! - `SinkError`: 配送先の失敗（ログのみ、リトライしない）

use thiserror::Error;

use super::TaskKey;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: インフラエラー（ストアの障害）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Bad submission input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("time is missing or not a valid epoch-millis timestamp: {0}")]
    InvalidTime(String),

    #[error("time must be in the future")]
    NotInFuture,

    #[error("no message provided")]
    EmptyMessage,
}

/// Failure talking to the shared store.
///
/// A store error means "we could not find out", never "there is nothing there".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable during {op}: {message}")]
    Unavailable { op: &'static str, message: String },

    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            op,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::Infrastructure,
            Self::Corrupt(_) => ErrorKind::Permanent,
        }
    }
}

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not allocate a unique task identifier after {attempts} attempts (last key {last_key})")]
    KeyAllocation { attempts: u32, last_key: TaskKey },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Permanent,
            Self::KeyAllocation { .. } => ErrorKind::Transient,
            Self::Store(err) => err.kind(),
        }
    }

    /// Whether the submitter should try again later with the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::KeyAllocation { .. } | Self::Store(_) => true,
        }
    }
}

/// A delivery sink could not hand the message over.
#[derive(Debug, Error)]
#[error("delivery of {key} failed: {message}")]
pub struct SinkError {
    pub key: TaskKey,
    pub message: String,
}

impl SinkError {
    pub fn new(key: TaskKey, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}
