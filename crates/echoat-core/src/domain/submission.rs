//! Submission - 投入リクエストと検証
//!
//! HTTP フォーム（すべて文字列）でも JSON（数値）でも受け取れるように、
//! `time` は数値と文字列の両方を許容します。

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::ValidationError;

/// Raw `{ time, message }` as it arrives at the boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub time: Option<RawTime>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Epoch milliseconds, either as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Millis(i64),
    /// Fractional JSON number; truncated like fractional text.
    Float(f64),
    Text(String),
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    pub due_at: DateTime<Utc>,
    pub message: String,
}

impl Submission {
    pub fn new(time_ms: i64, message: impl Into<String>) -> Self {
        Self {
            time: Some(RawTime::Millis(time_ms)),
            message: Some(message.into()),
        }
    }

    /// Check the input against `now`.
    ///
    /// The due time must be strictly after `now` and the message non-empty.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<AcceptedSubmission, ValidationError> {
        let due_at = match &self.time {
            Some(raw) => raw.to_datetime()?,
            None => return Err(ValidationError::InvalidTime("missing".to_string())),
        };
        if due_at <= now {
            return Err(ValidationError::NotInFuture);
        }

        let message = match &self.message {
            Some(message) if !message.is_empty() => message.clone(),
            _ => return Err(ValidationError::EmptyMessage),
        };

        Ok(AcceptedSubmission { due_at, message })
    }
}

impl RawTime {
    fn to_datetime(&self) -> Result<DateTime<Utc>, ValidationError> {
        let millis = match self {
            Self::Millis(ms) => *ms,
            Self::Float(ms) => {
                truncate_millis(*ms).ok_or_else(|| ValidationError::InvalidTime(ms.to_string()))?
            }
            Self::Text(text) => parse_millis(text)?,
        };
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| ValidationError::InvalidTime(format!("{millis} is out of range")))
    }
}

fn parse_millis(text: &str) -> Result<i64, ValidationError> {
    let trimmed = text.trim();
    if let Ok(ms) = trimmed.parse::<i64>() {
        return Ok(ms);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(truncate_millis)
        .ok_or_else(|| ValidationError::InvalidTime(format!("{text:?}")))
}

/// Fractional milliseconds are accepted and truncated.
fn truncate_millis(ms: f64) -> Option<i64> {
    (ms.is_finite() && ms.abs() < i64::MAX as f64).then(|| ms.trunc() as i64)
}
