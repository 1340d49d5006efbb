//! Task identity.
//!
//! # キーの形式
//! `TaskKey` は `{due_at_ms}:{suffix}` という文字列で保存されます。
//! - `due_at_ms`: 配送時刻（Unix epoch ミリ秒）
//! - `suffix`: 128-bit の乱数（32 桁の 16 進数、固定幅）
//!
//! ## 並び順
//! `(due_at_ms, suffix)` の辞書順。同じ時刻のタスクは suffix の大小で決まり、
//! これは保存される文字列の辞書順と一致します（suffix が固定幅のため）。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Width of the hex-encoded random suffix.
const SUFFIX_HEX_LEN: usize = 32;

/// Unique identifier of a pending task.
///
/// Field order matters: the derived `Ord` sorts by due time first, then by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    due_at_ms: i64,
    suffix: u128,
}

/// Returned when a stored key does not have the `{due_at_ms}:{suffix}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed task key `{raw}`: {reason}")]
pub struct KeyParseError {
    raw: String,
    reason: &'static str,
}

impl KeyParseError {
    fn new(raw: &str, reason: &'static str) -> Self {
        Self {
            raw: raw.to_string(),
            reason,
        }
    }
}

impl TaskKey {
    pub fn new(due_at_ms: i64, suffix: u128) -> Self {
        Self { due_at_ms, suffix }
    }

    pub fn due_at_ms(&self) -> i64 {
        self.due_at_ms
    }

    /// Due time as a UTC timestamp.
    ///
    /// Keys are only built from validated timestamps or parsed with a range
    /// check, so the epoch fallback is unreachable in practice.
    pub fn due_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.due_at_ms).unwrap_or_default()
    }

    pub fn suffix(&self) -> u128 {
        self.suffix
    }

    /// Same due time, fresh suffix.
    pub fn with_suffix(self, suffix: u128) -> Self {
        Self { suffix, ..self }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:0width$x}", self.due_at_ms, self.suffix, width = SUFFIX_HEX_LEN)
    }
}

impl FromStr for TaskKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (due, suffix) = s
            .split_once(':')
            .ok_or_else(|| KeyParseError::new(s, "missing `:` separator"))?;

        let due_at_ms: i64 = due
            .parse()
            .map_err(|_| KeyParseError::new(s, "due time is not an integer"))?;
        if DateTime::from_timestamp_millis(due_at_ms).is_none() {
            return Err(KeyParseError::new(s, "due time out of range"));
        }

        if suffix.len() != SUFFIX_HEX_LEN {
            return Err(KeyParseError::new(s, "suffix must be 32 hex digits"));
        }
        let suffix = u128::from_str_radix(suffix, 16)
            .map_err(|_| KeyParseError::new(s, "suffix is not hexadecimal"))?;

        Ok(Self { due_at_ms, suffix })
    }
}

impl Serialize for TaskKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn display_is_fixed_width() {
        let key = TaskKey::new(1_700_000_000_000, 0xab);
        assert_eq!(
            key.to_string(),
            "1700000000000:000000000000000000000000000000ab"
        );
    }

    #[test]
    fn parses_its_own_rendering() {
        let key = TaskKey::new(1_700_000_000_123, u128::MAX - 7);
        let parsed: TaskKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.due_at().timestamp_millis(), 1_700_000_000_123);
    }

    #[rstest]
    #[case("index")]
    #[case("abc:000000000000000000000000000000ab")]
    #[case("1700000000000:ab")]
    #[case("1700000000000:zz0000000000000000000000000000ab")]
    #[case("99999999999999999:000000000000000000000000000000ab")]
    fn rejects_malformed_keys(#[case] raw: &str) {
        assert!(raw.parse::<TaskKey>().is_err());
    }

    #[test]
    fn orders_by_due_time_then_suffix() {
        let early = TaskKey::new(1_000, u128::MAX);
        let late_low = TaskKey::new(2_000, 1);
        let late_high = TaskKey::new(2_000, 2);

        assert!(early < late_low);
        assert!(late_low < late_high);
    }

    #[test]
    fn equal_due_times_match_string_order() {
        let a = TaskKey::new(5_000, 0x0f);
        let b = TaskKey::new(5_000, 0xf0);
        assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
    }

    #[test]
    fn serializes_as_string() {
        let key = TaskKey::new(42, 1);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"42:00000000000000000000000000000001\"");
        let back: TaskKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
