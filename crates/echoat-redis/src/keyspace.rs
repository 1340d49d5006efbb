//! `notify-keyspace-events` の確認と設定
//!
//! フィードが動くには `K`（keyspace チャンネル）と、`SET` / `DEL` のイベント
//! （`$` と `g`、どちらも `A` に含まれる）が必要です。足りないまま起動すると
//! 通知が一切届かず、Scheduler は新しいタスクに気づけません。

use echoat_core::domain::StoreError;
use redis::aio::ConnectionManager;
use tracing::{error, info, warn};

const PARAMETER: &str = "notify-keyspace-events";

/// Flags from `K$g` that `current` does not already enable.
pub(crate) fn missing_flags(current: &str) -> String {
    let all_events = current.contains('A');
    ['K', '$', 'g']
        .into_iter()
        .filter(|flag| !current.contains(*flag) && (*flag == 'K' || !all_events))
        .collect()
}

/// Check the server setting and, when `configure` is set, add what is missing
/// while keeping the flags already enabled.
///
/// A server that refuses `CONFIG` is assumed to be configured out of band.
pub(crate) async fn ensure(
    conn: &mut ConnectionManager,
    configure: bool,
) -> Result<(), StoreError> {
    let reply: Result<Vec<String>, _> = redis::cmd("CONFIG")
        .arg("GET")
        .arg(PARAMETER)
        .query_async(conn)
        .await;
    let current = match reply {
        Ok(pair) => pair.get(1).cloned().unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "cannot read {PARAMETER}; assuming it is configured");
            return Ok(());
        }
    };

    let missing = missing_flags(&current);
    if missing.is_empty() {
        return Ok(());
    }

    if !configure {
        error!(
            current = %current,
            missing = %missing,
            "keyspace notifications are not enabled"
        );
        return Err(StoreError::unavailable(
            "check keyspace events",
            format!("{PARAMETER} is {current:?}, needs {missing:?} (or pass configure_keyspace_events)"),
        ));
    }

    let merged = format!("{current}{missing}");
    redis::cmd("CONFIG")
        .arg("SET")
        .arg(PARAMETER)
        .arg(&merged)
        .query_async::<_, ()>(conn)
        .await
        .map_err(|e| StoreError::unavailable("configure keyspace events", e))?;
    info!(previous = %current, now = %merged, "enabled keyspace notifications");
    Ok(())
}
