//! Keyspace notification listener.
//!
//! 1 購読 = 1 専用接続（pub/sub 接続は他のコマンドに使えない）。
//! ストリームが切れたら backoff して再接続し、`Resubscribed` を送る。

use std::time::Duration;

use echoat_core::domain::StoreError;
use echoat_core::ports::{ChangeEvent, ChangeNotifier};
use futures::StreamExt;
use redis::aio::PubSub;
use tracing::{debug, info, warn};

pub(crate) async fn open(client: &redis::Client, pattern: &str) -> Result<PubSub, StoreError> {
    let conn = client
        .get_async_connection()
        .await
        .map_err(|e| StoreError::unavailable("subscribe", e))?;
    let mut pubsub = conn.into_pubsub();
    pubsub
        .psubscribe(pattern)
        .await
        .map_err(|e| StoreError::unavailable("subscribe", e))?;
    Ok(pubsub)
}

/// Forward notifications until the consumer drops its feed.
pub(crate) async fn forward(
    client: redis::Client,
    pattern: String,
    backoff: Duration,
    notifier: ChangeNotifier,
    mut pubsub: PubSub,
) {
    loop {
        if !pump(&mut pubsub, &notifier).await {
            debug!(pattern = %pattern, "change feed dropped; unsubscribing");
            return;
        }
        warn!(pattern = %pattern, "keyspace subscription lost");

        pubsub = loop {
            tokio::select! {
                () = notifier.closed() => return,
                () = tokio::time::sleep(backoff) => {}
            }
            match open(&client, &pattern).await {
                Ok(fresh) => break fresh,
                Err(err) => warn!(pattern = %pattern, error = %err, "resubscribe failed"),
            }
        };

        info!(pattern = %pattern, "keyspace subscription re-established");
        if !notifier.notify(ChangeEvent::Resubscribed) {
            return;
        }
    }
}

/// Returns `false` when the consumer is gone, `true` when the stream ended.
async fn pump(pubsub: &mut PubSub, notifier: &ChangeNotifier) -> bool {
    let mut messages = std::pin::pin!(pubsub.on_message());
    loop {
        tokio::select! {
            () = notifier.closed() => return false,
            msg = messages.next() => {
                let Some(msg) = msg else {
                    return true;
                };
                let op: String = msg.get_payload().unwrap_or_default();
                debug!(channel = msg.get_channel_name(), op = %op, "tasks list changed");
                if !notifier.notify(ChangeEvent::Changed) {
                    return false;
                }
            }
        }
    }
}
