//! Delivery sinks.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::SinkError;
use crate::ports::{Delivery, DeliverySink};

/// Prints the message on stdout, one line per delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl DeliverySink for StdoutSink {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), SinkError> {
        println!("{}", delivery.payload);
        Ok(())
    }
}

/// Keeps every delivery in memory.
///
/// With `failing()`, deliveries are still recorded but reported as failed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    notify: Notify,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    pub async fn payloads(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .map(|d| d.payload.clone())
            .collect()
    }

    /// Wait until at least `n` deliveries arrived, or `timeout` elapsed.
    /// Returns whatever was recorded at that point.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<Delivery> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            {
                let deliveries = self.deliveries.lock().await;
                if deliveries.len() >= n {
                    return deliveries.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.deliveries().await;
            }
        }
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), SinkError> {
        self.deliveries.lock().await.push(delivery.clone());
        self.notify.notify_waiters();
        if self.fail {
            return Err(SinkError::new(delivery.key, "sink configured to fail"));
        }
        Ok(())
    }
}
