use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::scheduler::Scheduler;
use super::status::SchedulerObserver;
use crate::config::SchedulerConfig;
use crate::ports::{Clock, DeliverySink, TaskStore};

/// Scheduler group handle.
/// - 全 Scheduler は同じ shutdown チャネルを見る
/// - `shutdown_and_join()` で全 Scheduler の終了を待てる
pub struct SchedulerGroup {
    shutdown_tx: watch::Sender<bool>,
    observers: Vec<SchedulerObserver>,
    joins: Vec<JoinHandle<()>>,
}

impl SchedulerGroup {
    /// Spawn `n` schedulers sharing one store and one sink.
    pub fn spawn(
        n: usize,
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let schedulers = (0..n)
            .map(|_| {
                Scheduler::new(
                    Arc::clone(&store),
                    Arc::clone(&sink),
                    Arc::clone(&clock),
                    config.clone(),
                )
            })
            .collect();
        Self::from_schedulers(schedulers)
    }

    /// Run already configured schedulers (e.g. one per simulated node).
    pub fn from_schedulers(schedulers: Vec<Scheduler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut observers = Vec::with_capacity(schedulers.len());
        let mut joins = Vec::with_capacity(schedulers.len());
        for scheduler in schedulers {
            observers.push(scheduler.observer());
            joins.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));
        }

        Self {
            shutdown_tx,
            observers,
            joins,
        }
    }

    pub fn observers(&self) -> &[SchedulerObserver] {
        &self.observers
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every scheduler to stop. In-flight claims still settle.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}
