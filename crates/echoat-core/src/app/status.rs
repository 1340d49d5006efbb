//! Status - Scheduler の状態と統計
//!
//! Scheduler は自分の状態を watch チャネルで公開し、統計は atomics で数えます。
//! `SchedulerObserver` を clone すれば、実行中の Scheduler を外から観察できます。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::TaskKey;

/// Externally visible scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerStatus {
    /// No task armed (store empty, or not started yet).
    Idle,

    /// A timer is running for `key`.
    Armed { key: TaskKey, due_at: DateTime<Utc> },

    /// The timer fired and a claim for `key` is in flight.
    Firing { key: TaskKey },
}

impl SchedulerStatus {
    pub fn armed_key(&self) -> Option<TaskKey> {
        match self {
            Self::Armed { key, .. } => Some(*key),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Counters for one scheduler instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub recomputes: u64,
    /// Claims this scheduler won.
    pub claimed: u64,
    /// Claims a peer won first.
    pub lost_races: u64,
    /// Earliest key was gone by the time its payload was fetched.
    pub stale_peeks: u64,
    pub store_errors: u64,
    pub delivery_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    recomputes: AtomicU64,
    claimed: AtomicU64,
    lost_races: AtomicU64,
    stale_peeks: AtomicU64,
    store_errors: AtomicU64,
    delivery_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Recompute,
    Claimed,
    LostRace,
    StalePeek,
    StoreError,
    DeliveryFailure,
}

impl StatsRecorder {
    pub(crate) fn incr(&self, counter: Counter) {
        let cell = match counter {
            Counter::Recompute => &self.recomputes,
            Counter::Claimed => &self.claimed,
            Counter::LostRace => &self.lost_races,
            Counter::StalePeek => &self.stale_peeks,
            Counter::StoreError => &self.store_errors,
            Counter::DeliveryFailure => &self.delivery_failures,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            recomputes: self.recomputes.load(Ordering::Relaxed),
            claimed: self.claimed.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
            stale_peeks: self.stale_peeks.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerObserver {
    name: Arc<str>,
    status: watch::Receiver<SchedulerStatus>,
    stats: Arc<StatsRecorder>,
}

impl SchedulerObserver {
    pub(crate) fn new(
        name: Arc<str>,
        status: watch::Receiver<SchedulerStatus>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            name,
            status,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }

    /// Wait until the status satisfies `pred`. Returns the matching status, or
    /// `None` on timeout or if the scheduler was dropped.
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut pred: F) -> Option<SchedulerStatus>
    where
        F: FnMut(&SchedulerStatus) -> bool,
    {
        let waited = tokio::time::timeout(timeout, self.status.wait_for(|s| pred(s))).await;
        match waited {
            Ok(Ok(status)) => Some((*status).clone()),
            _ => None,
        }
    }
}
