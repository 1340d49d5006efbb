//! Scheduler - 最も早いタスクにタイマーを張り、期限が来たら claim して配送する
//!
//! # 状態遷移
//! - start / 変更通知 → recompute: タイマー解除 → peek_earliest → fetch_payload → Armed or Idle
//! - Armed → タイマー発火 → Firing → claim
//!   - true: 配送（fire-and-forget）→ recompute
//!   - false: 他のワーカーが先に処理した → recompute（再配送しない）
//!   - Err: ログ → backoff → recompute
//!
//! # 並行性
//! - 1 Scheduler につき 1 ループ。recompute と claim は常に直列で、同時に 2 つ走らない
//! - Firing 中に来た変更通知はフィードに溜まり、終わった後にまとめて 1 回の recompute になる
//! - プロセス間の排他は claim（アトミック削除）だけ。ロックもリーダー選出もしない
//!
//! # 失われる配送
//! claim に成功した直後、配送が終わる前にプロセスが落ちると、そのメッセージは
//! 失われます（claim の時点でストアから消えている）。これは受け入れ済みの
//! トレードオフで、at-least-once の仕組みはありません。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use super::status::{Counter, SchedulerObserver, SchedulerStatus, StatsRecorder};
use super::timer::Timer;
use crate::config::SchedulerConfig;
use crate::domain::{StoreError, Task};
use crate::ports::{ChangeEvent, ChangeFeed, Clock, Delivery, DeliverySink, TaskStore};

/// Internal state; the public mirror is `SchedulerStatus`.
#[derive(Debug, Default)]
enum SchedulerState {
    #[default]
    Idle,
    Armed(Task),
    Firing(Task),
}

impl SchedulerState {
    fn status(&self) -> SchedulerStatus {
        match self {
            Self::Idle => SchedulerStatus::Idle,
            Self::Armed(task) => SchedulerStatus::Armed {
                key: task.key(),
                due_at: task.due_at(),
            },
            Self::Firing(task) => SchedulerStatus::Firing { key: task.key() },
        }
    }
}

/// What woke the loop up.
enum Wake {
    Shutdown,
    Feed(Option<ChangeEvent>),
    TimerFired,
}

/// One worker's scheduling loop.
///
/// Construct with injected store, sink and clock, then `run` it on a tokio task.
/// Several schedulers may share one store, in one process or across many.
pub struct Scheduler {
    name: Arc<str>,
    store: Arc<dyn TaskStore>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    state: SchedulerState,
    timer: Timer,
    status_tx: watch::Sender<SchedulerStatus>,
    stats: Arc<StatsRecorder>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(SchedulerStatus::Idle);
        Self {
            name: format!("scheduler-{}", Ulid::new()).into(),
            store,
            sink,
            clock,
            config,
            state: SchedulerState::Idle,
            timer: Timer::default(),
            status_tx,
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Replace the generated instance name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into().into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observer(&self) -> SchedulerObserver {
        SchedulerObserver::new(
            Arc::clone(&self.name),
            self.status_tx.subscribe(),
            Arc::clone(&self.stats),
        )
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// An in-flight claim always settles before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scheduler = %self.name,
            index = %self.store.index_strategy(),
            "scheduler started"
        );

        let Some(mut feed) = self.subscribe(&mut shutdown).await else {
            info!(scheduler = %self.name, "scheduler stopped before subscribing");
            return;
        };

        let mut needs_recompute = true;
        loop {
            if *shutdown.borrow() {
                break;
            }

            if needs_recompute {
                // Anything already buffered is covered by the recompute below.
                feed.drain();
                if let Err(err) = self.recompute().await {
                    self.stats.incr(Counter::StoreError);
                    error!(scheduler = %self.name, error = %err, "recompute failed; backing off");
                    if self.pause(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
                needs_recompute = false;
            }

            let wake = tokio::select! {
                changed = shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => Wake::Shutdown,
                },
                event = feed.next() => Wake::Feed(event),
                () = self.timer.fired() => Wake::TimerFired,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Feed(Some(event)) => {
                    let coalesced = feed.drain();
                    debug!(scheduler = %self.name, ?event, coalesced, "tasks list changed");
                    needs_recompute = true;
                }
                Wake::Feed(None) => {
                    warn!(scheduler = %self.name, "change feed closed; resubscribing");
                    match self.subscribe(&mut shutdown).await {
                        Some(fresh) => feed = fresh,
                        None => break,
                    }
                    needs_recompute = true;
                }
                Wake::TimerFired => {
                    self.fire(&mut shutdown).await;
                    needs_recompute = true;
                }
            }
        }

        self.timer.disarm();
        self.transition(SchedulerState::Idle);
        info!(scheduler = %self.name, "scheduler stopped");
    }

    /// Re-derive the earliest task from the store and arm the timer for it.
    async fn recompute(&mut self) -> Result<(), StoreError> {
        self.timer.disarm();
        self.transition(SchedulerState::Idle);
        self.stats.incr(Counter::Recompute);

        for attempt in 0..=self.config.stale_retries {
            let Some(key) = self.store.peek_earliest().await? else {
                debug!(scheduler = %self.name, "no tasks to watch for");
                return Ok(());
            };

            let Some(payload) = self.store.fetch_payload(&key).await? else {
                // Claimed by a peer between peek and fetch. Another task may
                // still be pending behind it.
                self.stats.incr(Counter::StalePeek);
                warn!(scheduler = %self.name, key = %key, attempt, "earliest task already removed");
                continue;
            };

            let task = Task::with_key(key, payload);
            let delay = delay_until(task.due_at(), self.clock.now());
            self.timer.arm(delay);
            info!(
                scheduler = %self.name,
                key = %key,
                due_at = %task.due_at(),
                delay_ms = delay.as_millis() as u64,
                "watching for task"
            );
            self.transition(SchedulerState::Armed(task));
            return Ok(());
        }

        debug!(scheduler = %self.name, "no tasks to watch for, last one removed");
        Ok(())
    }

    /// The armed timer elapsed: race for the claim.
    async fn fire(&mut self, shutdown: &mut watch::Receiver<bool>) {
        let SchedulerState::Armed(task) = std::mem::take(&mut self.state) else {
            return;
        };
        self.transition(SchedulerState::Firing(task.clone()));
        let key = task.key();

        match self.store.claim(&key).await {
            Ok(true) => {
                self.stats.incr(Counter::Claimed);
                info!(scheduler = %self.name, key = %key, "claimed task");
                self.deliver(task);
                self.transition(SchedulerState::Idle);
            }
            Ok(false) => {
                self.stats.incr(Counter::LostRace);
                warn!(scheduler = %self.name, key = %key, "task already handled by another worker");
                self.transition(SchedulerState::Idle);
            }
            Err(err) => {
                self.stats.incr(Counter::StoreError);
                error!(scheduler = %self.name, key = %key, error = %err, "claim failed; backing off");
                self.transition(SchedulerState::Idle);
                // Shutdown is re-checked at the top of the loop.
                self.pause(shutdown).await;
            }
        }
    }

    /// Hand the payload to the sink without waiting for it.
    fn deliver(&self, task: Task) {
        let sink = Arc::clone(&self.sink);
        let stats = Arc::clone(&self.stats);
        let name = Arc::clone(&self.name);
        let delivery = Delivery::from(task);

        tokio::spawn(async move {
            if let Err(err) = sink.deliver(&delivery).await {
                stats.incr(Counter::DeliveryFailure);
                error!(
                    scheduler = %name,
                    key = %delivery.key,
                    error = %err,
                    "delivery failed; message is lost"
                );
            }
        });
    }

    /// Keep trying to open a change feed. `None` means shutdown was requested.
    async fn subscribe(&self, shutdown: &mut watch::Receiver<bool>) -> Option<ChangeFeed> {
        loop {
            match self.store.subscribe().await {
                Ok(feed) => return Some(feed),
                Err(err) => {
                    self.stats.incr(Counter::StoreError);
                    error!(scheduler = %self.name, error = %err, "subscribe failed; backing off");
                    if self.pause(shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep for the error backoff. Returns `true` if shutdown was requested meanwhile.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return true;
        }
        tokio::select! {
            () = tokio::time::sleep(self.config.error_backoff()) => *shutdown.borrow(),
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        self.status_tx.send_replace(next.status());
        self.state = next;
    }
}

/// Time left until `due_at`; zero when it already passed.
fn delay_until(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (due_at - now).to_std().unwrap_or(Duration::ZERO)
}
