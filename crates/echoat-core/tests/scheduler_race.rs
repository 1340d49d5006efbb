//! Several schedulers sharing one store: every task is delivered exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use echoat_core::app::{SchedulerGroup, Submitter};
use echoat_core::config::{SchedulerConfig, SubmitConfig};
use echoat_core::impls::{InMemoryTaskStore, RecordingSink};
use echoat_core::ports::{IndexStrategy, RandomKeyGenerator, SystemClock};
use rstest::rstest;

const WAIT: Duration = Duration::from_secs(10);

fn group(store: &InMemoryTaskStore, sink: &Arc<RecordingSink>, n: usize) -> SchedulerGroup {
    SchedulerGroup::spawn(
        n,
        Arc::new(store.clone()),
        sink.clone(),
        Arc::new(SystemClock),
        SchedulerConfig {
            error_backoff_ms: 20,
            stale_retries: 1,
        },
    )
}

fn submitter(store: &InMemoryTaskStore) -> Submitter {
    Submitter::new(
        Arc::new(store.clone()),
        Arc::new(RandomKeyGenerator),
        Arc::new(SystemClock),
        SubmitConfig::default(),
    )
}

#[rstest]
#[case(IndexStrategy::SortedIndex)]
#[case(IndexStrategy::FullScan)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_schedulers_deliver_each_task_once(#[case] strategy: IndexStrategy) {
    let store = InMemoryTaskStore::new(strategy);
    let sink = Arc::new(RecordingSink::new());
    let group = group(&store, &sink, 5);
    let submitter = submitter(&store);

    let base = Utc::now() + chrono::Duration::milliseconds(200);
    for i in 0..20 {
        // Pairs share a due time so some keys tie on milliseconds.
        let due = base + chrono::Duration::milliseconds((i / 2) * 15);
        submitter.enqueue(due, format!("msg-{i}")).await.unwrap();
    }

    sink.wait_for(20, WAIT).await;
    // Give any duplicate a chance to show up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let deliveries = sink.deliveries().await;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for d in &deliveries {
        *counts.entry(d.payload.clone()).or_default() += 1;
    }
    assert_eq!(counts.len(), 20);
    assert!(counts.values().all(|&c| c == 1), "duplicates: {counts:?}");
    assert!(store.is_empty().await);

    let claimed: u64 = group.observers().iter().map(|o| o.stats().claimed).sum();
    assert_eq!(claimed, 20);

    group.shutdown_and_join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_then_b_across_two_nodes() {
    let store = InMemoryTaskStore::default();
    let sink = Arc::new(RecordingSink::new());
    let group = group(&store, &sink, 2);
    let submitter = submitter(&store);

    let now = Utc::now();
    submitter
        .enqueue(now + chrono::Duration::milliseconds(400), "B")
        .await
        .unwrap();
    submitter
        .enqueue(now + chrono::Duration::milliseconds(150), "A")
        .await
        .unwrap();

    let deliveries = sink.wait_for(2, WAIT).await;
    let payloads: Vec<_> = deliveries.iter().map(|d| d.payload.as_str()).collect();
    assert_eq!(payloads, vec!["A", "B"]);
    for d in &deliveries {
        assert!(d.due_at <= Utc::now());
    }

    // Every node ends up idle once the store is empty.
    for observer in group.observers() {
        let mut observer = observer.clone();
        assert!(observer.wait_for(WAIT, |s| s.is_idle()).await.is_some());
    }
    let lost: u64 = group.observers().iter().map(|o| o.stats().lost_races).sum();
    let claimed: u64 = group.observers().iter().map(|o| o.stats().claimed).sum();
    assert_eq!(claimed, 2);
    // Both nodes armed both tasks, so the loser of each race records it
    // (unless it was still recomputing when the winner claimed).
    assert!(lost <= 2);

    group.shutdown_and_join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_queued_while_nodes_idle_is_picked_up() {
    let store = InMemoryTaskStore::default();
    let sink = Arc::new(RecordingSink::new());
    let group = group(&store, &sink, 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.deliveries().await.is_empty());

    submitter(&store)
        .enqueue(Utc::now() + chrono::Duration::milliseconds(50), "wake up")
        .await
        .unwrap();

    let deliveries = sink.wait_for(1, WAIT).await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].payload, "wake up");

    group.shutdown_and_join().await;
}
