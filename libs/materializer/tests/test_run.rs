use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{GROUP, committed_total, fixture, materializer, materializer_with, publish, wait_until};
use firehose_api::Reading;
use materializer::{MaterializerOptions, spawn_materializer};

mod common;

#[tokio::test]
async fn loop_keeps_up_with_new_records_and_stops_on_cancel() {
    let (log, store) = fixture(2);
    let token = CancellationToken::new();
    let handle = spawn_materializer(materializer(log.consumer(GROUP), &store), token.clone());

    for i in 0..5 {
        publish(&log, &Reading::new("s1", i as f64, i));
    }
    wait_until(|| store.len() == 5).await;

    publish(&log, &Reading::new("s2", 9.0, 9));
    wait_until(|| committed_total(&log) == 6).await;

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("materializer did not stop")
        .unwrap();
    assert_eq!(log.closed_consumers(), 1);
}

#[tokio::test]
async fn loop_survives_transient_failures() {
    let (log, store) = fixture(1);
    let token = CancellationToken::new();
    log.fail_next_fetches(3);
    store.fail_next_inserts(2);
    for i in 0..4 {
        publish(&log, &Reading::new("s1", i as f64, i));
    }

    let handle = spawn_materializer(materializer(log.consumer(GROUP), &store), token.clone());
    wait_until(|| log.committed(GROUP, 0) == Some(4)).await;

    assert_eq!(store.len(), 4);
    assert_eq!(store.attempts(), 3);
    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_while_waiting_for_records_returns_promptly() {
    let (log, store) = fixture(1);
    let token = CancellationToken::new();
    let options = MaterializerOptions {
        fetch_wait: Duration::from_secs(30),
        ..MaterializerOptions::default()
    };
    let handle = spawn_materializer(materializer_with(log.consumer(GROUP), &store, options), token.clone());

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("fetch wait was not abandoned")
        .unwrap();
    assert_eq!(log.closed_consumers(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn in_flight_insert_and_commit_complete_after_cancel() {
    let (log, store) = fixture(1);
    let token = CancellationToken::new();
    store.set_insert_delay(Duration::from_millis(200));
    publish(&log, &Reading::new("s1", 1.0, 1));

    let handle = spawn_materializer(materializer(log.consumer(GROUP), &store), token.clone());
    wait_until(|| store.attempts() == 1).await;
    token.cancel();
    handle.await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(log.committed(GROUP, 0), Some(1));
    assert_eq!(log.closed_consumers(), 1);
}

#[tokio::test]
async fn already_cancelled_token_never_fetches() {
    let (log, store) = fixture(1);
    publish(&log, &Reading::new("s1", 1.0, 1));
    let token = CancellationToken::new();
    token.cancel();

    spawn_materializer(materializer(log.consumer(GROUP), &store), token)
        .await
        .unwrap();
    assert_eq!(store.attempts(), 0);
    assert_eq!(log.commit_calls(), 0);
    assert_eq!(log.closed_consumers(), 1);
}
