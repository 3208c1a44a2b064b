//! Tests for controlling a running batcher through its handle

use chanbatch::{BatchLimits, Batcher, BatcherError, BatcherHandle, FlushReason};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, Instant};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn spawn(size: usize, age: Duration) -> (mpsc::Sender<u32>, BatcherHandle<u32>) {
    let (tx, rx) = mpsc::channel(4);
    let limits = BatchLimits::new(size, age).unwrap();
    let handle = Batcher::new(limits).with_name("handle-test").spawn(rx);
    (tx, handle)
}

// Give the control loop a chance to take queued items.
async fn settle() {
    sleep(ms(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_length_queries() {
    let (tx, handle) = spawn(3, Duration::from_secs(60));
    assert!(handle.is_empty());
    assert!(!handle.is_full());
    assert_eq!(handle.len(), 0);

    tx.send(1).await.unwrap();
    tx.send(2).await.unwrap();
    settle().await;
    assert_eq!(handle.len(), 2);
    assert!(!handle.is_empty());
    assert!(!handle.is_full());
    assert_eq!(handle.limits().size(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_forced_flush() {
    let (tx, mut handle) = spawn(10, Duration::from_secs(60));
    let mut results = handle.results().unwrap();

    tx.send(1).await.unwrap();
    tx.send(2).await.unwrap();
    settle().await;
    handle.flush().unwrap();

    let batch = results.recv().await.unwrap();
    assert_eq!(batch, vec![1, 2]);
    assert_eq!(batch.reason(), FlushReason::Forced);
    assert!(handle.is_empty());

    // Nothing buffered: flushing again emits nothing.
    handle.flush().unwrap();
    drop(tx);
    assert!(results.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_flush_restarts_age_clock() {
    let (tx, mut handle) = spawn(10, ms(100));
    let mut results = handle.results().unwrap();
    let start = Instant::now();

    tx.send(1).await.unwrap();
    sleep(ms(50)).await;
    handle.flush().unwrap();
    assert_eq!(results.recv().await.unwrap().reason(), FlushReason::Forced);

    sleep(ms(10)).await;
    tx.send(2).await.unwrap();

    let batch = results.recv().await.unwrap();
    assert_eq!(batch, vec![2]);
    assert_eq!(batch.reason(), FlushReason::Age);
    assert!(start.elapsed() >= ms(160), "{:?}", start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_and_closes() {
    let (tx, mut handle) = spawn(10, Duration::from_secs(60));
    let mut results = handle.results().unwrap();

    tx.send(7).await.unwrap();
    tx.send(8).await.unwrap();
    settle().await;
    handle.stop().unwrap();

    let batch = results.recv().await.unwrap();
    assert_eq!(batch, vec![7, 8]);
    assert_eq!(batch.reason(), FlushReason::Closing);
    assert!(results.recv().await.is_none());
    assert!(handle.is_closed());

    // The source is no longer read.
    assert!(tx.send(9).await.is_err());

    let stats = handle.wait().await;
    assert_eq!(stats.items_received, 2);
    assert_eq!(stats.closing_flushes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_stop_rejected() {
    let (_tx, mut handle) = spawn(10, Duration::from_secs(60));
    let mut results = handle.results().unwrap();

    handle.stop().unwrap();
    assert_eq!(handle.stop().unwrap_err(), BatcherError::AlreadyStopped);

    assert!(results.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_source_exhausted() {
    let (tx, mut handle) = spawn(10, Duration::from_secs(60));
    let mut results = handle.results().unwrap();

    tx.send(1).await.unwrap();
    drop(tx);
    assert_eq!(results.recv().await.unwrap(), vec![1]);
    assert!(results.recv().await.is_none());

    assert!(handle.is_closed());
    assert_eq!(handle.stop().unwrap_err(), BatcherError::Closed);
    // The failed stop did not count as stopping.
    assert_eq!(handle.stop().unwrap_err(), BatcherError::Closed);
    assert_eq!(handle.flush().unwrap_err(), BatcherError::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_results_taken_once() {
    let (_tx, mut handle) = spawn(10, Duration::from_secs(60));
    let _results = handle.results().unwrap();

    assert_eq!(handle.results().unwrap_err(), BatcherError::ResultsTaken);
}

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_applies_backpressure() {
    let (tx, mut handle) = spawn(1, Duration::from_secs(60));
    let mut results = handle.results().unwrap();

    // Item 0 is flushed and its publish waits for us; the loop reads nothing else.
    tx.send(0).await.unwrap();
    settle().await;
    for i in 1..=4 {
        tx.send(i).await.unwrap();
    }
    settle().await;
    assert!(matches!(tx.try_send(5), Err(TrySendError::Full(5))));

    assert_eq!(results.recv().await.unwrap(), vec![0]);
    assert_eq!(results.recv().await.unwrap(), vec![1]);
    settle().await;
    assert!(tx.try_send(5).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_wait_reports_totals() {
    let (tx, mut handle) = spawn(2, Duration::from_secs(60));
    let results = handle.results().unwrap();

    let consumer = tokio::spawn(async move {
        use futures::StreamExt;
        results.collect::<Vec<_>>().await
    });

    for i in 0..5 {
        tx.send(i).await.unwrap();
    }
    drop(tx);

    let stats = handle.wait().await;
    assert_eq!(stats.items_received, 5);
    assert_eq!(stats.items_emitted, 5);
    assert_eq!(stats.size_flushes, 2);
    assert_eq!(stats.closing_flushes, 1);
    assert_eq!(stats.batches(), 3);

    assert_eq!(consumer.await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_keeps_running() {
    let (tx, mut handle) = spawn(2, Duration::from_secs(60));
    let mut results = handle.results().unwrap();
    drop(handle);

    for i in 0..3 {
        tx.send(i).await.unwrap();
    }
    drop(tx);

    assert_eq!(results.recv().await.unwrap(), vec![0, 1]);
    assert_eq!(results.recv().await.unwrap(), vec![2]);
    assert!(results.recv().await.is_none());
}

#[test]
fn test_wait_after_runtime_shutdown() {
    let (tx, rx) = mpsc::channel::<u32>(4);
    let first = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let handle = {
        let _guard = first.enter();
        Batcher::new(BatchLimits::new(10, Duration::from_secs(60)).unwrap()).spawn(rx)
    };

    // Shutting the runtime down cancels the control loop before it ever ran.
    drop(first);
    assert!(tx.is_closed());

    let second = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let stats = second.block_on(handle.wait());
    assert_eq!(stats, Default::default());
}
