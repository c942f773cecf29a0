//! Scenario tests 3-4: batch flush by threshold and by interval.

use orchestrator::batch_runner::BatchRunner;
use orchestrator::domain::EscrowKind;
use orchestrator::priority_cache::PriorityCache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn scenario_3_batch_flush_by_threshold() {
    let cache = Arc::new(PriorityCache::new());
    for id in 0..=2u64 {
        cache.add(id, EscrowKind::Linked, id).await;
    }
    let runner = BatchRunner::new(cache.clone(), 3, 10);
    let received: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let token = CancellationToken::new();

    let received2 = received.clone();
    let token2 = token.clone();
    let run = runner.run(
        move |batch| {
            let received = received2.clone();
            let token = token2.clone();
            async move {
                *received.lock().unwrap() = batch.iter().map(|e| e.escrow_id).collect();
                token.cancel();
                Ok(())
            }
        },
        token.clone(),
    );
    tokio::time::timeout(Duration::from_millis(1500), run)
        .await
        .expect("batch flushed within 1.5s of reaching threshold");

    let mut ids = received.lock().unwrap().clone();
    ids.sort();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(cache.size().await, 0, "cache empty after successful flush");
}

#[tokio::test]
async fn scenario_4_batch_flush_by_interval() {
    let cache = Arc::new(PriorityCache::new());
    cache.add(42, EscrowKind::Linked, 0).await;
    let runner = BatchRunner::new(cache.clone(), 10, 1);
    let calls = Arc::new(AtomicUsize::new(0));
    let received: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let token = CancellationToken::new();

    let calls2 = calls.clone();
    let received2 = received.clone();
    let token2 = token.clone();
    let run = runner.run(
        move |batch| {
            let calls = calls2.clone();
            let received = received2.clone();
            let token = token2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                *received.lock().unwrap() = batch.iter().map(|e| e.escrow_id).collect();
                token.cancel();
                Ok(())
            }
        },
        token.clone(),
    );
    tokio::time::timeout(Duration::from_millis(2500), run)
        .await
        .expect("interval-based flush fires within the interval plus one poll tick");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*received.lock().unwrap(), vec![42]);
}
