//! Scenario tests 1-2: priority ordering and seen_count demotion.

use orchestrator::domain::EscrowKind;
use orchestrator::priority_cache::PriorityCache;

#[tokio::test]
async fn scenario_1_priority_ordering_in_a_batch() {
    let cache = PriorityCache::new();
    cache.add(1, EscrowKind::Linked, 0).await;
    cache.add(2, EscrowKind::Extended, 1).await;
    cache.add(3, EscrowKind::Expired, 2).await;

    let batch = cache.pop_batch(3).await;
    let ids: Vec<u64> = batch.iter().map(|r| r.escrow_id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn scenario_2_seen_count_demotes_an_entry() {
    let cache = PriorityCache::new();
    cache.add(1, EscrowKind::Linked, 0).await;
    cache.add(2, EscrowKind::Linked, 1).await;

    let first = cache.pop_batch(1).await;
    assert_eq!(first.iter().map(|r| r.escrow_id).collect::<Vec<_>>(), vec![1]);

    let second = cache.pop_batch(2).await;
    assert_eq!(
        second.iter().map(|r| r.escrow_id).collect::<Vec<_>>(),
        vec![2, 1],
        "id 1 has seen_count=2, id 2 has seen_count=1 so 2 sorts first"
    );
}
