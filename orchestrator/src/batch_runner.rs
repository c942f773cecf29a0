//! Flushes the priority cache to the AI agent when a size threshold or time
//! window is reached.

use crate::domain::{now, EscrowRef};
use crate::priority_cache::PriorityCache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct BatchRunner {
    cache: Arc<PriorityCache>,
    threshold: usize,
    interval_secs: u64,
}

impl BatchRunner {
    pub fn new(cache: Arc<PriorityCache>, threshold: usize, interval_secs: u64) -> Self {
        Self {
            cache,
            threshold,
            interval_secs,
        }
    }

    /// Runs the flush loop until `token` is cancelled. `ai_callback` is
    /// invoked with each selected batch; entries are released on success and
    /// unlocked for retry on failure.
    pub async fn run<F, Fut>(&self, ai_callback: F, token: CancellationToken)
    where
        F: Fn(Vec<EscrowRef>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut last_run = now();
        loop {
            if token.is_cancelled() {
                return;
            }
            let size = self.cache.size().await;
            let elapsed = now().saturating_sub(last_run);
            let should_trigger = size >= self.threshold || elapsed >= self.interval_secs;

            if should_trigger && size > 0 {
                let take = if size >= self.threshold { self.threshold } else { size };
                tracing::info!(take, "batch_runner: processing escrows");
                let batch = self.cache.pop_batch(take).await;
                if !batch.is_empty() {
                    tracing::info!("batch_runner: waiting for agent");
                    match ai_callback(batch.clone()).await {
                        Ok(()) => {
                            for e in &batch {
                                self.cache.release(e.escrow_id).await;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "batch_runner: error");
                            for e in &batch {
                                self.cache.unlock(e.escrow_id).await;
                            }
                        }
                    }
                }
                last_run = now();
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = token.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EscrowKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn flushes_once_threshold_reached() {
        let cache = Arc::new(PriorityCache::new());
        for id in 1..=5u64 {
            cache.add(id, EscrowKind::Linked, id).await;
        }
        let runner = BatchRunner::new(cache.clone(), 5, 3600);
        let calls = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let calls2 = calls.clone();
        let token2 = token.clone();
        let run = runner.run(
            move |_batch| {
                let calls = calls2.clone();
                let token = token2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    token.cancel();
                    Ok(())
                }
            },
            token.clone(),
        );
        tokio::time::timeout(Duration::from_secs(3), run).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.size().await, 0, "successful batch releases entries");
    }

    #[tokio::test]
    async fn failed_batch_unlocks_entries_for_retry() {
        let cache = Arc::new(PriorityCache::new());
        cache.add(1, EscrowKind::Linked, 1).await;
        let runner = BatchRunner::new(cache.clone(), 1, 3600);
        let token = CancellationToken::new();
        let token2 = token.clone();
        let run = runner.run(
            move |_batch| {
                let token = token2.clone();
                async move {
                    token.cancel();
                    Err(anyhow::anyhow!("agent unreachable"))
                }
            },
            token.clone(),
        );
        tokio::time::timeout(Duration::from_secs(3), run).await.unwrap();
        assert_eq!(cache.size().await, 1, "entry stays in cache after failure");
    }
}
