//! Schedules deferred re-checks, firing a callback when an entry's delay
//! elapses. Backed by a binary min-heap ordered by due time.

use crate::domain::{now, TimerEntry};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct TimerScheduler {
    heap: Mutex<BinaryHeap<Reverse<TimerEntry>>>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Schedules `reason` to fire for `escrow_id` after `delay_secs` seconds.
    pub async fn set_timer(&self, escrow_id: u64, delay_secs: u64, reason: &str) {
        tracing::info!(escrow_id, delay_secs, reason, "timer: setting");
        let entry = TimerEntry {
            due_at: now() + delay_secs,
            escrow_id,
            reason: reason.to_string(),
            attempt: 1,
        };
        self.heap.lock().await.push(Reverse(entry));
    }

    /// Runs the scheduler loop until `token` is cancelled, invoking
    /// `callback` for each entry as it comes due.
    pub async fn run<F, Fut>(&self, callback: F, token: CancellationToken)
    where
        F: Fn(TimerEntry) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            if token.is_cancelled() {
                return;
            }
            let next_due = {
                let heap = self.heap.lock().await;
                heap.peek().map(|Reverse(e)| e.due_at)
            };
            let sleep_for = match next_due {
                None => Duration::from_millis(500),
                Some(due) => {
                    let remaining = due.saturating_sub(now());
                    if remaining == 0 {
                        Duration::ZERO
                    } else {
                        Duration::from_secs(remaining.min(2))
                    }
                }
            };

            if sleep_for.is_zero() {
                let entry = {
                    let mut heap = self.heap.lock().await;
                    heap.pop().map(|Reverse(e)| e)
                };
                if let Some(entry) = entry {
                    callback(entry).await;
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = token.cancelled() => return,
            }
        }
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}
