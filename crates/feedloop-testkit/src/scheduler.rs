//! Virtual-clock scheduler
//!
//! [`VirtualScheduler`] spawns onto the current tokio runtime and reads time
//! from tokio's clock. Under `#[tokio::test(start_paused = true)]` that clock
//! is virtual: it advances only when every task is idle, which makes effect
//! timing reproducible.

use async_trait::async_trait;
use feedloop_core::{Scheduler, SharedScheduler, TaskHandle};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Counters {
    spawned: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Scheduler with a virtual clock and spawn/cancel accounting.
#[derive(Debug, Clone)]
pub struct VirtualScheduler {
    runtime: Handle,
    origin: Instant,
    counters: Arc<Counters>,
}

impl VirtualScheduler {
    /// Scheduler for the current tokio runtime, with its clock at zero now.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime.
    pub fn new() -> Self {
        Self {
            runtime: Handle::try_current().expect("virtual scheduler needs a tokio runtime"),
            origin: Instant::now(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// This scheduler as the shared handle the runtime expects.
    pub fn shared(&self) -> SharedScheduler {
        Arc::new(self.clone())
    }

    /// Virtual milliseconds elapsed since the scheduler was created.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Let `ms` of virtual time pass.
    ///
    /// Every task that becomes ready in between runs before the clock moves
    /// on, so cancellations cascade and timers fire in order.
    pub async fn advance(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Sleep until virtual time `ms`. Returns at once if it already passed.
    pub async fn run_until(&self, ms: u64) {
        tokio::time::sleep_until(self.origin + Duration::from_millis(ms)).await;
    }

    /// Tasks spawned so far.
    pub fn spawned(&self) -> usize {
        self.counters.spawned.load(Ordering::SeqCst)
    }

    /// Task handles released while still armed (cancelled or dropped).
    pub fn cancelled(&self) -> usize {
        self.counters.cancelled.load(Ordering::SeqCst)
    }
}

/// Current-thread runtime with a paused clock, for driving loops from
/// synchronous tests such as proptest bodies.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build paused runtime")
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for VirtualScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle {
        self.counters.spawned.fetch_add(1, Ordering::SeqCst);
        let abort = self.runtime.spawn(task).abort_handle();
        let counters = self.counters.clone();
        TaskHandle::new(move || {
            counters.cancelled.fetch_add(1, Ordering::SeqCst);
            abort.abort();
        })
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clock_moves_only_when_advanced() {
        let scheduler = VirtualScheduler::new();
        assert_eq!(scheduler.now_ms(), 0);

        scheduler.advance(250).await;
        assert_eq!(scheduler.now_ms(), 250);

        scheduler.run_until(400).await;
        assert_eq!(scheduler.now_ms(), 400);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_spawns_and_cancellations() {
        let scheduler = VirtualScheduler::new();
        let kept = scheduler.spawn(Box::pin(futures::future::pending()));
        scheduler.spawn(Box::pin(async {})).detach();
        drop(scheduler.spawn(Box::pin(futures::future::pending())));

        assert_eq!(scheduler.spawned(), 3);
        assert_eq!(scheduler.cancelled(), 1);
        drop(kept);
        assert_eq!(scheduler.cancelled(), 2);
    }

    #[test]
    fn paused_runtime_starts_at_zero() {
        paused_runtime().block_on(async {
            let scheduler = VirtualScheduler::new();
            tokio::time::sleep(Duration::from_secs(3)).await;
            assert_eq!(scheduler.now_ms(), 3_000);
        });
    }
}
