//! Tokio-backed scheduler

use async_trait::async_trait;
use feedloop_core::{FeedbackError, Result, Scheduler, TaskHandle};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;

/// [`Scheduler`] spawning onto a tokio runtime.
///
/// Cancellation aborts the tokio task, which drops its future at the next
/// await point.
#[derive(Debug)]
pub struct TokioScheduler {
    handle: Handle,
    spawned: AtomicU64,
}

impl TokioScheduler {
    /// Scheduler for the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| FeedbackError::internal(format!("no tokio runtime available: {e}")))?;
        Ok(Self::from_handle(handle))
    }

    /// Scheduler for an explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            spawned: AtomicU64::new(0),
        }
    }

    /// Total number of tasks spawned through this scheduler.
    pub fn spawned_count(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle {
        self.spawned.fetch_add(1, Ordering::Relaxed);
        let abort = self.handle.spawn(task).abort_handle();
        TaskHandle::new(move || abort.abort())
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn current_fails_outside_runtime() {
        let error = TokioScheduler::current().unwrap_err();
        assert!(error.message().contains("no tokio runtime"));
    }

    #[tokio::test]
    async fn spawned_task_runs() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = oneshot::channel();
        scheduler
            .spawn(Box::pin(async move {
                let _ = tx.send(7);
            }))
            .detach();

        assert_eq!(rx.await.unwrap(), 7);
        assert_eq!(scheduler.spawned_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_aborts_task() {
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let handle = scheduler.spawn(Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let _ = tx.send(());
        }));

        drop(handle);
        assert!(rx.await.is_err());
    }
}
