//! Runtime-agnostic scheduling traits.
//!
//! No feedloop component spawns work on its own. Every task (the driver, each
//! feedback pump, each reconciler, each effect) goes through a [`Scheduler`]
//! supplied by the caller, which makes deterministic tests with a virtual clock
//! possible.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Task scheduling contract for runtime implementations.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Spawn a task. The returned handle cancels the task when dropped.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle;

    /// Resolve on a later turn of the scheduler, even if it is otherwise idle.
    async fn yield_now(&self);
}

/// Shared scheduler handle passed around the runtime.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Owned cancellation handle for a spawned task.
///
/// Dropping the handle cancels the task. Call [`TaskHandle::detach`] to let
/// the task run to completion on its own.
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    /// Create a handle that runs `cancel` when the task must stop.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancel the task now.
    pub fn cancel(mut self) {
        self.fire();
    }

    /// Release the handle without cancelling the task.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(counter: &Arc<AtomicUsize>) -> TaskHandle {
        let counter = counter.clone();
        TaskHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn drop_cancels_once() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        drop(counting_handle(&cancelled));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_cancel_does_not_fire_twice() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        counting_handle(&cancelled).cancel();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_skips_cancellation() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        counting_handle(&cancelled).detach();
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
        drop(TaskHandle::noop());
    }
}
