//! Feedback source type and task-backed mutation streams

use crate::context::StateContext;
use feedloop_core::{MutationStream, Result, TaskHandle};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A feedback source: observes the state stream and emits mutations.
///
/// Feedback sources are called once per system start, so one `System` can be
/// started repeatedly.
pub type Feedback<S, M> = Arc<dyn Fn(StateContext<S>) -> MutationStream<M> + Send + Sync>;

/// Wrap a closure as a [`Feedback`].
pub fn feedback<S, M, F>(source: F) -> Feedback<S, M>
where
    F: Fn(StateContext<S>) -> MutationStream<M> + Send + Sync + 'static,
{
    Arc::new(source)
}

/// Mutation stream fed by background tasks.
///
/// The tasks are owned by the stream: dropping it cancels them.
pub(crate) struct TaskStream<M> {
    rx: mpsc::UnboundedReceiver<Result<M>>,
    _tasks: Vec<TaskHandle>,
}

impl<M: Send + 'static> TaskStream<M> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<M>>, tasks: Vec<TaskHandle>) -> Self {
        Self { rx, _tasks: tasks }
    }

    pub(crate) fn boxed(self) -> MutationStream<M> {
        StreamExt::boxed(self)
    }
}

impl<M> Stream for TaskStream<M> {
    type Item = Result<M>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
