//! Feedback system driver
//!
//! [`System::start`] wires one loop instance:
//!
//! ```text
//!            ┌────────── StateBroadcast ◄─────────┐
//!            ▼                                    │ publish
//!   feedback sources ──► pumps ──► mutation channel ──► driver (fold) ──► SystemStream
//! ```
//!
//! The driver task owns the state. It takes one mutation off the channel,
//! folds it, publishes the new state to every feedback source and to the
//! caller, and only then takes the next mutation. Pumps forward each feedback
//! source's mutations into the shared channel, so mutations from one source
//! keep their order and sources interleave by arrival.
//!
//! Dropping the [`SystemStream`] aborts the driver, which drops every pump,
//! which drops every feedback stream and, with it, every running effect.

use crate::broadcast::StateBroadcast;
use crate::context::StateContext;
use crate::feedback::Feedback;
use feedloop_core::{Result, SharedScheduler, SystemConfig, TaskHandle};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::Instrument;

type Reduce<S, M> = Arc<dyn Fn(S, M) -> Result<S> + Send + Sync>;

/// A state-feedback loop description; [`start`](Self::start) runs it.
pub struct System<S, M> {
    initial: S,
    reduce: Reduce<S, M>,
    scheduler: SharedScheduler,
    feedbacks: Vec<Feedback<S, M>>,
    config: Arc<SystemConfig>,
}

/// Describe a feedback loop with an infallible reducer.
pub fn system<S, M, R>(
    initial: S,
    reduce: R,
    scheduler: SharedScheduler,
    feedbacks: Vec<Feedback<S, M>>,
) -> System<S, M>
where
    S: Clone + Send + 'static,
    M: Send + 'static,
    R: Fn(S, M) -> S + Send + Sync + 'static,
{
    try_system(initial, move |state, mutation| Ok(reduce(state, mutation)), scheduler, feedbacks)
}

/// Describe a feedback loop whose reducer can fail.
///
/// A reducer error terminates the loop exactly like a feedback error.
pub fn try_system<S, M, R>(
    initial: S,
    reduce: R,
    scheduler: SharedScheduler,
    feedbacks: Vec<Feedback<S, M>>,
) -> System<S, M>
where
    S: Clone + Send + 'static,
    M: Send + 'static,
    R: Fn(S, M) -> Result<S> + Send + Sync + 'static,
{
    System {
        initial,
        reduce: Arc::new(reduce),
        scheduler,
        feedbacks,
        config: Arc::new(SystemConfig::default()),
    }
}

impl<S, M> System<S, M>
where
    S: Clone + Send + 'static,
    M: Send + 'static,
{
    /// Replace the loop configuration.
    pub fn with_config(mut self, config: SystemConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Add one more feedback source.
    pub fn with_feedback(mut self, feedback: Feedback<S, M>) -> Self {
        self.feedbacks.push(feedback);
        self
    }

    /// Configuration the loop runs with.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Start a fresh loop instance from the initial state.
    ///
    /// The first item of the returned stream is always the initial state.
    /// Each call is independent: nothing is shared between two started loops.
    pub fn start(&self) -> SystemStream<S> {
        let broadcast = StateBroadcast::new(self.initial.clone());
        let (mutations_tx, mutations_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        // Receiver is held locally, send cannot fail.
        let _ = output_tx.send(Ok(self.initial.clone()));

        let pumps: Vec<TaskHandle> = self
            .feedbacks
            .iter()
            .map(|source| {
                let ctx = StateContext::new(
                    broadcast.subscribe(),
                    self.scheduler.clone(),
                    self.config.clone(),
                );
                pump(&self.scheduler, source(ctx), mutations_tx.clone())
            })
            .collect();
        drop(mutations_tx);

        let span = tracing::info_span!("feedback_system", label = %self.config.label);
        let driver = Driver {
            state: self.initial.clone(),
            reduce: self.reduce.clone(),
            broadcast,
            output: output_tx,
            trace_transitions: self.config.trace_transitions,
        };
        let task = self
            .scheduler
            .spawn(Box::pin(driver.run(mutations_rx, pumps).instrument(span)));

        SystemStream {
            rx: output_rx,
            _driver: task,
            done: false,
        }
    }
}

/// Forward one feedback source into the shared mutation channel.
fn pump<M: Send + 'static>(
    scheduler: &SharedScheduler,
    mut mutations: feedloop_core::MutationStream<M>,
    tx: mpsc::UnboundedSender<Result<M>>,
) -> TaskHandle {
    scheduler.spawn(Box::pin(async move {
        while let Some(item) = mutations.next().await {
            let failed = item.is_err();
            if tx.send(item).is_err() || failed {
                break;
            }
        }
    }))
}

struct Driver<S, M> {
    state: S,
    reduce: Reduce<S, M>,
    broadcast: StateBroadcast<S>,
    output: mpsc::UnboundedSender<Result<S>>,
    trace_transitions: bool,
}

impl<S, M> Driver<S, M>
where
    S: Clone + Send + 'static,
    M: Send + 'static,
{
    async fn run(
        mut self,
        mut mutations: mpsc::UnboundedReceiver<Result<M>>,
        pumps: Vec<TaskHandle>,
    ) {
        tracing::debug!(feedbacks = pumps.len(), "Feedback system started");
        let mut folds = 0u64;

        while let Some(item) = mutations.recv().await {
            let next = item.and_then(|mutation| (self.reduce)(self.state.clone(), mutation));
            match next {
                Ok(state) => {
                    folds += 1;
                    if self.trace_transitions {
                        tracing::trace!(fold = folds, "Folded mutation");
                    }
                    self.state = state;
                    self.broadcast.publish(self.state.clone());
                    if self.output.send(Ok(self.state.clone())).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, folds, "Feedback system terminated by error");
                    let _ = self.output.send(Err(error));
                    break;
                }
            }
        }

        self.broadcast.close();
        drop(pumps);
        tracing::debug!(folds, "Feedback system stopped");
    }
}

/// Outward stream of a running loop.
///
/// Yields the initial state, then one state per folded mutation. A terminal
/// error is yielded once; the stream ends after it. Dropping the stream
/// cancels the loop and everything it started.
pub struct SystemStream<S> {
    rx: mpsc::UnboundedReceiver<Result<S>>,
    _driver: TaskHandle,
    done: bool,
}

impl<S> SystemStream<S> {
    /// Whether the stream has yielded its last item.
    pub fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<S> Stream for SystemStream<S> {
    type Item = Result<S>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let item = futures::ready!(this.rx.poll_recv(cx));
        if !matches!(item, Some(Ok(_))) {
            this.done = true;
        }
        Poll::Ready(item)
    }
}
