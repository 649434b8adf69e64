//! State stream paired with the scheduler it is observed on

use crate::broadcast::StateStream;
use feedloop_core::{SharedScheduler, SystemConfig};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// What a feedback source receives from the driver.
///
/// `StateContext` is itself a stream of states, so simple feedback sources can
/// use `StreamExt` combinators on it directly. Sources that spawn work take the
/// scheduler (and configuration) out first with [`into_parts`](Self::into_parts).
pub struct StateContext<S> {
    states: StateStream<S>,
    scheduler: SharedScheduler,
    config: Arc<SystemConfig>,
}

impl<S> StateContext<S> {
    /// Bundle a state stream with its scheduler and configuration.
    pub fn new(states: StateStream<S>, scheduler: SharedScheduler, config: Arc<SystemConfig>) -> Self {
        Self {
            states,
            scheduler,
            config,
        }
    }

    /// Scheduler all work derived from this context must run on.
    pub fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    /// Configuration of the owning system.
    pub fn config(&self) -> &Arc<SystemConfig> {
        &self.config
    }

    /// Split into state stream, scheduler and configuration.
    pub fn into_parts(self) -> (StateStream<S>, SharedScheduler, Arc<SystemConfig>) {
        (self.states, self.scheduler, self.config)
    }
}

impl<S> Stream for StateContext<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        Pin::new(&mut self.states).poll_next(cx)
    }
}
