//! Bindings between the loop and an outside collaborator
//!
//! A collaborator (a view, a socket session, a device) observes states and
//! produces mutations of its own. It describes itself as [`Bindings`]: the
//! subscriptions it keeps alive while the system runs, plus the mutation
//! streams it feeds back. [`bind`] turns that description into a
//! [`Feedback`].

use crate::context::StateContext;
use crate::feedback::{feedback, Feedback};
use feedloop_core::{stream, MutationStream, Result, TaskHandle};
use futures::stream::{select_all, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Subscriptions and mutation sources of one collaborator.
pub struct Bindings<M> {
    subscriptions: Vec<TaskHandle>,
    mutations: Vec<MutationStream<M>>,
}

impl<M: Send + 'static> Bindings<M> {
    /// Bindings with the given subscriptions and mutation streams.
    pub fn new(subscriptions: Vec<TaskHandle>, mutations: Vec<MutationStream<M>>) -> Self {
        Self {
            subscriptions,
            mutations,
        }
    }

    /// No subscriptions, no mutations.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Keep `subscription` alive for as long as the bindings are bound.
    pub fn subscription(mut self, subscription: TaskHandle) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Feed `mutations` into the loop.
    pub fn mutations(mut self, mutations: MutationStream<M>) -> Self {
        self.mutations.push(mutations);
        self
    }
}

impl<M> std::fmt::Debug for Bindings<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("subscriptions", &self.subscriptions.len())
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

/// Spawn a task calling `on_state` for every state of `ctx`.
///
/// The returned handle is meant to go into [`Bindings::subscription`].
pub fn drive<S, F>(ctx: StateContext<S>, mut on_state: F) -> TaskHandle
where
    S: Send + 'static,
    F: FnMut(S) + Send + 'static,
{
    let (mut states, scheduler, _) = ctx.into_parts();
    scheduler.spawn(Box::pin(async move {
        while let Some(state) = states.recv().await {
            on_state(state);
        }
    }))
}

/// Merged mutations of a [`Bindings`] that owns its subscriptions.
struct BoundStream<M> {
    merged: MutationStream<M>,
    _subscriptions: Vec<TaskHandle>,
}

impl<M> Stream for BoundStream<M> {
    type Item = Result<M>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.merged.poll_next_unpin(cx)
    }
}

fn into_stream<M: Send + 'static>(bindings: Bindings<M>) -> MutationStream<M> {
    let Bindings {
        subscriptions,
        mutations,
    } = bindings;
    tracing::trace!(
        subscriptions = subscriptions.len(),
        mutations = mutations.len(),
        "Binding collaborator"
    );
    // Bound collaborators stay alive until the system stops, even with no mutations.
    let merged = select_all(mutations).chain(stream::never()).boxed();
    BoundStream {
        merged,
        _subscriptions: subscriptions,
    }
    .boxed()
}

/// Feedback built from a collaborator's [`Bindings`].
///
/// The mutation streams are merged; the resulting feedback never completes on
/// its own, so subscriptions are released only when the system stops.
pub fn bind<S, M, F>(bindings: F) -> Feedback<S, M>
where
    S: Send + 'static,
    M: Send + 'static,
    F: Fn(StateContext<S>) -> Bindings<M> + Send + Sync + 'static,
{
    feedback(move |ctx: StateContext<S>| into_stream(bindings(ctx)))
}

/// [`bind`] for a collaborator referenced weakly.
///
/// If `owner` has been dropped by the time the system starts, the feedback
/// binds nothing.
pub fn bind_weak<S, M, O, F>(owner: &Arc<O>, bindings: F) -> Feedback<S, M>
where
    S: Send + 'static,
    M: Send + 'static,
    O: Send + Sync + 'static,
    F: Fn(Arc<O>, StateContext<S>) -> Bindings<M> + Send + Sync + 'static,
{
    let owner = Arc::downgrade(owner);
    bind(move |ctx: StateContext<S>| match owner.upgrade() {
        Some(owner) => bindings(owner, ctx),
        None => {
            tracing::debug!("Binding owner dropped, binding nothing");
            Bindings::empty()
        }
    })
}
