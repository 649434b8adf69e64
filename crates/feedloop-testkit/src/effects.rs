//! Effect doubles
//!
//! - [`EffectProbe`] records when effects start, receive updates and are
//!   dropped, keyed by whatever identifies them in the test
//! - [`ManualEffect`] is an effect the test completes by hand
//! - [`scripted`] is a feedback source that emits fixed mutations at fixed
//!   virtual times

use feedloop_core::{FeedbackError, MutationStream, Result};
use feedloop_runtime::{feedback, Feedback, StateContext};
use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One lifecycle event of a probed effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle<K> {
    /// The effect was created.
    Started(K),
    /// The effect observed a payload update.
    Updated(K),
    /// The effect stream was dropped, by completion or cancellation.
    Dropped(K),
}

/// Shared lifecycle log for effects under test.
#[derive(Debug)]
pub struct EffectProbe<K> {
    events: Arc<Mutex<Vec<Lifecycle<K>>>>,
}

impl<K> Clone for EffectProbe<K> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<K: Clone + PartialEq + Send + 'static> EffectProbe<K> {
    /// Empty probe.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record the start of `key`'s effect and wrap it so its drop is recorded.
    pub fn track<M: Send + 'static>(&self, key: K, effect: MutationStream<M>) -> MutationStream<M> {
        self.events.lock().push(Lifecycle::Started(key.clone()));
        let events = self.events.clone();
        Probed {
            inner: effect,
            on_drop: Some(Box::new(move || events.lock().push(Lifecycle::Dropped(key)))),
        }
        .boxed()
    }

    /// Record that `key`'s effect saw an update.
    pub fn updated(&self, key: K) {
        self.events.lock().push(Lifecycle::Updated(key));
    }

    /// Every event, in order.
    pub fn events(&self) -> Vec<Lifecycle<K>> {
        self.events.lock().clone()
    }

    /// How many times `key`'s effect was started.
    pub fn starts(&self, key: &K) -> usize {
        self.count(|event| matches!(event, Lifecycle::Started(k) if k == key))
    }

    /// How many updates `key`'s effect saw.
    pub fn updates(&self, key: &K) -> usize {
        self.count(|event| matches!(event, Lifecycle::Updated(k) if k == key))
    }

    /// How many times `key`'s effect was dropped.
    pub fn drops(&self, key: &K) -> usize {
        self.count(|event| matches!(event, Lifecycle::Dropped(k) if k == key))
    }

    /// Started effects not yet dropped.
    pub fn live(&self) -> usize {
        let events = self.events.lock();
        let started = events
            .iter()
            .filter(|e| matches!(e, Lifecycle::Started(_)))
            .count();
        let dropped = events
            .iter()
            .filter(|e| matches!(e, Lifecycle::Dropped(_)))
            .count();
        started.saturating_sub(dropped)
    }

    fn count(&self, predicate: impl Fn(&Lifecycle<K>) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl<K: Clone + PartialEq + Send + 'static> Default for EffectProbe<K> {
    fn default() -> Self {
        Self::new()
    }
}

struct Probed<M> {
    inner: MutationStream<M>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl<M> Stream for Probed<M> {
    type Item = Result<M>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<M> Drop for Probed<M> {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

/// Sending half of an effect driven by the test.
#[derive(Debug)]
pub struct ManualEffect<M> {
    tx: mpsc::UnboundedSender<Result<M>>,
}

impl<M: Send + 'static> ManualEffect<M> {
    /// A manual effect and the stream it feeds.
    pub fn channel() -> (Self, MutationStream<M>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let effect = futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed();
        (Self { tx }, effect)
    }

    /// Emit a mutation. Returns `false` if the effect was cancelled.
    pub fn emit(&self, mutation: M) -> bool {
        self.tx.send(Ok(mutation)).is_ok()
    }

    /// Fail the effect. Returns `false` if the effect was cancelled.
    pub fn fail(&self, error: FeedbackError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Whether the effect's stream has been dropped.
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Complete the effect.
    pub fn complete(self) {}
}

/// Feedback source emitting `script` mutations at their virtual times.
///
/// Times are milliseconds from the moment the system starts this source. The
/// source completes after its last mutation.
pub fn scripted<S, M>(script: Vec<(u64, M)>) -> Feedback<S, M>
where
    S: Send + 'static,
    M: Clone + Send + Sync + 'static,
{
    let script = Arc::new(script);
    feedback(move |_: StateContext<S>| {
        let origin = Instant::now();
        let steps = script.as_ref().clone();
        futures::stream::iter(steps)
            .then(move |(at, mutation)| async move {
                tokio::time::sleep_until(origin + Duration::from_millis(at)).await;
                Ok(mutation)
            })
            .boxed()
    })
}
