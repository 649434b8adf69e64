//! Keyed effect lifetimes
//!
//! [`EffectLifetimeTable`] keeps, per identity, the latest payload, the
//! sender feeding that effect's [`PayloadUpdates`], the running task and the
//! [`LivenessToken`] of the current incarnation. All access goes through a
//! [`MutationSerializer`], so reconciliation and effect deliveries never
//! interleave even when effects run on other threads.

use feedloop_core::{
    LivenessToken, MutationSerializer, MutationStream, Result, SharedScheduler, TaskHandle,
    TokenSource,
};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Builds the effect for a newly tracked identity from its initial payload.
pub type EffectFactory<Id, P, M> =
    Arc<dyn Fn(Id, P, PayloadUpdates<P>) -> MutationStream<M> + Send + Sync>;

/// Later payloads for one tracked identity.
///
/// The initial payload is handed to the effect directly; this stream yields
/// only changes after it, and ends when the identity stops being tracked.
#[derive(Debug)]
pub struct PayloadUpdates<P> {
    rx: mpsc::UnboundedReceiver<P>,
}

impl<P> Stream for PayloadUpdates<P> {
    type Item = P;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<P>> {
        self.rx.poll_recv(cx)
    }
}

/// Run `effect` on `scheduler`, handing every item to `deliver`.
///
/// The task stops after the first error; normal completion needs no cleanup.
pub(crate) fn spawn_effect<M, D>(
    scheduler: &SharedScheduler,
    yield_first: bool,
    mut effect: MutationStream<M>,
    deliver: D,
) -> TaskHandle
where
    M: Send + 'static,
    D: Fn(Result<M>) + Send + 'static,
{
    let yielder = scheduler.clone();
    scheduler.spawn(Box::pin(async move {
        if yield_first {
            yielder.yield_now().await;
        }
        while let Some(item) = effect.next().await {
            let failed = item.is_err();
            deliver(item);
            if failed {
                break;
            }
        }
    }))
}

struct EffectLifetime<P> {
    latest: P,
    updates: mpsc::UnboundedSender<P>,
    token: LivenessToken,
    _task: TaskHandle,
}

struct TableState<Id, P> {
    lifetimes: HashMap<Id, EffectLifetime<P>>,
    tokens: TokenSource,
    disposed: bool,
}

struct TableShared<Id, P, M> {
    state: MutationSerializer<TableState<Id, P>>,
    downstream: mpsc::UnboundedSender<Result<M>>,
    scheduler: SharedScheduler,
    effects: EffectFactory<Id, P, M>,
    yield_before_effects: bool,
    tracked: AtomicUsize,
}

/// Table of running effects keyed by identity.
///
/// Dropping the table disposes it.
pub struct EffectLifetimeTable<Id, P, M> {
    shared: Arc<TableShared<Id, P, M>>,
}

impl<Id, P, M> EffectLifetimeTable<Id, P, M>
where
    Id: Eq + Hash + Clone + Send + 'static,
    P: Clone + PartialEq + Send + 'static,
    M: Send + 'static,
{
    /// Create an empty table forwarding effect mutations to `downstream`.
    pub fn new(
        scheduler: SharedScheduler,
        downstream: mpsc::UnboundedSender<Result<M>>,
        yield_before_effects: bool,
        effects: EffectFactory<Id, P, M>,
    ) -> Self {
        Self {
            shared: Arc::new(TableShared {
                state: MutationSerializer::new(TableState {
                    lifetimes: HashMap::new(),
                    tokens: TokenSource::new(),
                    disposed: false,
                }),
                downstream,
                scheduler,
                effects,
                yield_before_effects,
                tracked: AtomicUsize::new(0),
            }),
        }
    }

    /// Bring running effects in line with `queries`.
    ///
    /// New identities start an effect, changed payloads are pushed into the
    /// existing effect's [`PayloadUpdates`], and identities missing from
    /// `queries` are cancelled.
    pub fn reconcile(&self, queries: HashMap<Id, P>) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.state.run(move |state| {
            if let Some(shared) = weak.upgrade() {
                shared.apply(state, queries);
            }
        });
    }

    /// Cancel every tracked effect. Later deliveries are dropped.
    pub fn dispose(&self) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.state.run(move |state| {
            state.disposed = true;
            state.lifetimes.clear();
            if let Some(shared) = weak.upgrade() {
                shared.tracked.store(0, Ordering::Release);
            }
        });
    }

    /// Number of identities with a live effect, as of the last completed mutation.
    pub fn tracked(&self) -> usize {
        self.shared.tracked.load(Ordering::Acquire)
    }
}

impl<Id, P, M> TableShared<Id, P, M>
where
    Id: Eq + Hash + Clone + Send + 'static,
    P: Clone + PartialEq + Send + 'static,
    M: Send + 'static,
{
    fn apply(self: &Arc<Self>, state: &mut TableState<Id, P>, queries: HashMap<Id, P>) {
        if state.disposed {
            return;
        }

        let before = state.lifetimes.len();
        state.lifetimes.retain(|id, _| queries.contains_key(id));
        let cancelled = before - state.lifetimes.len();

        let (mut started, mut updated) = (0usize, 0usize);
        for (id, payload) in queries {
            if let Some(lifetime) = state.lifetimes.get_mut(&id) {
                if lifetime.latest != payload {
                    lifetime.latest = payload.clone();
                    // Effect may have stopped listening; that is its choice.
                    let _ = lifetime.updates.send(payload);
                    updated += 1;
                }
                continue;
            }

            let token = state.tokens.issue();
            let (updates, rx) = mpsc::unbounded_channel();
            let effect = (self.effects)(id.clone(), payload.clone(), PayloadUpdates { rx });
            let task = self.start(id.clone(), token, effect);
            state.lifetimes.insert(
                id,
                EffectLifetime {
                    latest: payload,
                    updates,
                    token,
                    _task: task,
                },
            );
            started += 1;
        }

        self.tracked.store(state.lifetimes.len(), Ordering::Release);
        if started + updated + cancelled > 0 {
            tracing::trace!(
                started,
                updated,
                cancelled,
                tracked = state.lifetimes.len(),
                "Reconciled effect lifetimes"
            );
        }
    }

    fn start(self: &Arc<Self>, id: Id, token: LivenessToken, effect: MutationStream<M>) -> TaskHandle {
        let weak = Arc::downgrade(self);
        spawn_effect(
            &self.scheduler,
            self.yield_before_effects,
            effect,
            move |item| Self::deliver(&weak, &id, token, item),
        )
    }

    fn deliver(shared: &Weak<Self>, id: &Id, token: LivenessToken, item: Result<M>) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let id = id.clone();
        let weak = Arc::downgrade(&shared);
        shared.state.run(move |state| {
            if state.disposed {
                return;
            }
            let live = state
                .lifetimes
                .get(&id)
                .is_some_and(|lifetime| lifetime.token == token);
            if !live {
                tracing::trace!(%token, "Discarding delivery from stale effect");
                return;
            }
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if item.is_err() {
                // One failing effect terminates the whole feedback source.
                state.disposed = true;
                state.lifetimes.clear();
                shared.tracked.store(0, Ordering::Release);
            }
            let _ = shared.downstream.send(item);
        });
    }
}

impl<Id, P, M> Drop for EffectLifetimeTable<Id, P, M> {
    fn drop(&mut self) {
        self.shared.state.run(|state| {
            state.disposed = true;
            state.lifetimes.clear();
        });
    }
}
