//! Single effect slot for scalar requests
//!
//! The optional `react_*` combinators track at most one running effect. The
//! slot replaces it whenever the request changes and, like the keyed table,
//! tags every incarnation with a [`LivenessToken`] so a replaced effect can
//! never deliver into its successor's lifetime.

use crate::lifetime::spawn_effect;
use feedloop_core::{
    LivenessToken, MutationSerializer, MutationStream, Result, SharedScheduler, TaskHandle,
    TokenSource,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

struct SlotState {
    current: Option<(LivenessToken, TaskHandle)>,
    tokens: TokenSource,
    disposed: bool,
}

struct SlotShared<M> {
    state: MutationSerializer<SlotState>,
    downstream: mpsc::UnboundedSender<Result<M>>,
    scheduler: SharedScheduler,
    yield_before_effects: bool,
    active: AtomicBool,
}

/// At most one running effect, replaced on every request change.
///
/// Dropping the slot cancels the running effect.
pub struct EffectSlot<M> {
    shared: Arc<SlotShared<M>>,
}

impl<M: Send + 'static> EffectSlot<M> {
    /// Create an empty slot forwarding effect mutations to `downstream`.
    pub fn new(
        scheduler: SharedScheduler,
        downstream: mpsc::UnboundedSender<Result<M>>,
        yield_before_effects: bool,
    ) -> Self {
        Self {
            shared: Arc::new(SlotShared {
                state: MutationSerializer::new(SlotState {
                    current: None,
                    tokens: TokenSource::new(),
                    disposed: false,
                }),
                downstream,
                scheduler,
                yield_before_effects,
                active: AtomicBool::new(false),
            }),
        }
    }

    /// Cancel the running effect, then start `effect` if there is one.
    pub fn replace(&self, effect: Option<MutationStream<M>>) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.state.run(move |state| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if state.disposed {
                return;
            }
            state.current = None;
            if let Some(effect) = effect {
                let token = state.tokens.issue();
                let deliver_to = Arc::downgrade(&shared);
                let task = spawn_effect(
                    &shared.scheduler,
                    shared.yield_before_effects,
                    effect,
                    move |item| SlotShared::deliver(&deliver_to, token, item),
                );
                state.current = Some((token, task));
            }
            shared
                .active
                .store(state.current.is_some(), Ordering::Release);
        });
    }

    /// Cancel the running effect and ignore any later delivery.
    pub fn dispose(&self) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.state.run(move |state| {
            state.disposed = true;
            state.current = None;
            if let Some(shared) = weak.upgrade() {
                shared.active.store(false, Ordering::Release);
            }
        });
    }

    /// Whether an effect is currently tracked.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }
}

impl<M: Send + 'static> SlotShared<M> {
    fn deliver(shared: &Weak<Self>, token: LivenessToken, item: Result<M>) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let weak = Arc::downgrade(&shared);
        shared.state.run(move |state| {
            let live = !state.disposed
                && state
                    .current
                    .as_ref()
                    .is_some_and(|(current, _)| *current == token);
            let Some(shared) = weak.upgrade().filter(|_| live) else {
                tracing::trace!(%token, "Discarding delivery from replaced effect");
                return;
            };
            if item.is_err() {
                state.disposed = true;
                state.current = None;
                shared.active.store(false, Ordering::Release);
            }
            let _ = shared.downstream.send(item);
        });
    }
}

impl<M> Drop for EffectSlot<M> {
    fn drop(&mut self) {
        self.shared.state.run(|state| {
            state.disposed = true;
            state.current = None;
        });
    }
}
