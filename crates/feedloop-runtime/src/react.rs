//! Query-driven effect combinators
//!
//! Every `react_*` constructor turns "the part of the state I care about" into
//! "the set of effects that should be running" and returns it as a
//! [`Feedback`]. Each one spawns a reconciler task that reads the state stream
//! one state at a time, derives the query, and hands the result to an
//! [`EffectSlot`] (scalar queries) or an [`EffectLifetimeTable`] (keyed
//! queries). Dropping the feedback's mutation stream stops the reconciler and
//! cancels every effect it started.
//!
//! | Constructor          | Query shape          | Restarts when                    |
//! |----------------------|----------------------|----------------------------------|
//! | [`react_optional`]   | `Option<Q>`          | presence flips                   |
//! | [`react_equatable`]  | `Option<Q: Eq>`      | value changes                    |
//! | [`react_with`]       | `Option<Q>`          | caller's equality says so        |
//! | [`react_set`]        | `HashSet<Q>`         | never; members start and stop    |
//! | [`react_requests`]   | `HashMap<Id, P>`     | never; payloads update in place  |
//! | [`react_identified`] | `Vec<C: Identifiable>` | never; children update in place |

use crate::context::StateContext;
use crate::feedback::{feedback, Feedback, TaskStream};
use crate::lifetime::{EffectFactory, EffectLifetimeTable, PayloadUpdates};
use crate::slot::EffectSlot;
use feedloop_core::{Identifiable, MutationStream, Result, SharedScheduler};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Spawn the reconciler for one feedback subscription.
///
/// `build` receives the scheduler, the downstream sender and the
/// `yield_before_effects` flag and returns the per-state step function. The
/// step function owns its slot or table, so when the state stream ends the
/// effects are disposed along with it.
fn reconciler<S, M, R, B>(ctx: StateContext<S>, build: B) -> MutationStream<M>
where
    S: Send + 'static,
    M: Send + 'static,
    B: FnOnce(SharedScheduler, mpsc::UnboundedSender<Result<M>>, bool) -> R,
    R: FnMut(S) + Send + 'static,
{
    let (mut states, scheduler, config) = ctx.into_parts();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut step = build(scheduler.clone(), tx, config.yield_before_effects);
    let task = scheduler.spawn(Box::pin(async move {
        while let Some(state) = states.recv().await {
            step(state);
        }
    }));
    TaskStream::new(rx, vec![task]).boxed()
}

/// Run one effect while the query is present.
///
/// Only presence transitions count as changes: a present query whose value
/// differs from the previous one keeps the running effect. Use this when the
/// query carries no meaningful equality.
pub fn react_optional<S, Q, M, QF, EF>(query: QF, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    Q: Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> Option<Q> + Send + Sync + 'static,
    EF: Fn(Q) -> MutationStream<M> + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let effects = Arc::new(effects);
    feedback(move |ctx: StateContext<S>| {
        let query = query.clone();
        let effects = effects.clone();
        reconciler(ctx, move |scheduler, tx, yield_first| {
            let slot = EffectSlot::new(scheduler, tx, yield_first);
            let mut present: Option<bool> = None;
            move |state: S| {
                let next = query(&state);
                if present == Some(next.is_some()) {
                    return;
                }
                present = Some(next.is_some());
                slot.replace(next.map(|q| effects(q)));
            }
        })
    })
}

/// Run one effect per distinct query value, comparing with `are_equal`.
///
/// The effect restarts whenever the query changes: on presence transitions
/// and whenever `are_equal(previous, next)` is false.
pub fn react_with<S, Q, M, QF, EQ, EF>(query: QF, are_equal: EQ, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    Q: Clone + Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> Option<Q> + Send + Sync + 'static,
    EQ: Fn(&Q, &Q) -> bool + Send + Sync + 'static,
    EF: Fn(Q) -> MutationStream<M> + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let are_equal = Arc::new(are_equal);
    let effects = Arc::new(effects);
    feedback(move |ctx: StateContext<S>| {
        let query = query.clone();
        let are_equal = are_equal.clone();
        let effects = effects.clone();
        reconciler(ctx, move |scheduler, tx, yield_first| {
            let slot = EffectSlot::new(scheduler, tx, yield_first);
            let mut last: Option<Option<Q>> = None;
            move |state: S| {
                let next = query(&state);
                let unchanged = match (&last, &next) {
                    (Some(None), None) => true,
                    (Some(Some(previous)), Some(next)) => are_equal(previous, next),
                    _ => false,
                };
                if unchanged {
                    return;
                }
                slot.replace(next.clone().map(|q| effects(q)));
                last = Some(next);
            }
        })
    })
}

/// [`react_with`] using the query's own equality.
pub fn react_equatable<S, Q, M, QF, EF>(query: QF, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    Q: Clone + PartialEq + Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> Option<Q> + Send + Sync + 'static,
    EF: Fn(Q) -> MutationStream<M> + Send + Sync + 'static,
{
    react_with(query, |previous: &Q, next: &Q| previous == next, effects)
}

/// Run one effect per member of the query set.
///
/// New members start an effect, vanished members cancel theirs, and members
/// that stay in the set keep running untouched.
pub fn react_set<S, Q, M, QF, EF>(query: QF, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    Q: Eq + Hash + Clone + Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> HashSet<Q> + Send + Sync + 'static,
    EF: Fn(Q) -> MutationStream<M> + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let effects = Arc::new(effects);
    feedback(move |ctx: StateContext<S>| {
        let query = query.clone();
        let effects = effects.clone();
        reconciler(ctx, move |scheduler, tx, yield_first| {
            let factory: EffectFactory<Q, (), M> =
                Arc::new(move |member: Q, _: (), _: PayloadUpdates<()>| effects(member));
            let table = EffectLifetimeTable::new(scheduler, tx, yield_first, factory);
            move |state: S| {
                table.reconcile(query(&state).into_iter().map(|member| (member, ())).collect());
            }
        })
    })
}

/// Run one effect per identity, updating payloads in place.
///
/// `effects` receives the identity, its initial payload, and a stream of the
/// payloads that replace it later. An identity's effect is cancelled only
/// when the identity leaves the map.
pub fn react_requests<S, Id, P, M, QF, EF>(query: QF, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    Id: Eq + Hash + Clone + Send + 'static,
    P: Clone + PartialEq + Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> HashMap<Id, P> + Send + Sync + 'static,
    EF: Fn(Id, P, PayloadUpdates<P>) -> MutationStream<M> + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let factory: EffectFactory<Id, P, M> = Arc::new(effects);
    feedback(move |ctx: StateContext<S>| {
        let query = query.clone();
        let factory = factory.clone();
        reconciler(ctx, move |scheduler, tx, yield_first| {
            let table = EffectLifetimeTable::new(scheduler, tx, yield_first, factory);
            move |state: S| table.reconcile(query(&state))
        })
    })
}

/// Run one effect per child, keyed by the child's identity.
///
/// A child whose identity persists but whose value changes is pushed to its
/// effect's update stream. When several children share an identity, the
/// effect starts with the first of them and each later one that differs
/// arrives as an update, so the last occurrence is the one that sticks.
pub fn react_identified<S, C, M, QF, EF>(query: QF, effects: EF) -> Feedback<S, M>
where
    S: Send + 'static,
    C: Identifiable + Clone + PartialEq + Send + 'static,
    M: Send + 'static,
    QF: Fn(&S) -> Vec<C> + Send + Sync + 'static,
    EF: Fn(C, PayloadUpdates<C>) -> MutationStream<M> + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let factory: EffectFactory<C::Identity, C, M> =
        Arc::new(move |_: C::Identity, child: C, updates: PayloadUpdates<C>| {
            effects(child, updates)
        });
    feedback(move |ctx: StateContext<S>| {
        let query = query.clone();
        let factory = factory.clone();
        reconciler(ctx, move |scheduler, tx, yield_first| {
            let table = EffectLifetimeTable::new(scheduler, tx, yield_first, factory);
            move |state: S| {
                for pass in identity_passes(query(&state)) {
                    table.reconcile(pass);
                }
            }
        })
    })
}

/// Split `children` into the successive identity maps to reconcile.
///
/// The first map holds the first occurrence of every identity. Each later
/// duplicate that differs from the current value of its identity yields one
/// more map with that child swapped in. There is always at least one map.
fn identity_passes<C>(children: Vec<C>) -> Vec<HashMap<C::Identity, C>>
where
    C: Identifiable + Clone + PartialEq,
{
    let mut current: HashMap<C::Identity, C> = HashMap::with_capacity(children.len());
    let mut duplicates = Vec::new();
    for child in children {
        let identity = child.identity();
        if current.contains_key(&identity) {
            duplicates.push((identity, child));
        } else {
            current.insert(identity, child);
        }
    }

    let mut passes = Vec::with_capacity(duplicates.len() + 1);
    for (identity, child) in duplicates {
        if current.get(&identity) != Some(&child) {
            passes.push(current.clone());
            current.insert(identity, child);
        }
    }
    passes.push(current);
    passes
}
