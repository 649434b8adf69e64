//! Optional-query combinator tests
//!
//! `react_optional` restarts only on presence transitions, `react_equatable`
//! also restarts on value changes. Both run at most one effect at a time.

#![allow(clippy::unwrap_used)]

use feedloop_core::stream;
use feedloop_runtime::{react_equatable, react_optional, react_with, system};
use feedloop_testkit::{collect_for, collect_states, scripted, EffectProbe, VirtualScheduler};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn replace(_: Option<u32>, next: Option<u32>) -> Option<u32> {
    next
}

#[tokio::test(start_paused = true)]
async fn optional_restarts_only_on_presence_change() {
    let scheduler = VirtualScheduler::new();
    let probe = EffectProbe::new();
    let tracked = probe.clone();
    let loop_ = system(
        None,
        replace,
        scheduler.shared(),
        vec![
            scripted(vec![(10, Some(1)), (20, Some(2)), (30, None), (40, Some(3))]),
            react_optional(
                |state: &Option<u32>| *state,
                move |q| tracked.track(q, stream::never()),
            ),
        ],
    );

    let mut states = loop_.start();
    let seen = collect_states(&mut states, Duration::from_millis(100)).await.unwrap();

    assert_eq!(seen, vec![None, Some(1), Some(2), None, Some(3)]);
    assert_eq!(probe.starts(&1), 1);
    assert_eq!(probe.starts(&2), 0);
    assert_eq!(probe.drops(&1), 1);
    assert_eq!(probe.starts(&3), 1);
    assert_eq!(probe.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn equatable_restarts_on_value_change_only() {
    let scheduler = VirtualScheduler::new();
    let probe = EffectProbe::new();
    let tracked = probe.clone();
    let loop_ = system(
        None,
        replace,
        scheduler.shared(),
        vec![
            scripted(vec![(10, Some(1)), (20, Some(1)), (30, Some(2)), (40, Some(2))]),
            react_equatable(
                |state: &Option<u32>| *state,
                move |q| tracked.track(q, stream::never()),
            ),
        ],
    );

    let mut states = loop_.start();
    let _ = collect_for(&mut states, Duration::from_millis(100)).await;

    assert_eq!(probe.starts(&1), 1);
    assert_eq!(probe.drops(&1), 1);
    assert_eq!(probe.starts(&2), 1);
    assert_eq!(probe.drops(&2), 0);
}

#[tokio::test(start_paused = true)]
async fn custom_equality_decides_restarts() {
    let scheduler = VirtualScheduler::new();
    let probe = EffectProbe::new();
    let tracked = probe.clone();
    let loop_ = system(
        None,
        replace,
        scheduler.shared(),
        vec![
            scripted(vec![(10, Some(11)), (20, Some(19)), (30, Some(21))]),
            // Same decade means same request.
            react_with(
                |state: &Option<u32>| *state,
                |previous: &u32, next: &u32| previous / 10 == next / 10,
                move |q| tracked.track(q, stream::never()),
            ),
        ],
    );

    let mut states = loop_.start();
    let _ = collect_for(&mut states, Duration::from_millis(100)).await;

    assert_eq!(probe.starts(&11), 1);
    assert_eq!(probe.starts(&19), 0);
    assert_eq!(probe.starts(&21), 1);
    assert_eq!(probe.drops(&11), 1);
}

#[tokio::test(start_paused = true)]
async fn effect_mutations_feed_back_into_state() {
    let scheduler = VirtualScheduler::new();
    // Count down to zero, one effect per step.
    let loop_ = system(
        3u32,
        |state: u32, step: u32| state - step,
        scheduler.shared(),
        vec![react_equatable(
            |state: &u32| (*state > 0).then_some(*state),
            |_| {
                futures::stream::once(async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(1)
                })
                .boxed()
            },
        )],
    );

    let mut states = loop_.start();
    let seen = collect_states(&mut states, Duration::from_millis(100)).await.unwrap();

    assert_eq!(seen, vec![3, 2, 1, 0]);
    assert_eq!(scheduler.now_ms(), 100);
}

#[tokio::test(start_paused = true)]
async fn start_then_cancel_in_one_turn_never_polls_effect() {
    let scheduler = VirtualScheduler::new();
    let polled = Arc::new(AtomicUsize::new(0));
    let counter = polled.clone();
    let loop_ = system(
        None,
        replace,
        scheduler.shared(),
        vec![
            // Both mutations arrive together; the query is present for one fold only.
            feedloop_runtime::feedback(|_| {
                futures::stream::iter([Ok(Some(1)), Ok(None)]).boxed()
            }),
            react_optional(
                |state: &Option<u32>| *state,
                move |_| {
                    let counter = counter.clone();
                    futures::stream::once(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    })
                    .boxed()
                },
            ),
        ],
    );

    let mut states = loop_.start();
    let seen = collect_states(&mut states, Duration::from_millis(50)).await.unwrap();

    assert_eq!(seen, vec![None, Some(1), None]);
    assert_eq!(polled.load(Ordering::SeqCst), 0);
}
