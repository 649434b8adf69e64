//! Property test strategies for feedback loops
//!
//! Strategies for the shapes the loop's properties are stated over: timed
//! mutation scripts, sequences of query sets and payload histories.

use proptest::collection::{btree_set, hash_set, vec};
use proptest::prelude::*;
use std::collections::HashSet;

// Re-export proptest for convenience
pub use proptest;

/// Strategy for a timed mutation script: `(time_ms, mutation)` pairs sorted by time.
///
/// Times are distinct so the arrival order of two scripts is unambiguous.
///
/// # Example
///
/// ```rust
/// use feedloop_testkit::strategies::arb_script;
/// use proptest::prelude::*;
///
/// proptest! {
///     #[test]
///     fn scripts_are_sorted(script in arb_script(0..100i32, 8)) {
///         prop_assert!(script.windows(2).all(|w| w[0].0 < w[1].0));
///     }
/// }
/// ```
pub fn arb_script<M: std::fmt::Debug + Clone>(
    mutation: impl Strategy<Value = M> + Clone,
    max_len: usize,
) -> impl Strategy<Value = Vec<(u64, M)>> {
    btree_set(1u64..10_000, 0..=max_len).prop_flat_map(move |times| {
        let len = times.len();
        vec(mutation.clone(), len).prop_map(move |mutations| {
            times.iter().copied().zip(mutations).collect::<Vec<_>>()
        })
    })
}

/// Strategy for a history of query sets drawn from a small universe.
///
/// The small universe makes members reappear, vanish and persist across
/// consecutive sets.
pub fn arb_set_history(max_len: usize) -> impl Strategy<Value = Vec<HashSet<u8>>> {
    vec(hash_set(0u8..6, 0..4), 1..=max_len)
}

/// Strategy for a payload history of one identity.
///
/// Consecutive repeats are likely so "unchanged payload" is exercised.
pub fn arb_payload_history(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    vec(0u8..3, 1..=max_len)
}

/// Number of changes between consecutive entries of `history`.
pub fn distinct_transitions<T: PartialEq>(history: &[T]) -> usize {
    history
        .iter()
        .zip(history.iter().skip(1))
        .filter(|(previous, next)| previous != next)
        .count()
}
