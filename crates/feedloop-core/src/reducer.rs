//! Rule-based reducer builder
//!
//! A [`Reducer`] is a list of `(event, transform)` rules. Reducing applies the
//! first rule registered for the incoming event whose transform actually
//! changes the state; if none does, the state is returned unchanged.
//!
//! ```rust
//! use feedloop_core::Reducer;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! enum Event { Increment, Reset }
//!
//! let reducer = Reducer::new()
//!     .accept(Event::Increment, |n: i32| n + 1)
//!     .accept(Event::Reset, |_| 0);
//!
//! assert_eq!(reducer.reduce(41, &Event::Increment), 42);
//! assert_eq!(reducer.reduce(42, &Event::Reset), 0);
//! ```

use std::sync::Arc;

type Transform<S> = Arc<dyn Fn(S) -> S + Send + Sync>;

/// Reducer assembled from per-event transition rules.
pub struct Reducer<S, E> {
    rules: Vec<(E, Transform<S>)>,
}

impl<S, E> Reducer<S, E>
where
    S: Clone + PartialEq,
    E: PartialEq,
{
    /// Create a reducer with no rules (every event is a no-op).
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register `transform` for `event`.
    pub fn accept<F>(mut self, event: E, transform: F) -> Self
    where
        F: Fn(S) -> S + Send + Sync + 'static,
    {
        self.rules.push((event, Arc::new(transform)));
        self
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fold `event` into `state`.
    pub fn reduce(&self, state: S, event: &E) -> S {
        for (_, transform) in self.rules.iter().filter(|(e, _)| e == event) {
            let next = transform(state.clone());
            if next != state {
                return next;
            }
        }
        state
    }

    /// Convert into a reducer function usable by the system driver.
    pub fn into_fn(self) -> impl Fn(S, E) -> S + Send + Sync + 'static
    where
        S: 'static,
        E: Send + Sync + 'static,
    {
        move |state, event| self.reduce(state, &event)
    }
}

impl<S, E> Default for Reducer<S, E>
where
    S: Clone + PartialEq,
    E: PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Toggle {
        On,
        Off,
        Flip,
    }

    fn reducer() -> Reducer<bool, Toggle> {
        Reducer::new()
            .accept(Toggle::On, |_| true)
            .accept(Toggle::Off, |_| false)
            .accept(Toggle::Flip, |s| !s)
    }

    #[test]
    fn unknown_event_keeps_state() {
        let reducer: Reducer<u8, Toggle> = Reducer::new();
        assert!(reducer.is_empty());
        assert_eq!(reducer.reduce(7, &Toggle::Flip), 7);
    }

    #[test]
    fn matching_rule_applies() {
        let reducer = reducer();
        assert_eq!(reducer.len(), 3);
        assert!(reducer.reduce(false, &Toggle::On));
        assert!(!reducer.reduce(true, &Toggle::Off));
        assert!(reducer.reduce(false, &Toggle::Flip));
    }

    #[test]
    fn first_changing_rule_wins() {
        let reducer = Reducer::new()
            .accept("bump", |n: i32| n)
            .accept("bump", |n| n + 10)
            .accept("bump", |n| n + 100);

        assert_eq!(reducer.reduce(1, &"bump"), 11);
    }

    #[test]
    fn into_fn_folds_events() {
        let reduce = reducer().into_fn();
        let state = [Toggle::On, Toggle::Flip, Toggle::Flip]
            .into_iter()
            .fold(false, |s, e| reduce(s, e));
        assert!(state);
    }
}
