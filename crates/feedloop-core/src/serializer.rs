//! Single-queue mutation serializer
//!
//! `MutationSerializer<T>` owns a value and applies mutations to it one at a
//! time, in call order, without ever running two mutations concurrently.
//!
//! The first caller to find the serializer idle becomes the *drainer*: it runs
//! its own mutation in-line and then keeps running whatever was queued while it
//! was busy (including mutations scheduled from inside a running mutation).
//! Every other caller just appends to the queue and returns. Reentrant
//! scheduling therefore turns into iteration on the drainer's stack instead of
//! recursion.
//!
//! # Blocking Lock Usage
//!
//! Two `parking_lot::Mutex`es are used:
//! 1. `queue` guards the pending list and the draining flag; it is held only for
//!    O(1) push/pop and never while user code runs
//! 2. `value` is held by the drainer while a mutation runs; only the drainer
//!    ever locks it, so it is never contended
//!
//! A mutation that schedules another mutation only touches `queue`, so
//! reentrant calls cannot deadlock.

use parking_lot::Mutex;
use std::collections::VecDeque;

type Mutation<T> = Box<dyn FnOnce(&mut T) + Send>;

/// How a call to [`MutationSerializer::run`] was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The caller drained the queue: its mutation (and anything queued behind
    /// it) ran before `run` returned.
    Executed,
    /// Another drainer is active; the mutation was queued and will run on that
    /// drainer's loop.
    Enqueued,
}

struct PendingQueue<T> {
    pending: VecDeque<Mutation<T>>,
    draining: bool,
}

/// Serializes in-place mutation of an owned value.
pub struct MutationSerializer<T> {
    queue: Mutex<PendingQueue<T>>,
    value: Mutex<T>,
}

impl<T> MutationSerializer<T> {
    /// Create a serializer owning `value`.
    pub fn new(value: T) -> Self {
        Self {
            queue: Mutex::new(PendingQueue {
                pending: VecDeque::new(),
                draining: false,
            }),
            value: Mutex::new(value),
        }
    }

    /// Schedule `mutate` for exclusive application to the owned value.
    ///
    /// If no mutation is executing, `mutate` runs before this call returns,
    /// followed by every mutation queued in the meantime. Otherwise it is
    /// appended to the queue and runs on the active drainer.
    ///
    /// Mutations never interleave: each one runs to completion before the next
    /// starts. A panic inside `mutate` is not a completed mutation. It
    /// propagates to the caller that was draining, and whatever `mutate` wrote
    /// before panicking is not rolled back. Mutations queued behind it keep
    /// their order and run on the next call.
    pub fn run<F>(&self, mutate: F) -> Dispatch
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let Some(mut current) = self.begin(Box::new(mutate)) else {
            return Dispatch::Enqueued;
        };

        let _reset = DrainGuard { serializer: self };
        loop {
            {
                let mut value = self.value.lock();
                current(&mut value);
            }
            match self.next() {
                Some(next) => current = next,
                None => return Dispatch::Executed,
            }
        }
    }

    /// Whether some caller is currently draining the queue.
    pub fn is_draining(&self) -> bool {
        self.queue.lock().draining
    }

    /// Number of mutations waiting behind the one currently executing.
    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Consume the serializer and return the owned value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn begin(&self, mutate: Mutation<T>) -> Option<Mutation<T>> {
        let mut queue = self.queue.lock();
        queue.pending.push_back(mutate);
        if queue.draining {
            return None;
        }
        queue.draining = true;
        queue.pending.pop_front()
    }

    fn next(&self) -> Option<Mutation<T>> {
        let mut queue = self.queue.lock();
        let next = queue.pending.pop_front();
        if next.is_none() {
            queue.draining = false;
        }
        next
    }
}

impl<T: Default> Default for MutationSerializer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for MutationSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.lock();
        f.debug_struct("MutationSerializer")
            .field("draining", &queue.draining)
            .field("pending", &queue.pending.len())
            .finish_non_exhaustive()
    }
}

/// Releases the draining flag if a mutation unwinds.
struct DrainGuard<'a, T> {
    serializer: &'a MutationSerializer<T>,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.serializer.queue.lock().draining = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().push(entry.into());
    }

    #[test]
    fn idle_call_executes_inline() {
        let serializer = MutationSerializer::new(0u32);
        assert_eq!(serializer.run(|v| *v += 1), Dispatch::Executed);
        assert_eq!(serializer.run(|v| *v += 2), Dispatch::Executed);
        assert!(!serializer.is_draining());
        assert_eq!(serializer.into_inner(), 3);
    }

    #[test]
    fn reentrant_calls_run_after_current_mutation() {
        let serializer = Arc::new(MutationSerializer::new(()));
        let log: Log = Arc::default();

        let (s, l) = (serializer.clone(), log.clone());
        let dispatch = serializer.run(move |_| {
            push(&l, "outer:start");

            let l1 = l.clone();
            assert_eq!(
                s.run(move |_| push(&l1, "first")),
                Dispatch::Enqueued
            );

            let (s2, l2) = (s.clone(), l.clone());
            s.run(move |_| {
                push(&l2, "second");
                let l3 = l2.clone();
                s2.run(move |_| push(&l3, "third"));
            });

            push(&l, "outer:end");
        });

        assert_eq!(dispatch, Dispatch::Executed);
        assert_eq!(
            *log.lock(),
            vec!["outer:start", "outer:end", "first", "second", "third"]
        );
        assert_eq!(serializer.pending(), 0);
    }

    fn chain(serializer: Arc<MutationSerializer<u64>>, remaining: u32) {
        if remaining == 0 {
            return;
        }
        let next = serializer.clone();
        serializer.run(move |v| {
            *v += 1;
            chain(next, remaining - 1);
        });
    }

    #[test]
    fn deep_reentrancy_does_not_grow_the_stack() {
        let serializer = Arc::new(MutationSerializer::new(0u64));
        chain(serializer.clone(), 200_000);

        let serializer = Arc::try_unwrap(serializer).unwrap();
        assert_eq!(serializer.into_inner(), 200_000);
    }

    #[test]
    fn concurrent_callers_never_overlap() {
        let serializer = Arc::new(MutationSerializer::new(Vec::<usize>::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let executed = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for thread in 0..8 {
                let serializer = serializer.clone();
                let active = active.clone();
                let executed = executed.clone();
                scope.spawn(move || {
                    for i in 0..500 {
                        let active = active.clone();
                        let executed = executed.clone();
                        serializer.run(move |seen| {
                            assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                            seen.push(thread * 1_000 + i);
                            executed.fetch_add(1, Ordering::SeqCst);
                            active.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                });
            }
        });

        assert_eq!(executed.load(Ordering::SeqCst), 8 * 500);
        let seen = Arc::try_unwrap(serializer).unwrap().into_inner();
        assert_eq!(seen.len(), 8 * 500);

        // Per-thread submission order is preserved.
        for thread in 0..8 {
            let own: Vec<_> = seen
                .iter()
                .filter(|v| **v / 1_000 == thread)
                .map(|v| v % 1_000)
                .collect();
            assert_eq!(own, (0..500).collect::<Vec<_>>());
        }
    }

    #[test]
    fn panic_leaves_queue_consistent() {
        let serializer = Arc::new(MutationSerializer::new(Vec::<&'static str>::new()));

        let s = serializer.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            serializer.run(move |log| {
                log.push("before panic");
                s.run(|log| log.push("queued behind panic"));
                panic!("mutation failed");
            });
        }));
        assert!(result.is_err());
        assert!(!serializer.is_draining());
        assert_eq!(serializer.pending(), 1);

        assert_eq!(serializer.run(|log| log.push("after")), Dispatch::Executed);
        let log = Arc::try_unwrap(serializer).unwrap().into_inner();
        assert_eq!(log, vec!["before panic", "queued behind panic", "after"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn nested_schedules_keep_call_order(children in prop::collection::vec(0usize..5, 0..20)) {
                let serializer = Arc::new(MutationSerializer::new(Vec::<(usize, Option<usize>)>::new()));

                for (parent, count) in children.iter().copied().enumerate() {
                    let s = serializer.clone();
                    serializer.run(move |log| {
                        log.push((parent, None));
                        for child in 0..count {
                            s.run(move |log| log.push((parent, Some(child))));
                        }
                    });
                }

                let expected: Vec<_> = children
                    .iter()
                    .enumerate()
                    .flat_map(|(parent, count)| {
                        std::iter::once((parent, None))
                            .chain((0..*count).map(move |child| (parent, Some(child))))
                    })
                    .collect();
                let log = Arc::try_unwrap(serializer).ok().unwrap().into_inner();
                prop_assert_eq!(log, expected);
            }
        }
    }
}
