//! Mutation streams and effect constructors
//!
//! Feedback sources and effects both produce a [`MutationStream`]: a boxed,
//! `Send` stream of `Result<M, FeedbackError>`. An `Err` item terminates the
//! feedback source that produced it.

use crate::errors::{FeedbackError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::Future;

/// Boxed stream of mutations produced by an effect or feedback source.
pub type MutationStream<M> = BoxStream<'static, Result<M>>;

/// A stream that emits `mutation` once and completes.
pub fn just<M: Send + 'static>(mutation: M) -> MutationStream<M> {
    stream::once(async move { Ok(mutation) }).boxed()
}

/// A stream that completes without emitting anything.
pub fn empty<M: Send + 'static>() -> MutationStream<M> {
    stream::empty().boxed()
}

/// A stream that never emits and never completes.
pub fn never<M: Send + 'static>() -> MutationStream<M> {
    stream::pending().boxed()
}

/// A stream that fails immediately with `error`.
pub fn fail<M: Send + 'static>(error: FeedbackError) -> MutationStream<M> {
    stream::once(async move { Err(error) }).boxed()
}

/// Lift a fallible future into a single-item stream.
pub fn from_future<M, F>(future: F) -> MutationStream<M>
where
    M: Send + 'static,
    F: Future<Output = Result<M>> + Send + 'static,
{
    stream::once(future).boxed()
}

/// Lift an infallible stream of mutations.
pub fn from_stream<M, St>(mutations: St) -> MutationStream<M>
where
    M: Send + 'static,
    St: Stream<Item = M> + Send + 'static,
{
    mutations.map(Ok).boxed()
}

/// Isolate an effect from its own failures.
///
/// Errors are mapped through `on_error`; `Some(m)` is emitted as a regular
/// mutation and `None` drops the error. In both cases the effect stream ends
/// after the first error, and nothing fatal reaches the system.
pub fn recover<M, F>(effect: MutationStream<M>, on_error: F) -> MutationStream<M>
where
    M: Send + 'static,
    F: Fn(FeedbackError) -> Option<M> + Send + 'static,
{
    effect
        .scan(false, move |failed, item| {
            if *failed {
                return futures::future::ready(None);
            }
            let next = match item {
                Ok(mutation) => Some(Some(Ok(mutation))),
                Err(error) => {
                    *failed = true;
                    Some(on_error(error).map(Ok))
                }
            };
            futures::future::ready(next)
        })
        .filter_map(futures::future::ready)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn just_emits_once() {
        let items: Vec<_> = block_on(just(5).collect());
        assert_eq!(items, vec![Ok(5)]);
    }

    #[test]
    fn from_future_emits_its_output() {
        let ready: Vec<_> = block_on(from_future(async { Ok(7) }).collect());
        assert_eq!(ready, vec![Ok(7)]);

        let failed: Vec<Result<u8>> =
            block_on(from_future(async { Err(FeedbackError::effect("timeout")) }).collect());
        assert_eq!(failed, vec![Err(FeedbackError::effect("timeout"))]);
    }

    #[test]
    fn empty_completes() {
        let items: Vec<Result<u8>> = block_on(empty().collect());
        assert!(items.is_empty());
    }

    #[test]
    fn fail_emits_error() {
        let items: Vec<Result<u8>> = block_on(fail(FeedbackError::effect("nope")).collect());
        assert_eq!(items, vec![Err(FeedbackError::effect("nope"))]);
    }

    #[test]
    fn from_stream_wraps_items() {
        let items: Vec<_> = block_on(from_stream(stream::iter([1, 2, 3])).collect());
        assert_eq!(items, vec![Ok(1), Ok(2), Ok(3)]);
    }

    #[test]
    fn recover_maps_error_and_stops() {
        let effect = stream::iter([
            Ok("a".to_string()),
            Err(FeedbackError::effect("offline")),
            Ok("unreachable".to_string()),
        ])
        .boxed();

        let recovered = recover(effect, |e| Some(format!("recovered: {}", e.message())));
        let items: Vec<_> = block_on(recovered.collect());
        assert_eq!(
            items,
            vec![Ok("a".to_string()), Ok("recovered: offline".to_string())]
        );
    }

    #[test]
    fn recover_can_drop_errors() {
        let effect = stream::iter([Ok(1), Err(FeedbackError::effect("x")), Ok(2)]).boxed();
        let items: Vec<_> = block_on(recover(effect, |_| None).collect());
        assert_eq!(items, vec![Ok(1)]);
    }
}
