//! Collecting from streams under the virtual clock

use feedloop_core::Result;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Collect every item `stream` yields within `window` of virtual time.
///
/// Stops early if the stream ends.
pub async fn collect_for<St>(stream: &mut St, window: Duration) -> Vec<St::Item>
where
    St: Stream + Unpin,
{
    let deadline = Instant::now() + window;
    let mut items = Vec::new();
    while let Ok(Some(item)) = timeout_at(deadline, stream.next()).await {
        items.push(item);
    }
    items
}

/// Collect the first `count` items, giving up after `limit` of virtual time.
pub async fn collect_n<St>(stream: &mut St, count: usize, limit: Duration) -> Vec<St::Item>
where
    St: Stream + Unpin,
{
    let deadline = Instant::now() + limit;
    let mut items = Vec::with_capacity(count);
    while items.len() < count {
        match timeout_at(deadline, stream.next()).await {
            Ok(Some(item)) => items.push(item),
            _ => break,
        }
    }
    items
}

/// Collect states for `window`, failing on the first error item.
pub async fn collect_states<S, St>(stream: &mut St, window: Duration) -> Result<Vec<S>>
where
    St: Stream<Item = Result<S>> + Unpin,
{
    collect_for(stream, window).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedloop_core::FeedbackError;

    #[tokio::test(start_paused = true)]
    async fn collect_for_stops_at_window() {
        let mut ticks = futures::stream::iter(0..)
            .then(|n| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                n
            })
            .boxed();

        let items = collect_for(&mut ticks, Duration::from_millis(35)).await;
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn collect_n_stops_at_count() {
        let mut numbers = futures::stream::iter(1..=10);
        let items = collect_n(&mut numbers, 3, Duration::from_secs(1)).await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn collect_states_surfaces_error() {
        let mut states = futures::stream::iter([Ok(1), Err(FeedbackError::effect("x"))]);
        let result = collect_states(&mut states, Duration::from_secs(1)).await;
        assert_eq!(result, Err(FeedbackError::effect("x")));
    }
}
