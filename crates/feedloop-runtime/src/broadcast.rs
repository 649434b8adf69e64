//! Replay-one state broadcast
//!
//! The driver owns a single [`StateBroadcast`]. Every feedback source gets its
//! own [`StateStream`] from it: the stream starts with the latest published
//! state and then sees every subsequent state, in publish order. Nothing is
//! coalesced, so a feedback source reacting to an exact intermediate state
//! never misses it.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for the subscriber list because publishing is a
//! non-blocking fan-out over unbounded senders and the lock is never held
//! across `.await` points.

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

struct BroadcastInner<S> {
    latest: Option<S>,
    subscribers: Vec<mpsc::UnboundedSender<S>>,
    closed: bool,
}

/// Fan-out of state values with replay of the latest one.
pub struct StateBroadcast<S> {
    inner: Arc<Mutex<BroadcastInner<S>>>,
}

impl<S: Clone + Send + 'static> StateBroadcast<S> {
    /// Create a broadcast seeded with `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BroadcastInner {
                latest: Some(initial),
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Subscribe; the stream immediately yields the latest state.
    ///
    /// Subscribing to a closed broadcast returns a stream that ends at once.
    pub fn subscribe(&self) -> StateStream<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.closed {
            if let Some(latest) = &inner.latest {
                // Receiver is alive here, send cannot fail.
                let _ = tx.send(latest.clone());
            }
            inner.subscribers.push(tx);
        }
        StateStream { rx }
    }

    /// Publish a new state to every live subscriber.
    pub fn publish(&self, state: S) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(state.clone()).is_ok());
        inner.latest = Some(state);
    }

    /// The most recently published state.
    pub fn latest(&self) -> Option<S> {
        self.inner.lock().latest.clone()
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }

    /// Close the broadcast: every stream ends and the latest state is cleared.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.latest = None;
        inner.subscribers.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<S> Clone for StateBroadcast<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// One observer's view of the state broadcast.
#[derive(Debug)]
pub struct StateStream<S> {
    rx: mpsc::UnboundedReceiver<S>,
}

impl<S> StateStream<S> {
    /// Wait for the next state; `None` once the broadcast is closed.
    pub async fn recv(&mut self) -> Option<S> {
        self.rx.recv().await
    }
}

impl<S> Stream for StateStream<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.rx.poll_recv(cx)
    }
}
