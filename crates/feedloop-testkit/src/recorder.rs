//! Timestamped event recording

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// One recorded value and the virtual time it was recorded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded<E> {
    /// Milliseconds since the recorder was created.
    pub time_ms: u64,
    /// The recorded value.
    pub value: E,
}

/// Shared, clonable log of values with virtual timestamps.
#[derive(Debug)]
pub struct Recorder<E> {
    origin: Instant,
    events: Arc<Mutex<Vec<Recorded<E>>>>,
}

impl<E> Clone for Recorder<E> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            events: self.events.clone(),
        }
    }
}

impl<E: Clone> Recorder<E> {
    /// Empty recorder with its clock at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append `value` at the current virtual time.
    pub fn record(&self, value: E) {
        let time_ms = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.events.lock().push(Recorded { time_ms, value });
    }

    /// Every recorded event, in order.
    pub fn events(&self) -> Vec<Recorded<E>> {
        self.events.lock().clone()
    }

    /// Every recorded value, in order, without timestamps.
    pub fn values(&self) -> Vec<E> {
        self.events.lock().iter().map(|e| e.value.clone()).collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl<E: Clone> Default for Recorder<E> {
    fn default() -> Self {
        Self::new()
    }
}
