//! Effect identity and liveness tokens

use std::fmt;
use std::hash::Hash;

/// A value that carries a stable identity distinct from its payload.
///
/// Two values with the same identity describe the same effect; a change in
/// payload for an existing identity is an update, not a restart.
pub trait Identifiable {
    /// Identity type used as the effect key.
    type Identity: Eq + Hash + Clone + Send + Sync + 'static;

    /// The identity of this value.
    fn identity(&self) -> Self::Identity;
}

/// Marker for one incarnation of an effect.
///
/// Tokens are issued from a monotonically increasing counter, so a token is
/// never reused within the table or slot that issued it. A completion carrying
/// a token that no longer matches the current record is stale and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LivenessToken(u64);

impl LivenessToken {
    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LivenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lt#{}", self.0)
    }
}

/// Issues fresh [`LivenessToken`]s.
#[derive(Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    /// Create a source starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token.
    pub fn issue(&mut self) -> LivenessToken {
        let token = LivenessToken(self.next);
        self.next += 1;
        token
    }

    /// Number of tokens issued so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_ordered() {
        let mut source = TokenSource::new();
        let first = source.issue();
        let second = source.issue();

        assert_ne!(first, second);
        assert!(first < second);
        assert_eq!(source.issued(), 2);
        assert_eq!(second.to_string(), "lt#1");
    }
}
