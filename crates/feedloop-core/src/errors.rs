//! Unified error type for feedback loops
//!
//! Every mutation stream carries `Result<M, FeedbackError>`. An `Err` item is
//! terminal: it stops the feedback source that produced it and, once it reaches
//! the driver, the whole system. Cancellation is never reported as an error.

/// Error surfaced on a mutation stream or by configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    /// An effect started by a `react_*` combinator failed
    #[error("Effect failed: {message}")]
    Effect {
        /// Error message describing the effect failure
        message: String,
    },

    /// A hand-written feedback source failed
    #[error("Feedback source failed: {message}")]
    Feedback {
        /// Error message describing the feedback failure
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Internal runtime error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl FeedbackError {
    /// Create an effect error
    pub fn effect(message: impl Into<String>) -> Self {
        Self::Effect {
            message: message.into(),
        }
    }

    /// Create a feedback source error
    pub fn feedback(message: impl Into<String>) -> Self {
        Self::Feedback {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The message carried by this error, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Effect { message }
            | Self::Feedback { message }
            | Self::Config { message }
            | Self::Internal { message } => message,
        }
    }
}

/// Result alias used throughout feedloop.
pub type Result<T> = std::result::Result<T, FeedbackError>;
