//! Feedloop Core - foundation for state-feedback loops
//!
//! This crate holds the runtime-agnostic pieces of feedloop. Nothing here spawns
//! tasks or depends on a concrete async runtime; `feedloop-runtime` builds the
//! driver loop and the `react_*` combinators on top of these types.
//!
//! # Contents
//!
//! - [`FeedbackError`]: the single error type carried on mutation streams
//! - [`SystemConfig`]: tracing label and effect scheduling knobs
//! - [`MutationSerializer`]: trampoline that serializes mutation of a shared value
//! - [`Scheduler`] / [`TaskHandle`]: the only way work is ever spawned
//! - [`Identifiable`] / [`LivenessToken`]: effect identity and incarnation markers
//! - [`Reducer`]: rule-based reducer builder
//! - [`stream`]: `MutationStream` alias and effect constructors
//!
//! # Model
//!
//! ```text
//! state ──► feedback sources ──► mutations ──► reducer ──► state
//!   ▲                                                        │
//!   └────────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Loop configuration
pub mod config;

/// Single-queue mutation serializer
pub mod serializer;

/// Effect identity and liveness tokens
pub mod identity;

/// Scheduler abstraction and task handles
pub mod scheduler;

/// Rule-based reducer builder
pub mod reducer;

/// Mutation streams and effect constructors
pub mod stream;

pub use config::SystemConfig;
pub use errors::{FeedbackError, Result};
pub use identity::{Identifiable, LivenessToken, TokenSource};
pub use reducer::Reducer;
pub use scheduler::{Scheduler, SharedScheduler, TaskHandle};
pub use serializer::{Dispatch, MutationSerializer};
pub use stream::MutationStream;
