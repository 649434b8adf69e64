//! Feedloop Runtime - driver loop and effect combinators
//!
//! Builds the running machinery on top of `feedloop-core`:
//!
//! - [`system`] / [`System`]: the driver task that folds mutations into state
//! - [`react_optional`], [`react_equatable`], [`react_with`], [`react_set`],
//!   [`react_requests`], [`react_identified`]: query-driven effect feedbacks
//! - [`bind`] / [`Bindings`]: feedbacks for outside collaborators
//! - [`EffectLifetimeTable`] / [`EffectSlot`]: effect bookkeeping with
//!   liveness tokens
//! - [`TokioScheduler`]: the tokio implementation of `Scheduler`
//!
//! # Example
//!
//! ```no_run
//! use feedloop_runtime::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> feedloop_core::Result<()> {
//! let scheduler: SharedScheduler = Arc::new(TokioScheduler::current()?);
//! let greet = react_equatable(
//!     |state: &String| (state == "initial").then_some(()),
//!     |_| stream::just("_a".to_string()),
//! );
//! let greeting = system(
//!     "initial".to_string(),
//!     |state: String, suffix: String| state + &suffix,
//!     scheduler,
//!     vec![greet],
//! );
//! let mut states = greeting.start();
//! while let Some(state) = states.next().await {
//!     println!("{}", state?);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod bind;
mod broadcast;
mod context;
mod feedback;
mod lifetime;
mod react;
mod slot;
mod system;
mod tokio_scheduler;

pub use bind::{bind, bind_weak, drive, Bindings};
pub use broadcast::{StateBroadcast, StateStream};
pub use context::StateContext;
pub use feedback::{feedback, Feedback};
pub use lifetime::{EffectFactory, EffectLifetimeTable, PayloadUpdates};
pub use react::{
    react_equatable, react_identified, react_optional, react_requests, react_set, react_with,
};
pub use slot::EffectSlot;
pub use system::{system, try_system, System, SystemStream};
pub use tokio_scheduler::TokioScheduler;

/// Everything needed to describe and run a loop.
pub mod prelude {
    pub use crate::{
        bind, bind_weak, drive, feedback, react_equatable, react_identified, react_optional,
        react_requests, react_set, react_with, system, try_system, Bindings, Feedback,
        PayloadUpdates, StateContext, SystemStream, TokioScheduler,
    };
    pub use feedloop_core::{
        stream, FeedbackError, Identifiable, MutationStream, Reducer, SharedScheduler,
        SystemConfig,
    };
    pub use futures::StreamExt;
}
