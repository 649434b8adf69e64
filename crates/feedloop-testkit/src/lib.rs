//! Feedloop Testing Infrastructure
//!
//! Shared helpers for driving feedback loops deterministically: a
//! virtual-clock scheduler, timestamped recorders, effect probes and manual
//! effects, stream collection helpers and proptest strategies.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! Tests run on tokio's paused clock, so time only moves when every task is
//! idle and timing assertions are exact:
//!
//! ```rust,no_run
//! use feedloop_testkit::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn my_test() {
//!     let scheduler = VirtualScheduler::new();
//!     scheduler.advance(50).await;
//!     assert_eq!(scheduler.now_ms(), 50);
//! }
//! ```

pub mod collect;
pub mod effects;
pub mod recorder;
pub mod scheduler;
pub mod strategies;
pub mod tracing_init;

pub use collect::*;
pub use effects::*;
pub use recorder::*;
pub use scheduler::*;
pub use tracing_init::init_test_tracing;
