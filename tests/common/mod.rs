//! Shared test utilities for logagg integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Timing-sensitive harnesses run with
//! `#[tokio::test(start_paused = true)]` so they stay deterministic.

pub mod assertions;
pub mod builders;
pub mod sinks;

pub use assertions::*;
pub use builders::*;
pub use sinks::*;
