//! # weft-types
//!
//! Shared error types, profiling timers, and physical constants
//! for the Weft cloth simulation engine.
//!
//! This crate has zero domain logic. It defines the vocabulary
//! that all other Weft crates share.

pub mod constants;
pub mod error;
pub mod profiling;

pub use error::{WeftError, WeftResult};
pub use profiling::ProfilingTimer;
