//! # weft-bench
//!
//! Benchmark suite for the Weft cloth engine.
//!
//! Scenarios pair a scene (flat drop or bend test) with a simulation
//! variant and an integration scheme. The runner drives a
//! [`weft_sim::Manager`] for a fixed number of frames and records timing,
//! solver and displacement metrics, exportable as CSV or JSON.

pub mod metrics;
pub mod runner;
pub mod scenarios;

pub use metrics::BenchmarkMetrics;
pub use runner::BenchmarkRunner;
pub use scenarios::{Scenario, ScenarioKind};
