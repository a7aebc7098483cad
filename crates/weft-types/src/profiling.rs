//! Lightweight wall-clock profiling timers.
//!
//! A [`ProfilingTimer`] measures either a single span (`end_timing`) or
//! the sum of several spans within a frame (`end_timing_additive`), and
//! carries a display alias for profiler overlays.

use std::time::{Duration, Instant};

/// A named, resettable stopwatch.
#[derive(Debug, Clone)]
pub struct ProfilingTimer {
    alias: String,
    started: Option<Instant>,
    total: Duration,
}

impl ProfilingTimer {
    /// Creates a stopped timer with the given alias.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            started: None,
            total: Duration::ZERO,
        }
    }

    /// Starts (or restarts) the current span.
    pub fn begin_timing(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Ends the current span, replacing the accumulated total.
    pub fn end_timing(&mut self) {
        if let Some(start) = self.started.take() {
            self.total = start.elapsed();
        }
    }

    /// Ends the current span, adding it to the accumulated total.
    pub fn end_timing_additive(&mut self) {
        if let Some(start) = self.started.take() {
            self.total += start.elapsed();
        }
    }

    /// Clears the accumulated total (start of an additive frame).
    pub fn reset_total(&mut self) {
        self.total = Duration::ZERO;
    }

    /// Accumulated time in milliseconds.
    pub fn total_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1000.0
    }

    /// Accumulated time as a `Duration`.
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = alias.into();
    }
}

impl Default for ProfilingTimer {
    fn default() -> Self {
        Self::new("")
    }
}
