//! Pluggable event sinks.

use std::sync::{Arc, Mutex};

use crate::events::{EventKind, SimulationEvent};

/// Trait for event consumers.
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &SimulationEvent);

    /// Called when the simulation ends.
    fn finalize(&mut self) {}

    /// Human-readable name for this sink.
    fn name(&self) -> &str;
}

/// Event buffer shared between a [`VecSink`] and whoever inspects it.
pub type SharedEvents = Arc<Mutex<Vec<SimulationEvent>>>;

/// Collects events in memory.
///
/// The buffer is shared, so events stay readable after the sink has been
/// boxed into an [`crate::EventBus`].
#[derive(Default)]
pub struct VecSink {
    events: SharedEvents,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the collected events.
    pub fn events(&self) -> SharedEvents {
        Arc::clone(&self.events)
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &SimulationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Logs events through `tracing`.
///
/// Failures go out at `warn`/`error`; routine events at `debug`.
#[derive(Debug, Default)]
pub struct TracingSink {
    handled: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &SimulationEvent) {
        self.handled += 1;
        match &event.kind {
            EventKind::DegenerateElement {
                element,
                gauss_point,
                area,
            } => tracing::error!(
                frame = event.frame,
                element,
                gauss_point,
                area,
                "degenerate element"
            ),
            EventKind::StepFailed { message } => {
                tracing::error!(frame = event.frame, %message, "step failed")
            }
            EventKind::Convergence {
                converged: false,
                iterations,
                final_residual,
            } => tracing::warn!(
                frame = event.frame,
                iterations,
                final_residual,
                "solver did not converge"
            ),
            kind => tracing::debug!(frame = event.frame, event = ?kind, "simulation_event"),
        }
    }

    fn finalize(&mut self) {
        tracing::debug!(events = self.handled, "tracing sink finalized");
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}
