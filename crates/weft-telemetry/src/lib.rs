//! # weft-telemetry
//!
//! Event bus for simulation telemetry. The engine emits structured events
//! (frame timing, solver convergence, degenerate elements, resets) that
//! pluggable sinks consume: the `tracing` log, an in-memory buffer, or
//! anything implementing [`EventSink`].

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, SharedEvents, TracingSink, VecSink};
