//! Simulation event types.
//!
//! Lightweight value types tagged with the frame index they belong to.
//! A frame is one `update_simulation` call, which may run any number of
//! fixed sub-steps.

use serde::{Deserialize, Serialize};

/// A simulation event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Frame number (0-indexed, restarts on reset).
    pub frame: u32,
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// The simulation was (re)initialized from generator output.
    Reset {
        /// Variant name (`fe_c0`, `pbd`, ...).
        simulation: String,
        nodes: u32,
        tangents: u32,
        elements: u32,
    },

    /// A frame finished.
    FrameCompleted {
        /// Sub-steps taken this frame.
        sub_steps: u32,
        /// Simulation time after the frame (seconds).
        sim_time: f64,
        /// Wall-clock time spent in the frame (milliseconds).
        wall_time_ms: f64,
    },

    /// Worst linear-solve outcome of the frame.
    Convergence {
        iterations: u32,
        final_residual: f64,
        converged: bool,
    },

    /// A step failed on a collapsed or inverted element and was rolled back.
    DegenerateElement {
        element: u32,
        gauss_point: u32,
        area: f32,
    },

    /// A step failed for any other reason and was rolled back.
    StepFailed {
        message: String,
    },
}

impl SimulationEvent {
    pub fn new(frame: u32, kind: EventKind) -> Self {
        Self { frame, kind }
    }
}
