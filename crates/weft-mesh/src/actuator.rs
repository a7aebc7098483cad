//! Scripted overrides of node state.
//!
//! Actuators run before every integrator sub-step, in list order, and
//! write directly into the position and velocity arrays. They are plain
//! data so a [`crate::GeneratorOutput`] stays cloneable and comparable.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A per-sub-step override applied as `(elapsed, x, v)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Actuator {
    /// Drives `node` from `origin` at a constant `velocity` for `duration`
    /// seconds, then holds it in place (zero velocity).
    LinearDrive {
        node: u32,
        origin: Vec3,
        velocity: Vec3,
        duration: f32,
    },
}

impl Actuator {
    /// Node this actuator writes to.
    pub fn node(&self) -> u32 {
        match self {
            Actuator::LinearDrive { node, .. } => *node,
        }
    }

    /// Applies the override at simulation time `elapsed`.
    ///
    /// Out-of-range nodes are ignored; generator output is validated
    /// before any actuator runs.
    pub fn apply(&self, elapsed: f32, x: &mut [Vec3], v: &mut [Vec3]) {
        match *self {
            Actuator::LinearDrive {
                node,
                origin,
                velocity,
                duration,
            } => {
                let i = node as usize;
                if i >= x.len() || i >= v.len() {
                    return;
                }
                if elapsed < duration {
                    x[i] = origin + velocity * elapsed;
                    v[i] = velocity;
                } else {
                    v[i] = Vec3::ZERO;
                }
            }
        }
    }
}
