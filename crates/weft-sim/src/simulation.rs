//! The simulation capability traits.
//!
//! Every variant (FE C0, FE C1, FE C1-alt, PBD) implements [`Simulation`],
//! which the integrator drives, and [`FieldQuery`], which external readers
//! use to sample the surface between nodes.
//!
//! ```text
//! sim.initialize(&output)?;
//! loop {
//!     let report = sim.step_simulation(h, gravity, &x, &v, &mut out_v)?;
//! }
//! ```

use glam::{Mat3, Vec3};
use weft_math::{Mpcg, SolveStats};
use weft_mesh::GeneratorOutput;
use weft_types::{ProfilingTimer, WeftResult};

/// Outcome of one `step_simulation` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Linear solve statistics (FE variants only).
    pub solver: Option<SolveStats>,
    /// Whether the integrator should commit the step. Always `true` today.
    pub valid_timestep: bool,
}

impl Default for StepReport {
    fn default() -> Self {
        Self {
            solver: None,
            valid_timestep: true,
        }
    }
}

/// Surface sampling at a barycentric point of an element.
///
/// `x` is the full DOF array (nodes, then tangents) the query reads.
pub trait FieldQuery {
    /// Number of elements the queries index into.
    fn element_count(&self) -> usize;

    /// World-space position at `gp`.
    fn vertex_ws_pos(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Vec3>;

    /// Local frame at `gp` as a rotation matrix. The FE variants return
    /// the material frame (columns: tangent x, tangent y, normal); PBD
    /// returns the blended rest-to-current rotation of the nearby triangles.
    fn vertex_rotation(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Mat3>;

    /// `(stress, strain)` in Voigt order at `gp`.
    fn vertex_stress_strain(
        &self,
        element: usize,
        gp: Vec3,
        x: &[Vec3],
    ) -> WeftResult<(Vec3, Vec3)>;
}

/// A steppable cloth model.
pub trait Simulation: FieldQuery + Send {
    /// Variant name (`fe_c0`, `fe_c1`, `fe_c1_alt`, `pbd`).
    fn name(&self) -> &'static str;

    /// Validates the output and rebuilds all rest data and the system
    /// layout. Discards any previous state.
    fn initialize(&mut self, output: &GeneratorOutput) -> WeftResult<()>;

    /// Advances one step of length `dt` from state `(x, v)` and writes
    /// the new velocities of every DOF into `out_v`.
    fn step_simulation(
        &mut self,
        dt: f32,
        gravity: Vec3,
        x: &[Vec3],
        v: &[Vec3],
        out_v: &mut [Vec3],
    ) -> WeftResult<StepReport>;

    fn is_static(&self, idx: usize) -> bool;

    /// Pins or frees node `idx`. Tangent DOFs cannot be pinned.
    fn set_static(&mut self, idx: usize, is_static: bool) -> WeftResult<()>;

    /// Whether `step_simulation` integrates positions itself. Its output
    /// velocity then only holds for the `dt` it was given and cannot be
    /// read as a slope, so the integrator takes one full-length step
    /// whatever the scheme.
    fn is_position_based(&self) -> bool {
        false
    }

    /// The linear solver, for variants that have one.
    fn solver(&self) -> Option<&Mpcg> {
        None
    }

    /// Hook for rejecting a step from its resulting positions. Every
    /// variant accepts every step today.
    fn validate_velocity_timestep(&self, _x: &[Vec3]) -> bool {
        true
    }

    /// Time spent in the last `step_simulation`.
    fn profiler_total(&self) -> &ProfilingTimer;

    /// Named phases of the last `step_simulation`.
    fn sub_profilers(&self) -> Vec<&ProfilingTimer>;
}
