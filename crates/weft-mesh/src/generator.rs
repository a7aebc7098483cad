//! The generator interface.

use glam::Mat4;
use weft_types::WeftResult;

use crate::output::GeneratorOutput;

/// Produces topology and initial state for a simulation.
///
/// Generators are deterministic: calling [`Generator::generate`] twice
/// with the same settings yields equal outputs.
pub trait Generator: Send {
    /// Builds a fresh output.
    fn generate(&self) -> WeftResult<GeneratorOutput>;

    /// Rigid transform applied to the current positions.
    fn transform(&self) -> Mat4;

    fn set_transform(&mut self, transform: Mat4);

    /// Human-readable name for logs and reports.
    fn name(&self) -> &str;
}
