//! The hand-off record between a generator and its consumers.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use weft_types::{WeftError, WeftResult};

use crate::actuator::Actuator;
use crate::element::Element;

/// Per-node metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Static nodes ignore simulation forces.
    pub is_static: bool,
    /// Texture coordinate in `[0, 1]²`.
    pub tex_coord: Vec2,
}

/// Generated topology and initial state.
///
/// `positions` and `rest_positions` both hold `node_count` nodes followed
/// by `tangent_count` tangent vectors. Consumers take a deep copy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorOutput {
    pub node_count: usize,
    pub tangent_count: usize,
    pub elements: Vec<Element>,
    /// One descriptor per node (tangents have none).
    pub descriptors: Vec<NodeDescriptor>,
    /// Current (transformed) positions and tangents.
    pub positions: Vec<Vec3>,
    /// Rest positions and tangents.
    pub rest_positions: Vec<Vec3>,
    pub actuators: Vec<Actuator>,
}

impl GeneratorOutput {
    /// Nodes plus tangents.
    #[inline]
    pub fn dof_count(&self) -> usize {
        self.node_count + self.tangent_count
    }

    /// Empties the output.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Replaces `self` with a deep copy of `other`.
    pub fn copy_from(&mut self, other: &GeneratorOutput) {
        self.clone_from(other);
    }

    /// Whether node `i` is flagged static.
    pub fn is_static(&self, i: usize) -> bool {
        self.descriptors.get(i).is_some_and(|d| d.is_static)
    }

    /// Checks array lengths, index ranges, tangent signs and actuator
    /// targets.
    pub fn validate(&self) -> WeftResult<()> {
        let dofs = self.dof_count();
        if self.positions.len() != dofs || self.rest_positions.len() != dofs {
            return Err(WeftError::InvalidTopology(format!(
                "Expected {} positions ({} nodes + {} tangents), got {} current / {} rest",
                dofs,
                self.node_count,
                self.tangent_count,
                self.positions.len(),
                self.rest_positions.len()
            )));
        }
        if self.descriptors.len() != self.node_count {
            return Err(WeftError::InvalidTopology(format!(
                "{} descriptors for {} nodes",
                self.descriptors.len(),
                self.node_count
            )));
        }

        for (e, element) in self.elements.iter().enumerate() {
            if let Some(&n) = element.nodes.iter().find(|&&n| n as usize >= self.node_count) {
                return Err(WeftError::InvalidTopology(format!(
                    "Element {e} references node {n} (node count {})",
                    self.node_count
                )));
            }
            for t in &element.tangents {
                if self.tangent_count > 0 && t.index as usize >= self.tangent_count {
                    return Err(WeftError::InvalidTopology(format!(
                        "Element {e} references tangent {} (tangent count {})",
                        t.index, self.tangent_count
                    )));
                }
                if t.sign != 1.0 && t.sign != -1.0 {
                    return Err(WeftError::InvalidTopology(format!(
                        "Element {e} has tangent sign {}",
                        t.sign
                    )));
                }
            }
        }

        for actuator in &self.actuators {
            if actuator.node() as usize >= self.node_count {
                return Err(WeftError::InvalidTopology(format!(
                    "Actuator targets node {} (node count {})",
                    actuator.node(),
                    self.node_count
                )));
            }
        }

        if let Some(i) = self
            .positions
            .iter()
            .chain(&self.rest_positions)
            .position(|p| !p.is_finite())
        {
            return Err(WeftError::InvalidTopology(format!(
                "Non-finite position at entry {i}"
            )));
        }

        Ok(())
    }
}
