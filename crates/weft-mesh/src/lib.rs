//! # weft-mesh
//!
//! Topology generation for the Weft cloth engine.
//!
//! ## Key Types
//!
//! - [`Element`]: a 6-node quadratic triangle with nine signed tangent DOFs.
//! - [`GeneratorOutput`]: everything a simulation needs to initialize
//!   (nodes, tangents, elements, static flags, actuators).
//! - [`Generator`]: implemented by [`SquareGrid`] and [`BendTest`].
//! - [`Actuator`]: scripted per-sub-step overrides of node state.

pub mod actuator;
pub mod element;
pub mod generator;
pub mod output;
pub mod square_grid;

pub use actuator::Actuator;
pub use bend_test::BendTest;
pub use element::{Element, SignedTangent, TangentSlot};
pub use generator::Generator;
pub use output::{GeneratorOutput, NodeDescriptor};
pub use square_grid::SquareGrid;
