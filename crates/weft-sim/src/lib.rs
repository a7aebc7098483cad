//! # weft-sim
//!
//! Cloth simulation variants, time integration and orchestration.
//!
//! ## Key Types
//!
//! - [`Simulation`] / [`FieldQuery`]: the capability traits every variant implements
//! - [`FeC0`], [`FeC1`], [`FeC1Alt`]: corotational finite-element shells
//! - [`Pbd`]: position-based dynamics on the node grid
//! - [`Integrator`]: fixed-sub-step explicit, RK2 and RK4 schemes
//! - [`Manager`]: generator, variant and integrator wired together
//! - [`SimConfig`]: TOML-loadable configuration

pub mod config;
pub mod corotational;
pub mod elasticity;
pub mod fe;
pub mod integrator;
pub mod manager;
pub mod pbd;
pub mod quadrature;
pub mod shape;
pub mod simulation;

pub use config::{
    IntegratorConfig, LinearSolverKind, MaterialConfig, PbdConfig, SimConfig, SolverSettings,
    TangentConfig,
};
pub use fe::{FeC0, FeC1, FeC1Alt, FeSimulation};
pub use integrator::{FrameSolveSummary, IntegrationType, Integrator, StepCallback};
pub use manager::{FrameReport, Manager, SimType};
pub use pbd::Pbd;
pub use shape::{Formulation, C0, C1, C1Alt};
pub use simulation::{FieldQuery, Simulation, StepReport};
