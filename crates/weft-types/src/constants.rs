//! Physical constants and simulation defaults.

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f32 = 9.81;

/// Default fixed sub-timestep of the integrator (seconds).
pub const DEFAULT_SUB_TIMESTEP: f32 = 0.0005;

/// Default Young's modulus of the cloth sheet.
pub const DEFAULT_YOUNGS_MODULUS: f32 = 2500.0;

/// Default Poisson ratio of the cloth sheet.
pub const DEFAULT_POISSON_RATIO: f32 = 0.3;

/// Default areal mass density (kg/m²). A unit sheet weighs 1 kg.
pub const DEFAULT_MASS_DENSITY: f32 = 1.0;

/// Default lumped mass of a C1 tangent degree of freedom.
pub const DEFAULT_TANGENT_MASS: f32 = 0.0002;

/// Default number of PBD projection sweeps per step.
pub const DEFAULT_PBD_SOLVER_STEPS: u32 = 20;

/// Default MPCG iteration cap.
pub const DEFAULT_CG_ITERATIONS: u32 = 200;
