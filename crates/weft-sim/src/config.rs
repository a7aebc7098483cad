//! Simulation configuration.
//!
//! One [`SimConfig`] drives every variant: material constants for the FE
//! elements, tangent masses for C1, solver budget, PBD stiffnesses and the
//! integrator settings. Every section defaults sensibly, so a TOML file
//! only needs the values it changes.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use weft_math::MpcgConfig;
use weft_types::constants::{
    DEFAULT_CG_ITERATIONS, DEFAULT_MASS_DENSITY, DEFAULT_PBD_SOLVER_STEPS, DEFAULT_POISSON_RATIO,
    DEFAULT_SUB_TIMESTEP, DEFAULT_TANGENT_MASS, DEFAULT_YOUNGS_MODULUS, GRAVITY,
};
use weft_types::{WeftError, WeftResult};

use crate::integrator::IntegrationType;

/// Top-level configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub material: MaterialConfig,
    pub tangents: TangentConfig,
    pub solver: SolverSettings,
    pub pbd: PbdConfig,
    pub integrator: IntegratorConfig,
}

/// Isotropic plane-stress material of the FE variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Young's modulus.
    pub youngs_modulus: f32,
    /// Poisson ratio, strictly inside (−1, 0.5).
    pub poisson_ratio: f32,
    /// Areal mass density (kg/m²), spread uniformly over the nodes.
    pub mass_density: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            youngs_modulus: DEFAULT_YOUNGS_MODULUS,
            poisson_ratio: DEFAULT_POISSON_RATIO,
            mass_density: DEFAULT_MASS_DENSITY,
        }
    }
}

/// Lumped mass of the C1 tangent DOFs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TangentConfig {
    pub mass: f32,
    /// Extra diagonal weight on the tangent mass block (A = m·(1 + damping)).
    pub mass_damping: f32,
}

impl Default for TangentConfig {
    fn default() -> Self {
        Self {
            mass: DEFAULT_TANGENT_MASS,
            mass_damping: 1e-3,
        }
    }
}

/// Which linear solver the FE variants use each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// Warm-started block MPCG.
    #[default]
    Mpcg,
    /// Sparse Cholesky of the symmetric part (faer).
    Cholesky,
}

/// Linear solver settings of the FE variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Maximum MPCG iterations per solve.
    pub max_iterations: u32,
    /// Relative residual at which MPCG stops.
    pub tolerance: f32,
    /// Turn a non-converged solve into a `SolverDivergence` error.
    pub strict_convergence: bool,
    pub linear_solver: LinearSolverKind,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_CG_ITERATIONS,
            tolerance: 1e-5,
            strict_convergence: false,
            linear_solver: LinearSolverKind::Mpcg,
        }
    }
}

impl SolverSettings {
    /// The MPCG budget described by these settings.
    pub fn mpcg(&self) -> MpcgConfig {
        MpcgConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Position-based dynamics parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbdConfig {
    /// Gauss–Seidel sweeps per step.
    pub solver_steps: u32,
    /// Horizontal stretch stiffness.
    pub k_weft: f32,
    /// Vertical stretch stiffness.
    pub k_warp: f32,
    /// Diagonal (shear) stiffness.
    pub k_shear: f32,
    /// Bending stiffness along rows and columns.
    pub k_bend: f32,
    /// How far the output velocity moves toward the position change (0..=1).
    pub velocity_blend: f32,
    /// Seed of the constraint shuffle.
    pub seed: u64,
}

impl Default for PbdConfig {
    fn default() -> Self {
        Self {
            solver_steps: DEFAULT_PBD_SOLVER_STEPS,
            k_weft: 0.5,
            k_warp: 0.5,
            k_shear: 0.5,
            k_bend: 0.125,
            velocity_blend: 0.9,
            seed: 0,
        }
    }
}

/// Time integration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub kind: IntegrationType,
    /// Fixed sub-step (seconds).
    pub sub_timestep: f32,
    /// Gravity vector [gx, gy, gz] in m/s².
    pub gravity: [f32; 3],
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            kind: IntegrationType::Rk2,
            sub_timestep: DEFAULT_SUB_TIMESTEP,
            gravity: [0.0, -GRAVITY, 0.0],
        }
    }
}

impl IntegratorConfig {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }
}

impl SimConfig {
    /// Creates a config for debugging (small budgets, loose tolerance).
    pub fn debug() -> Self {
        Self {
            solver: SolverSettings {
                max_iterations: 20,
                tolerance: 1e-3,
                ..Default::default()
            },
            pbd: PbdConfig {
                solver_steps: 4,
                ..Default::default()
            },
            integrator: IntegratorConfig {
                kind: IntegrationType::Explicit,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Creates a high-quality config (RK4, tight tolerance, more sweeps).
    pub fn high_quality() -> Self {
        Self {
            solver: SolverSettings {
                max_iterations: 1000,
                tolerance: 1e-8,
                ..Default::default()
            },
            pbd: PbdConfig {
                solver_steps: 50,
                ..Default::default()
            },
            integrator: IntegratorConfig {
                kind: IntegrationType::Rk4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> WeftResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| WeftError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> WeftResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> WeftResult<String> {
        toml::to_string_pretty(self).map_err(|e| WeftError::Serialization(e.to_string()))
    }

    /// Rejects values no variant can run with.
    pub fn validate(&self) -> WeftResult<()> {
        let m = &self.material;
        if !(m.youngs_modulus > 0.0) {
            return Err(invalid(format!(
                "youngs_modulus must be positive, got {}",
                m.youngs_modulus
            )));
        }
        if !(m.poisson_ratio > -1.0 && m.poisson_ratio < 0.5) {
            return Err(invalid(format!(
                "poisson_ratio must lie in (-1, 0.5), got {}",
                m.poisson_ratio
            )));
        }
        if !(m.mass_density > 0.0) {
            return Err(invalid(format!(
                "mass_density must be positive, got {}",
                m.mass_density
            )));
        }
        if !(self.tangents.mass > 0.0) || !(self.tangents.mass_damping >= 0.0) {
            return Err(invalid(
                "tangent mass must be positive and mass_damping non-negative".into(),
            ));
        }
        if self.solver.max_iterations == 0 || !(self.solver.tolerance > 0.0) {
            return Err(invalid(
                "solver needs at least one iteration and a positive tolerance".into(),
            ));
        }

        let p = &self.pbd;
        if p.solver_steps == 0 {
            return Err(invalid("pbd.solver_steps must be at least 1".into()));
        }
        for (name, k) in [
            ("k_weft", p.k_weft),
            ("k_warp", p.k_warp),
            ("k_shear", p.k_shear),
            ("k_bend", p.k_bend),
            ("velocity_blend", p.velocity_blend),
        ] {
            if !(0.0..=1.0).contains(&k) {
                return Err(invalid(format!("pbd.{name} must lie in [0, 1], got {k}")));
            }
        }

        let i = &self.integrator;
        if !(i.sub_timestep > 0.0) || !i.sub_timestep.is_finite() {
            return Err(invalid(format!(
                "sub_timestep must be positive, got {}",
                i.sub_timestep
            )));
        }
        if !i.gravity().is_finite() {
            return Err(invalid("gravity must be finite".into()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> WeftError {
    WeftError::InvalidConfig(message)
}
