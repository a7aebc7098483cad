//! Modified preconditioned conjugate gradient (MPCG) on a block system.
//!
//! Solves `A·X = B` where every unknown is a `Vec3` and `A` is a
//! [`BlockSparseMatrix`]. Each DOF carries a 3×3 constraint projection
//! `S_i` (identity for a free node, zero for a pinned one). The filter is
//! applied to the residual and the search direction on every iteration,
//! so constrained DOFs never pick up motion while their blocks stay in
//! the sparsity pattern.
//!
//! ## Convergence
//!
//! The iteration stops once `rᵀ·P⁻¹·r ≤ tol² · bᵀ·P⁻¹·b` (with `b`
//! filtered) or when the iteration cap is hit. Either way the caller gets
//! a [`SolveStats`] and can decide what an under-solved system means.
//!
//! ## Profiling
//!
//! Three timers are kept per solve: setup (initial residual and
//! preconditioner), the upper-triangular half of the mat-vec, and the
//! lower-triangular half.

use glam::{Mat3, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use weft_types::constants::DEFAULT_CG_ITERATIONS;
use weft_types::{ProfilingTimer, WeftError, WeftResult};

use crate::block_sparse::BlockSparseMatrix;
use crate::faer_solver::FaerSolver;

/// Iteration budget and tolerance for [`Mpcg`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MpcgConfig {
    /// Maximum CG iterations per solve.
    pub max_iterations: u32,
    /// Relative residual (preconditioned norm) at which the solve stops.
    pub tolerance: f32,
}

impl Default for MpcgConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_CG_ITERATIONS,
            tolerance: 1e-5,
        }
    }
}

/// Outcome of a single solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStats {
    /// Iterations actually performed.
    pub iterations: u32,
    /// Final relative residual.
    pub residual: f64,
    /// Whether the tolerance was reached.
    pub converged: bool,
}

/// Block conjugate gradient solver with constraint projection.
pub struct Mpcg {
    config: MpcgConfig,

    // ─── System ───
    /// System matrix.
    pub a: BlockSparseMatrix,
    /// Right-hand side.
    pub b: Vec<Vec3>,
    /// Solution (valid after a solve).
    pub x: Vec<Vec3>,
    /// Per-DOF constraint projection.
    pub constraints: Vec<Mat3>,

    // ─── Scratch ───
    r: Vec<Vec3>,
    c: Vec<Vec3>,
    q: Vec<Vec3>,
    s: Vec<Vec3>,
    precond: Vec<Vec3>,

    // ─── Profiling ───
    timer_setup: ProfilingTimer,
    timer_upper: ProfilingTimer,
    timer_lower: ProfilingTimer,

    last_stats: SolveStats,
}

impl Mpcg {
    /// Creates an empty solver.
    pub fn new(config: MpcgConfig) -> Self {
        Self {
            config,
            a: BlockSparseMatrix::new(0),
            b: Vec::new(),
            x: Vec::new(),
            constraints: Vec::new(),
            r: Vec::new(),
            c: Vec::new(),
            q: Vec::new(),
            s: Vec::new(),
            precond: Vec::new(),
            timer_setup: ProfilingTimer::new("Init"),
            timer_upper: ProfilingTimer::new("A Mtx Mult (upper)"),
            timer_lower: ProfilingTimer::new("A Mtx Mult (lower)"),
            last_stats: SolveStats::default(),
        }
    }

    /// Reserves storage for an `n`-DOF system with a diagonal-only pattern.
    pub fn allocate(&mut self, n: usize) {
        self.allocate_with_pattern(BlockSparseMatrix::new(n));
    }

    /// Reserves storage sized to `matrix` and adopts its sparsity pattern.
    pub fn allocate_with_pattern(&mut self, matrix: BlockSparseMatrix) {
        let n = matrix.dim();
        self.a = matrix;
        self.b = vec![Vec3::ZERO; n];
        self.x = vec![Vec3::ZERO; n];
        self.constraints = vec![Mat3::IDENTITY; n];
        self.r = vec![Vec3::ZERO; n];
        self.c = vec![Vec3::ZERO; n];
        self.q = vec![Vec3::ZERO; n];
        self.s = vec![Vec3::ZERO; n];
        self.precond = vec![Vec3::ONE; n];
        self.last_stats = SolveStats::default();
    }

    /// Number of DOFs in the system.
    pub fn dim(&self) -> usize {
        self.b.len()
    }

    pub fn config(&self) -> &MpcgConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: MpcgConfig) {
        self.config = config;
    }

    /// Clears the right-hand side and the solution.
    pub fn reset(&mut self) {
        self.b.iter_mut().for_each(|v| *v = Vec3::ZERO);
        self.x.iter_mut().for_each(|v| *v = Vec3::ZERO);
    }

    /// Zeroes the matrix values (pattern is kept).
    pub fn zero(&mut self) {
        self.a.zero();
    }

    /// Sets the projection of DOF `i`: free (identity) or pinned (zero).
    pub fn set_pinned(&mut self, i: usize, pinned: bool) {
        self.constraints[i] = if pinned { Mat3::ZERO } else { Mat3::IDENTITY };
    }

    /// Statistics of the most recent solve.
    pub fn last_stats(&self) -> SolveStats {
        self.last_stats
    }

    pub fn reset_profiling(&mut self) {
        self.timer_setup.reset_total();
        self.timer_upper.reset_total();
        self.timer_lower.reset_total();
    }

    /// Setup, upper-product and lower-product timers, in that order.
    pub fn profilers(&self) -> [&ProfilingTimer; 3] {
        [&self.timer_setup, &self.timer_upper, &self.timer_lower]
    }

    /// Solves from a zero initial guess.
    pub fn solve(&mut self) -> WeftResult<SolveStats> {
        let zero = vec![Vec3::ZERO; self.dim()];
        self.solve_with_guess(&zero)
    }

    /// Solves `A·X = B`, starting the iteration from `S·guess`.
    pub fn solve_with_guess(&mut self, guess: &[Vec3]) -> WeftResult<SolveStats> {
        let n = self.dim();
        if guess.len() < n {
            return Err(WeftError::InvariantViolation(format!(
                "Initial guess has {} entries, system has {}",
                guess.len(),
                n
            )));
        }

        self.timer_setup.begin_timing();

        // Jacobi preconditioner from the diagonal blocks.
        for i in 0..n {
            let d = self.a.diagonal(i);
            let diag = Vec3::new(d.x_axis.x, d.y_axis.y, d.z_axis.z);
            self.precond[i] = Vec3::select(diag.abs().cmpgt(Vec3::splat(1e-12)), diag.recip(), Vec3::ONE);
        }

        for i in 0..n {
            self.x[i] = self.constraints[i] * guess[i];
        }

        // r = S(b − A·x)
        self.timer_setup.end_timing_additive();
        self.product_x_into_q();
        self.timer_setup.begin_timing();

        for i in 0..n {
            let s_i = self.constraints[i];
            self.r[i] = s_i * (self.b[i] - self.q[i]);
            self.c[i] = s_i * (self.precond[i] * self.r[i]);
        }

        let delta0: f64 = (0..n)
            .into_par_iter()
            .map(|i| {
                let fb = self.constraints[i] * self.b[i];
                fb.dot(self.precond[i] * fb) as f64
            })
            .sum();
        let mut delta_new = dot(&self.r, &self.c);
        self.timer_setup.end_timing_additive();

        if delta0 <= f64::EPSILON {
            // Zero load: the only solution of an SPD system is zero.
            self.x.iter_mut().for_each(|v| *v = Vec3::ZERO);
            self.last_stats = SolveStats {
                iterations: 0,
                residual: 0.0,
                converged: true,
            };
            return Ok(self.last_stats);
        }

        let tol2 = (self.config.tolerance as f64).powi(2);
        let mut iterations = 0u32;

        while delta_new > tol2 * delta0 && iterations < self.config.max_iterations {
            // q = S(A·c)
            self.product_c_into_q();
            self.q
                .par_iter_mut()
                .zip(self.constraints.par_iter())
                .for_each(|(q, s)| *q = *s * *q);

            let denom = dot(&self.c, &self.q);
            if !(denom > 0.0) || !denom.is_finite() {
                tracing::warn!(iterations, denom, "MPCG search direction lost positive curvature");
                break;
            }
            let alpha = (delta_new / denom) as f32;

            for i in 0..n {
                self.x[i] += self.c[i] * alpha;
                self.r[i] -= self.q[i] * alpha;
                self.s[i] = self.precond[i] * self.r[i];
            }

            let delta_old = delta_new;
            delta_new = dot(&self.r, &self.s);
            let beta = (delta_new / delta_old) as f32;

            for i in 0..n {
                self.c[i] = self.constraints[i] * (self.s[i] + self.c[i] * beta);
            }
            iterations += 1;
        }

        let residual = (delta_new.max(0.0) / delta0).sqrt();
        self.last_stats = SolveStats {
            iterations,
            residual,
            converged: delta_new <= tol2 * delta0,
        };
        Ok(self.last_stats)
    }

    /// Solves the same filtered system with the `faer` sparse Cholesky
    /// factorization of its symmetric part. Writes into `x`.
    pub fn solve_direct(&mut self) -> WeftResult<SolveStats> {
        self.timer_setup.begin_timing();
        let mut solver = FaerSolver::new();
        let x = solver.solve_block_system(&self.a, &self.constraints, &self.b)?;
        self.x.copy_from_slice(&x);
        self.timer_setup.end_timing_additive();

        self.last_stats = SolveStats {
            iterations: 1,
            residual: 0.0,
            converged: true,
        };
        Ok(self.last_stats)
    }

    fn product_x_into_q(&mut self) {
        self.timer_upper.begin_timing();
        self.a.mul_upper(&self.x, &mut self.q);
        self.timer_upper.end_timing_additive();
        self.timer_lower.begin_timing();
        self.a.mul_lower_add(&self.x, &mut self.q);
        self.timer_lower.end_timing_additive();
    }

    fn product_c_into_q(&mut self) {
        self.timer_upper.begin_timing();
        self.a.mul_upper(&self.c, &mut self.q);
        self.timer_upper.end_timing_additive();
        self.timer_lower.begin_timing();
        self.a.mul_lower_add(&self.c, &mut self.q);
        self.timer_lower.end_timing_additive();
    }
}

impl Default for Mpcg {
    fn default() -> Self {
        Self::new(MpcgConfig::default())
    }
}

fn dot(a: &[Vec3], b: &[Vec3]) -> f64 {
    a.par_iter()
        .zip(b.par_iter())
        .map(|(x, y)| x.dot(*y) as f64)
        .sum()
}
