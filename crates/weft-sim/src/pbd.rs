//! Position-based dynamics over the node grid.
//!
//! The nodes of a square `w × w` grid are joined by distance constraints
//! (weft along rows, warp along columns, shear across cell diagonals) and
//! bending triplets along rows and columns. Each step predicts positions,
//! projects the constraints Gauss–Seidel style for a fixed number of
//! sweeps, and derives velocities from the corrected positions.
//!
//! Tangent DOFs are carried along untouched with zero velocity.

use std::sync::{PoisonError, RwLock};

use glam::{Mat3, Vec3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, trace};
use weft_math::frame::{orthonormalise, orthonormalise_rows};
use weft_mesh::GeneratorOutput;
use weft_types::{ProfilingTimer, WeftError, WeftResult};

use crate::config::PbdConfig;
use crate::simulation::{FieldQuery, Simulation, StepReport};

/// Keeps two nodes at their initial distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceConstraint {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    pub k: f32,
    /// Per-sweep stiffness, `1 − (1 − k)^(1/steps)`.
    pub k_prime: f32,
}

/// Keeps node `c` at its initial distance from the centroid of `(a, b, c)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BendingConstraint {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub rest_length: f32,
    pub k: f32,
    pub k_prime: f32,
}

/// Per-sweep stiffness that compounds to `k` over `steps` sweeps.
pub fn sweep_stiffness(k: f32, steps: u32) -> f32 {
    (1.0 - (1.0 - k).powf(1.0 / steps as f32)).min(1.0)
}

/// Position-based cloth.
pub struct Pbd {
    config: PbdConfig,
    node_count: usize,
    dof_count: usize,
    width: usize,

    rest: Vec<Vec3>,
    is_static: Vec<bool>,
    /// Linear triangles over the grid cells.
    triangles: Vec<[usize; 3]>,
    /// Triangles touching each node.
    incident: Vec<Vec<usize>>,
    initial_rotations: Vec<Mat3>,
    /// Per-node rotations for the queries, dropped by every step.
    rotations: RwLock<Option<Vec<Mat3>>>,

    distance: Vec<DistanceConstraint>,
    bending: Vec<BendingConstraint>,

    predicted: Vec<Vec3>,
    rng: StdRng,

    timer_total: ProfilingTimer,
    timer_constraints: ProfilingTimer,
}

impl Pbd {
    /// Creates an uninitialized solver.
    pub fn new(config: PbdConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            node_count: 0,
            dof_count: 0,
            width: 0,
            rest: Vec::new(),
            is_static: Vec::new(),
            triangles: Vec::new(),
            incident: Vec::new(),
            initial_rotations: Vec::new(),
            rotations: RwLock::new(None),
            distance: Vec::new(),
            bending: Vec::new(),
            predicted: Vec::new(),
            timer_total: ProfilingTimer::new("Total Time"),
            timer_constraints: ProfilingTimer::new("Constraints"),
        }
    }

    /// Nodes along one side of the grid.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn distance_constraints(&self) -> &[DistanceConstraint] {
        &self.distance
    }

    pub fn bending_constraints(&self) -> &[BendingConstraint] {
        &self.bending
    }

    /// Orthonormalised sum of the rotations of the triangles around `node`.
    pub fn node_rotation(&self, node: usize, x: &[Vec3]) -> Mat3 {
        let sum = self.incident[node]
            .iter()
            .map(|&t| self.triangle_rotation(t, x))
            .fold(Mat3::ZERO, |acc, r| acc + r);
        orthonormalise(&sum, 2)
    }

    /// Runs `f` over the rotations of every node, building them from `x`
    /// on the first query after a step.
    fn with_node_rotations<R>(&self, x: &[Vec3], f: impl FnOnce(&[Mat3]) -> R) -> R {
        if let Some(cached) = self
            .rotations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
        {
            return f(cached);
        }
        let rotations: Vec<Mat3> = (0..self.node_count)
            .into_par_iter()
            .map(|i| self.node_rotation(i, x))
            .collect();
        let result = f(&rotations);
        *self.rotations.write().unwrap_or_else(PoisonError::into_inner) = Some(rotations);
        result
    }

    fn invalidate_rotations(&mut self) {
        *self
            .rotations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Shape-matched rotation of triangle `t` from rest to `x`.
    fn triangle_rotation(&self, t: usize, x: &[Vec3]) -> Mat3 {
        let [v1, v2, v3] = self.triangles[t];
        let r0 = x[v3] - x[v1];
        let r1 = x[v3] - x[v2];
        let current = orthonormalise_rows([r0, r1, r0.cross(r1)], 2);
        self.initial_rotations[t] * current.transpose()
    }

    fn add_distance(&mut self, positions: &[Vec3], a: usize, b: usize, k: f32) {
        self.distance.push(DistanceConstraint {
            a,
            b,
            rest_length: (positions[b] - positions[a]).length(),
            k,
            k_prime: sweep_stiffness(k, self.config.solver_steps),
        });
    }

    fn add_bending(&mut self, positions: &[Vec3], a: usize, b: usize, c: usize, k: f32) {
        let centre = (positions[a] + positions[b] + positions[c]) / 3.0;
        self.bending.push(BendingConstraint {
            a,
            b,
            c,
            rest_length: (positions[c] - centre).length(),
            k,
            k_prime: sweep_stiffness(k, self.config.solver_steps),
        });
    }

    /// Builds triangles and constraints from the positions at initialize.
    fn setup_constraints(&mut self, positions: &[Vec3]) {
        let w = self.width;
        let cfg = self.config;
        self.triangles.clear();
        self.distance.clear();
        self.bending.clear();

        for x in 0..w - 1 {
            for y in 0..w - 1 {
                let a = y * w + x;
                let b = a + 1;
                let c = (y + 1) * w + x;
                let d = c + 1;
                self.triangles.push([c, a, b]);
                self.triangles.push([c, b, d]);
                self.add_distance(positions, a, d, cfg.k_shear);
                self.add_distance(positions, b, c, cfg.k_shear);
            }
        }

        // Warp runs down the columns.
        for x in 0..w {
            for y in 0..w - 1 {
                self.add_distance(positions, y * w + x, (y + 1) * w + x, cfg.k_warp);
            }
        }
        // Weft runs along the rows.
        for x in 0..w - 1 {
            for y in 0..w {
                self.add_distance(positions, y * w + x, y * w + x + 1, cfg.k_weft);
            }
        }

        for x in 0..w.saturating_sub(2) {
            for y in 0..w {
                let a = y * w + x;
                self.add_bending(positions, a, a + 1, a + 2, cfg.k_bend);
            }
        }
        for x in 0..w {
            for y in 0..w.saturating_sub(2) {
                let a = y * w + x;
                self.add_bending(positions, a, a + w, a + 2 * w, cfg.k_bend);
            }
        }
    }

    fn weight(&self, i: usize) -> f32 {
        if self.is_static[i] {
            0.0
        } else {
            1.0
        }
    }

    fn solve_distance(&mut self, c: DistanceConstraint) {
        let (w1, w2) = (self.weight(c.a), self.weight(c.b));
        let w = w1 + w2;
        if w <= 0.0 {
            return;
        }
        let dir = self.predicted[c.a] - self.predicted[c.b];
        let len = dir.length();
        if !(len > 0.0) || !len.is_finite() {
            return;
        }
        let lambda = (len - c.rest_length) * c.k_prime / w;
        let dp = dir / len * lambda;
        if w1 > 0.0 {
            self.predicted[c.a] -= dp * w1;
        }
        if w2 > 0.0 {
            self.predicted[c.b] += dp * w2;
        }
    }

    fn solve_bending(&mut self, c: BendingConstraint) {
        let (w1, w2, w3) = (self.weight(c.a), self.weight(c.b), self.weight(c.c));
        let w = w1 + w2 + 2.0 * w3;
        if w <= 0.0 {
            return;
        }
        let (p1, p2, p3) = (self.predicted[c.a], self.predicted[c.b], self.predicted[c.c]);
        let centre = (p1 + p2 + p3) / 3.0;
        let dir = p3 - centre;
        let dist = dir.length();
        if !(dist > 0.0) || !dist.is_finite() {
            return;
        }
        let force = dir * (1.0 - c.rest_length / dist);
        if w1 > 0.0 {
            self.predicted[c.a] += force * (c.k_prime * 2.0 * w1 / w);
        }
        if w2 > 0.0 {
            self.predicted[c.b] += force * (c.k_prime * 2.0 * w2 / w);
        }
        if w3 > 0.0 {
            self.predicted[c.c] -= force * (c.k_prime * 4.0 * w3 / w);
        }
    }

    fn triangle(&self, element: usize, x: &[Vec3]) -> WeftResult<[usize; 3]> {
        let tri = self.triangles.get(element).copied().ok_or_else(|| {
            WeftError::InvariantViolation(format!(
                "Element {element} out of range ({} triangles)",
                self.triangles.len()
            ))
        })?;
        if x.len() < self.node_count {
            return Err(WeftError::InvariantViolation(format!(
                "State has {} entries, expected {}",
                x.len(),
                self.node_count
            )));
        }
        Ok(tri)
    }
}

impl Default for Pbd {
    fn default() -> Self {
        Self::new(PbdConfig::default())
    }
}

impl Simulation for Pbd {
    fn name(&self) -> &'static str {
        "pbd"
    }

    fn initialize(&mut self, output: &GeneratorOutput) -> WeftResult<()> {
        output.validate()?;
        if self.config.solver_steps == 0 {
            return Err(WeftError::InvalidConfig(
                "pbd.solver_steps must be at least 1".into(),
            ));
        }

        let nodes = output.node_count;
        let width = (nodes as f64).sqrt().round() as usize;
        if width < 2 || width * width != nodes {
            return Err(WeftError::InvalidTopology(format!(
                "PBD needs a square grid of at least 2×2 nodes, got {nodes} nodes"
            )));
        }

        self.node_count = nodes;
        self.dof_count = output.dof_count();
        self.width = width;
        self.rest = output.rest_positions[..nodes].to_vec();
        self.is_static = (0..nodes).map(|i| output.is_static(i)).collect();
        self.predicted = vec![Vec3::ZERO; nodes];
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.invalidate_rotations();

        self.setup_constraints(&output.positions[..nodes]);

        self.incident = vec![Vec::new(); nodes];
        for (t, tri) in self.triangles.iter().enumerate() {
            for &v in tri {
                self.incident[v].push(t);
            }
        }
        let rest = &self.rest;
        self.initial_rotations = self
            .triangles
            .iter()
            .map(|&[v1, v2, v3]| {
                let r0 = rest[v3] - rest[v1];
                let r1 = rest[v3] - rest[v2];
                orthonormalise_rows([r0, r1, r0.cross(r1)], 2)
            })
            .collect();

        debug!(
            nodes,
            triangles = self.triangles.len(),
            distance = self.distance.len(),
            bending = self.bending.len(),
            "PBD initialized"
        );
        Ok(())
    }

    fn step_simulation(
        &mut self,
        dt: f32,
        gravity: Vec3,
        x: &[Vec3],
        v: &[Vec3],
        out_v: &mut [Vec3],
    ) -> WeftResult<StepReport> {
        let n = self.node_count;
        if n == 0 {
            return Err(WeftError::InvariantViolation(
                "step_simulation called before initialize".into(),
            ));
        }
        if !(dt > 0.0) {
            return Err(WeftError::InvariantViolation(format!(
                "PBD needs a positive timestep, got {dt}"
            )));
        }
        if x.len() < self.dof_count || v.len() < self.dof_count || out_v.len() < self.dof_count {
            return Err(WeftError::InvariantViolation(format!(
                "State arrays shorter than the {} DOFs",
                self.dof_count
            )));
        }

        self.timer_total.begin_timing();
        self.invalidate_rotations();
        out_v.fill(Vec3::ZERO);

        let statics = &self.is_static;
        self.predicted
            .par_iter_mut()
            .zip(out_v[..n].par_iter_mut())
            .enumerate()
            .for_each(|(i, (p, vel))| {
                *p = x[i];
                if !statics[i] {
                    *vel = v[i] + gravity * dt;
                    *p += *vel * dt;
                }
            });

        self.timer_constraints.begin_timing();
        self.distance.shuffle(&mut self.rng);
        self.bending.shuffle(&mut self.rng);
        for _ in 0..self.config.solver_steps {
            for j in 0..self.distance.len() {
                self.solve_distance(self.distance[j]);
            }
            for j in 0..self.bending.len() {
                self.solve_bending(self.bending[j]);
            }
        }
        self.timer_constraints.end_timing();

        let blend = self.config.velocity_blend;
        let predicted = &self.predicted;
        out_v[..n].par_iter_mut().enumerate().for_each(|(i, vel)| {
            let from_positions = (predicted[i] - x[i]) / dt;
            *vel += (from_positions - *vel) * blend;
        });

        self.timer_total.end_timing();

        if out_v[..n].iter().any(|v| !v.is_finite()) {
            return Err(WeftError::NumericalInstability(
                "pbd produced non-finite velocities".into(),
            ));
        }
        trace!(dt, "PBD step");

        Ok(StepReport {
            solver: None,
            valid_timestep: self.validate_velocity_timestep(x),
        })
    }

    fn is_position_based(&self) -> bool {
        true
    }

    fn is_static(&self, idx: usize) -> bool {
        self.is_static.get(idx).copied().unwrap_or(false)
    }

    fn set_static(&mut self, idx: usize, is_static: bool) -> WeftResult<()> {
        if idx >= self.node_count {
            return Err(WeftError::InvariantViolation(format!(
                "Index {idx} is not a node ({} nodes)",
                self.node_count
            )));
        }
        self.is_static[idx] = is_static;
        Ok(())
    }

    fn profiler_total(&self) -> &ProfilingTimer {
        &self.timer_total
    }

    fn sub_profilers(&self) -> Vec<&ProfilingTimer> {
        vec![&self.timer_constraints]
    }
}

impl FieldQuery for Pbd {
    fn element_count(&self) -> usize {
        self.triangles.len()
    }

    fn vertex_ws_pos(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Vec3> {
        let [v1, v2, v3] = self.triangle(element, x)?;
        Ok(x[v1] * gp.x + x[v2] * gp.y + x[v3] * gp.z)
    }

    fn vertex_rotation(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Mat3> {
        let [v1, v2, v3] = self.triangle(element, x)?;
        let blended = self.with_node_rotations(x, |r| {
            r[v1] * gp.x + r[v2] * gp.y + r[v3] * gp.z
        });
        Ok(orthonormalise(&blended, 2))
    }

    fn vertex_stress_strain(
        &self,
        element: usize,
        _gp: Vec3,
        x: &[Vec3],
    ) -> WeftResult<(Vec3, Vec3)> {
        self.triangle(element, x)?;
        Ok((Vec3::ZERO, Vec3::ZERO))
    }
}
