//! Corotational 6-node finite element simulation.
//!
//! [`FeSimulation`] is generic over the element [`Formulation`]; the three
//! variants are the aliases [`FeC0`], [`FeC1`] and [`FeC1Alt`]. Each step
//! builds and solves the semi-implicit velocity system
//!
//! ```text
//! A = M + dt²·K
//! B = M·v + dt·f_ext − dt·f_int
//! ```
//!
//! Element contributions are computed in parallel into element-local
//! buffers and then scattered sequentially into the block system through
//! slot indices fixed at initialization.

use std::marker::PhantomData;

use glam::{Mat3, Vec3};
use nalgebra::Matrix3;
use rayon::prelude::*;
use tracing::{debug, error, trace, warn};
use weft_math::{BlockSparseMatrix, Mpcg};
use weft_mesh::GeneratorOutput;
use weft_types::{ProfilingTimer, WeftError, WeftResult};

use crate::config::{LinearSolverKind, SimConfig};
use crate::corotational::{self, ElementContribution, MaterialFrame};
use crate::elasticity::plane_stress;
use crate::quadrature::GAUSS_12;
use crate::shape::{Formulation, ShapeDerivatives, C0, C1, C1Alt};
use crate::simulation::{FieldQuery, Simulation, StepReport};

/// Quadratic 6-node elements.
pub type FeC0 = FeSimulation<C0>;
/// Slope-continuous elements, signs in the shape functions.
pub type FeC1 = FeSimulation<C1>;
/// Slope-continuous elements, signs on the gathered tangents.
pub type FeC1Alt = FeSimulation<C1Alt>;

const TIMER_ROTATIONS: usize = 0;
const TIMER_BUILD: usize = 1;
const TIMER_SOLVER: usize = 2;

/// Per-element data fixed at initialization.
struct ElementLayout {
    /// Global DOF of each local DOF.
    dofs: Vec<usize>,
    /// Applied to DOF values on gather and to forces/stiffness on scatter.
    gather_scale: Vec<f32>,
    /// Applied to the shape function columns.
    shape_scale: Vec<f32>,
    /// Shape derivatives at each Gauss point, `shape_scale` applied.
    shapes: Vec<ShapeDerivatives>,
    /// Block slot of every `(j, k)` local pair, row-major.
    slots: Vec<usize>,
}

impl ElementLayout {
    fn gather(&self, source: &[Vec3]) -> Vec<Vec3> {
        self.dofs
            .iter()
            .zip(&self.gather_scale)
            .map(|(&d, &s)| source[d] * s)
            .collect()
    }
}

/// Corotational FE cloth over 6-node elements.
pub struct FeSimulation<F: Formulation> {
    config: SimConfig,
    elasticity: Matrix3<f32>,

    node_count: usize,
    tangent_count: usize,
    layouts: Vec<ElementLayout>,
    /// Rest values of every DOF (nodes, then tangents).
    rest: Vec<Vec3>,
    is_static: Vec<bool>,
    node_mass: f32,

    solver: Mpcg,

    timer_total: ProfilingTimer,
    timers: [ProfilingTimer; 3],

    _formulation: PhantomData<fn() -> F>,
}

impl<F: Formulation> FeSimulation<F> {
    /// Creates an uninitialized simulation.
    pub fn new(config: SimConfig) -> Self {
        let elasticity = plane_stress(
            config.material.youngs_modulus,
            config.material.poisson_ratio,
        );
        let solver = Mpcg::new(config.solver.mpcg());
        Self {
            config,
            elasticity,
            node_count: 0,
            tangent_count: 0,
            layouts: Vec::new(),
            rest: Vec::new(),
            is_static: Vec::new(),
            node_mass: 0.0,
            solver,
            timer_total: ProfilingTimer::new("Total Time"),
            timers: [
                ProfilingTimer::new("Rotations"),
                ProfilingTimer::new("Build Matrices"),
                ProfilingTimer::new("Solver"),
            ],
            _formulation: PhantomData,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn tangent_count(&self) -> usize {
        self.tangent_count
    }

    /// Unknowns in the global system.
    pub fn dof_count(&self) -> usize {
        self.node_count + self.tangent_count
    }

    /// Lumped mass of every node.
    pub fn node_mass(&self) -> f32 {
        self.node_mass
    }

    /// The plane-stress matrix in use.
    pub fn elasticity(&self) -> &Matrix3<f32> {
        &self.elasticity
    }

    /// Local force and stiffness of `element` at state `x`.
    pub fn element_contribution(
        &self,
        element: usize,
        x: &[Vec3],
    ) -> WeftResult<ElementContribution> {
        let layout = self.layout(element, x)?;
        corotational::element_contribution(
            element as u32,
            &layout.gather(&self.rest),
            &layout.gather(x),
            &layout.shapes,
            &self.elasticity,
        )
    }

    fn layout(&self, element: usize, x: &[Vec3]) -> WeftResult<&ElementLayout> {
        let layout = self.layouts.get(element).ok_or_else(|| {
            WeftError::InvariantViolation(format!(
                "Element {element} out of range ({} elements)",
                self.layouts.len()
            ))
        })?;
        if x.len() < self.dof_count() {
            return Err(WeftError::InvariantViolation(format!(
                "State has {} entries, expected {}",
                x.len(),
                self.dof_count()
            )));
        }
        Ok(layout)
    }

    fn build_layouts(&mut self, output: &GeneratorOutput) -> WeftResult<BlockSparseMatrix> {
        let n = F::LOCAL_DOFS;
        let node_count = self.node_count;
        let table: Vec<ShapeDerivatives> = GAUSS_12.iter().map(|g| F::derivatives(g.coords)).collect();

        self.layouts = output
            .elements
            .iter()
            .map(|element| {
                let mut dofs: Vec<usize> = element.nodes.iter().map(|&v| v as usize).collect();
                let mut signs = vec![1.0; 6];
                if F::uses_tangents() {
                    for t in &element.tangents {
                        dofs.push(node_count + t.index as usize);
                        signs.push(t.sign);
                    }
                }
                let ones = vec![1.0; n];
                let (gather_scale, shape_scale) = if F::SIGNS_IN_SHAPE {
                    (ones, signs)
                } else {
                    (signs, ones)
                };
                let shapes = table.iter().map(|d| d.scaled(&shape_scale)).collect();
                ElementLayout {
                    dofs,
                    gather_scale,
                    shape_scale,
                    shapes,
                    slots: Vec::new(),
                }
            })
            .collect();

        let pairs = self.layouts.iter().flat_map(|layout| {
            layout
                .dofs
                .iter()
                .flat_map(move |&j| layout.dofs.iter().map(move |&k| (j, k)))
        });
        BlockSparseMatrix::from_pattern(self.dof_count(), pairs)
    }

    fn compute_slots(&mut self) -> WeftResult<()> {
        for layout in &mut self.layouts {
            let mut slots = Vec::with_capacity(layout.dofs.len() * layout.dofs.len());
            for &j in &layout.dofs {
                for &k in &layout.dofs {
                    let slot = self.solver.a.slot(j, k).ok_or_else(|| {
                        WeftError::InvariantViolation(format!("Block ({j}, {k}) missing from pattern"))
                    })?;
                    slots.push(slot);
                }
            }
            layout.slots = slots;
        }
        Ok(())
    }

    /// Mass-matrix diagonal and inertial/external right-hand side.
    fn assemble_diagonal(&mut self, dt: f32, gravity: Vec3, v: &[Vec3]) {
        let mass = self.node_mass;
        let sub_gravity = gravity / self.node_count as f32;
        let node_block = Mat3::from_diagonal(Vec3::splat(mass * F::NODE_MASS_DAMPING));

        let tangents = self.config.tangents;
        let tangent_block = Mat3::from_diagonal(Vec3::splat(tangents.mass * (1.0 + tangents.mass_damping)));

        let nodes = self.node_count;
        let dofs = self.dof_count();
        self.solver.b[..nodes]
            .par_iter_mut()
            .zip(&v[..nodes])
            .for_each(|(b, v)| *b = *v * mass + sub_gravity * dt);
        self.solver.b[nodes..]
            .par_iter_mut()
            .zip(&v[nodes..dofs])
            .for_each(|(b, v)| *b = *v * tangents.mass);

        for i in 0..dofs {
            let block = if i < nodes { node_block } else { tangent_block };
            self.solver.a.set_diagonal(i, block);
        }
    }

    /// Adds `dt²·K` to A and subtracts `dt·f` from B.
    fn scatter(&mut self, dt: f32, contributions: &[ElementContribution]) {
        let dt2 = dt * dt;
        for (layout, c) in self.layouts.iter().zip(contributions) {
            let n = layout.dofs.len();
            for j in 0..n {
                let sj = layout.gather_scale[j];
                self.solver.b[layout.dofs[j]] -= c.force(j) * (sj * dt);
                for k in 0..n {
                    let sk = layout.gather_scale[k];
                    self.solver
                        .a
                        .add_to_slot(layout.slots[j * n + k], c.block(j, k) * (sj * sk * dt2));
                }
            }
        }
    }
}

impl<F: Formulation> Simulation for FeSimulation<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn initialize(&mut self, output: &GeneratorOutput) -> WeftResult<()> {
        output.validate()?;
        self.config.validate()?;

        if output.node_count == 0 || output.elements.is_empty() {
            return Err(WeftError::InvalidTopology(
                "Generator output has no elements".into(),
            ));
        }
        if F::uses_tangents() && output.tangent_count == 0 {
            return Err(WeftError::InvalidTopology(format!(
                "{} needs tangent DOFs, the output has none",
                F::NAME
            )));
        }

        self.node_count = output.node_count;
        self.tangent_count = if F::uses_tangents() {
            output.tangent_count
        } else {
            0
        };
        let dofs = self.dof_count();
        self.rest = output.rest_positions[..dofs].to_vec();
        self.is_static = (0..dofs).map(|i| output.is_static(i)).collect();

        // Uniform lumped mass from the rest area of the corner triangles (XY).
        let total_area: f32 = output
            .elements
            .iter()
            .map(|e| {
                let [a, b, c] = e.corners().map(|i| self.rest[i as usize]);
                let (e1, e2) = (a - c, b - c);
                0.5 * (e1.x * e2.y - e1.y * e2.x).abs()
            })
            .sum();
        self.node_mass = total_area * self.config.material.mass_density / self.node_count as f32;
        if !(self.node_mass > 0.0) {
            return Err(WeftError::InvalidTopology(
                "Elements have zero rest area".into(),
            ));
        }

        let pattern = self.build_layouts(output)?;
        self.solver = Mpcg::new(self.config.solver.mpcg());
        self.solver.allocate_with_pattern(pattern);
        self.compute_slots()?;
        for (i, &pinned) in self.is_static.iter().enumerate() {
            self.solver.set_pinned(i, pinned);
        }

        debug!(
            variant = F::NAME,
            nodes = self.node_count,
            tangents = self.tangent_count,
            elements = self.layouts.len(),
            blocks = self.solver.a.nnz_blocks(),
            node_mass = self.node_mass,
            "FE simulation initialized"
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
        let dofs = self.dof_count();
        if dofs == 0 {
            return Err(WeftError::InvariantViolation(
                "step_simulation called before initialize".into(),
            ));
        }
        if x.len() < dofs || v.len() < dofs || out_v.len() < dofs {
            return Err(WeftError::InvariantViolation(format!(
                "State arrays shorter than the {dofs} system DOFs"
            )));
        }

        self.timer_total.begin_timing();
        for timer in &mut self.timers {
            timer.reset_total();
        }
        self.solver.reset_profiling();

        self.timers[TIMER_ROTATIONS].begin_timing();
        let rest = &self.rest;
        let elasticity = &self.elasticity;
        let contributions: WeftResult<Vec<ElementContribution>> = self
            .layouts
            .par_iter()
            .enumerate()
            .map(|(i, layout)| {
                corotational::element_contribution(
                    i as u32,
                    &layout.gather(rest),
                    &layout.gather(x),
                    &layout.shapes,
                    elasticity,
                )
            })
            .collect();
        self.timers[TIMER_ROTATIONS].end_timing_additive();
        let contributions = contributions.map_err(|e| {
            error!(variant = F::NAME, error = %e, "element assembly failed");
            e
        })?;

        self.timers[TIMER_SOLVER].begin_timing();
        self.solver.reset();
        self.solver.zero();
        self.timers[TIMER_SOLVER].end_timing_additive();

        self.timers[TIMER_BUILD].begin_timing();
        self.assemble_diagonal(dt, gravity, v);
        self.scatter(dt, &contributions);
        self.timers[TIMER_BUILD].end_timing_additive();

        self.timers[TIMER_SOLVER].begin_timing();
        let stats = match self.config.solver.linear_solver {
            LinearSolverKind::Mpcg => self.solver.solve_with_guess(&v[..dofs])?,
            LinearSolverKind::Cholesky => self.solver.solve_direct()?,
        };
        self.timers[TIMER_SOLVER].end_timing_additive();

        out_v[..dofs].copy_from_slice(&self.solver.x);
        out_v[dofs..].fill(Vec3::ZERO);
        self.timer_total.end_timing();

        if out_v[..dofs].iter().any(|v| !v.is_finite()) {
            return Err(WeftError::NumericalInstability(format!(
                "{} produced non-finite velocities",
                F::NAME
            )));
        }

        if !stats.converged {
            warn!(
                variant = F::NAME,
                iterations = stats.iterations,
                residual = stats.residual,
                "linear solve did not converge"
            );
            if self.config.solver.strict_convergence {
                return Err(WeftError::SolverDivergence {
                    iterations: stats.iterations,
                    residual: stats.residual,
                });
            }
        }
        trace!(variant = F::NAME, dt, iterations = stats.iterations, "FE step");

        Ok(StepReport {
            solver: Some(stats),
            valid_timestep: self.validate_velocity_timestep(x),
        })
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
        self.solver.set_pinned(idx, is_static);
        Ok(())
    }

    fn solver(&self) -> Option<&Mpcg> {
        Some(&self.solver)
    }

    fn profiler_total(&self) -> &ProfilingTimer {
        &self.timer_total
    }

    fn sub_profilers(&self) -> Vec<&ProfilingTimer> {
        self.timers.iter().collect()
    }
}

impl<F: Formulation> FieldQuery for FeSimulation<F> {
    fn element_count(&self) -> usize {
        self.layouts.len()
    }

    fn vertex_ws_pos(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Vec3> {
        let layout = self.layout(element, x)?;
        let form = F::form(gp);
        Ok(layout
            .dofs
            .iter()
            .enumerate()
            .map(|(i, &d)| x[d] * (form[i] * layout.shape_scale[i] * layout.gather_scale[i]))
            .sum())
    }

    fn vertex_rotation(&self, element: usize, gp: Vec3, x: &[Vec3]) -> WeftResult<Mat3> {
        let layout = self.layout(element, x)?;
        let dn = F::derivatives(gp).scaled(&layout.shape_scale);
        Ok(MaterialFrame::new(&layout.gather(x), &dn).rotation())
    }

    fn vertex_stress_strain(
        &self,
        element: usize,
        gp: Vec3,
        x: &[Vec3],
    ) -> WeftResult<(Vec3, Vec3)> {
        let layout = self.layout(element, x)?;
        let dn = F::derivatives(gp).scaled(&layout.shape_scale);
        corotational::rest_stress_strain(
            &layout.gather(&self.rest),
            &layout.gather(x),
            &dn,
            &self.elasticity,
        )
        .ok_or_else(|| {
            WeftError::NumericalInstability(format!(
                "Element {element} has a singular rest frame at {gp}"
            ))
        })
    }
}
