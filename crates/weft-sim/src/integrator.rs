//! Fixed-sub-step time integration.
//!
//! The integrator owns the state arrays `x` and `v` over every DOF (nodes
//! first, then tangents) and advances them in fixed sub-steps of length
//! `h`, carrying the remainder of each frame over to the next call.
//!
//! ```text
//! accum += real_dt
//! while accum ≥ h:
//!     actuators(elapsed, x, v)
//!     scheme(h)            // explicit, RK2 or RK4
//!     elapsed += h
//! on_step_complete(self)
//! ```
//!
//! A scheme writes into scratch buffers and only commits `x` and `v` once
//! every stage has succeeded, so a failed sub-step leaves the state as the
//! actuators left it.
//!
//! Each stage call `step_simulation(dt, x_s, v_s)` is read as a slope
//! `a_s = (out − v_s) / dt`. The stage velocity `v + a_s·dt_s` feeds the
//! position update and the slope feeds the velocity update, so every scheme
//! reproduces `v + a·h` and `x + v·h + a·h²/2` under constant acceleration.
//! Pinned DOFs take the last stage output as is, and position-based
//! variants always take a single full-length step.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use weft_math::SolveStats;
use weft_mesh::{Actuator, GeneratorOutput};
use weft_types::constants::{DEFAULT_SUB_TIMESTEP, GRAVITY};
use weft_types::{ProfilingTimer, WeftError, WeftResult};

use crate::config::IntegratorConfig;
use crate::simulation::{Simulation, StepReport};

/// Time-stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// One solve at `h`.
    Explicit,
    /// Midpoint: one solve at `h/2` from `x + v·h/2`.
    #[default]
    Rk2,
    /// Classic fourth order, three solves.
    Rk4,
}

impl IntegrationType {
    pub const ALL: [IntegrationType; 3] = [
        IntegrationType::Explicit,
        IntegrationType::Rk2,
        IntegrationType::Rk4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntegrationType::Explicit => "explicit",
            IntegrationType::Rk2 => "rk2",
            IntegrationType::Rk4 => "rk4",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IntegrationType {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "explicit" | "euler" => Ok(IntegrationType::Explicit),
            "rk2" | "midpoint" => Ok(IntegrationType::Rk2),
            "rk4" => Ok(IntegrationType::Rk4),
            other => Err(WeftError::InvalidConfig(format!(
                "Unknown integrator '{other}' (explicit, rk2, rk4)"
            ))),
        }
    }
}

/// Called once at the end of every [`Integrator::update_simulation`].
pub type StepCallback = Box<dyn FnMut(&Integrator) + Send>;

/// Linear-solve statistics gathered over one `update_simulation` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSolveSummary {
    pub solves: u32,
    pub max_iterations: u32,
    pub worst_residual: f64,
    /// `false` if any solve in the frame missed its tolerance.
    pub converged: bool,
}

impl Default for FrameSolveSummary {
    fn default() -> Self {
        Self {
            solves: 0,
            max_iterations: 0,
            worst_residual: 0.0,
            converged: true,
        }
    }
}

impl FrameSolveSummary {
    fn record(&mut self, stats: SolveStats) {
        self.solves += 1;
        self.max_iterations = self.max_iterations.max(stats.iterations);
        self.worst_residual = self.worst_residual.max(stats.residual);
        self.converged &= stats.converged;
    }
}

/// State arrays plus the scratch space the schemes write into.
#[derive(Default)]
struct Buffers {
    x: Vec<Vec3>,
    v: Vec<Vec3>,
    /// Stage positions.
    x_tmp: Vec<Vec3>,
    /// Stage velocities; RK4 uses all three.
    stages: [Vec<Vec3>; 3],
    /// Static flags of the simulation, refreshed every sub-step.
    pinned: Vec<bool>,
}

impl Buffers {
    fn resize(&mut self, dofs: usize) {
        let state = [&mut self.x, &mut self.v, &mut self.x_tmp];
        for buf in state.into_iter().chain(self.stages.iter_mut()) {
            buf.clear();
            buf.resize(dofs, Vec3::ZERO);
        }
        self.pinned.clear();
        self.pinned.resize(dofs, false);
    }
}

/// `x_tmp = x + vel·dt`.
fn offset_positions(x_tmp: &mut [Vec3], x: &[Vec3], vel: &[Vec3], dt: f32) {
    for ((t, x), v) in x_tmp.iter_mut().zip(x).zip(vel) {
        *t = *x + *v * dt;
    }
}

/// Turns the raw output of a stage started from `from` into the velocity
/// `v + (out − from)` reached from the start-of-step velocity `v`.
fn rebase_stage(out: &mut [Vec3], from: &[Vec3], v: &[Vec3], pinned: &[bool]) {
    for (i, o) in out.iter_mut().enumerate() {
        if !pinned[i] {
            *o += v[i] - from[i];
        }
    }
}

/// Counts and records the `step_simulation` calls of one sub-step.
struct StageRunner<'a> {
    sim: &'a mut dyn Simulation,
    gravity: Vec3,
    calls: &'a mut u32,
    summary: &'a mut FrameSolveSummary,
}

impl StageRunner<'_> {
    /// Runs one stage and returns whether the simulation accepts it.
    fn run(&mut self, dt: f32, x: &[Vec3], v: &[Vec3], out: &mut [Vec3]) -> WeftResult<bool> {
        *self.calls += 1;
        let report: StepReport = self.sim.step_simulation(dt, self.gravity, x, v, out)?;
        if let Some(stats) = report.solver {
            self.summary.record(stats);
        }
        Ok(report.valid_timestep)
    }
}

/// Drives a [`Simulation`] through time.
pub struct Integrator {
    simulation: Option<Box<dyn Simulation>>,
    buffers: Buffers,
    actuators: Vec<Actuator>,

    kind: IntegrationType,
    sub_timestep: f32,
    gravity: Vec3,

    accum: f64,
    elapsed: f64,
    solver_calls: u32,
    summary: FrameSolveSummary,
    timer_total: ProfilingTimer,

    on_step_complete: Option<StepCallback>,
}

impl Integrator {
    pub fn new() -> Self {
        Self {
            simulation: None,
            buffers: Buffers::default(),
            actuators: Vec::new(),
            kind: IntegrationType::default(),
            sub_timestep: DEFAULT_SUB_TIMESTEP,
            gravity: Vec3::new(0.0, -GRAVITY, 0.0),
            accum: 0.0,
            elapsed: 0.0,
            solver_calls: 0,
            summary: FrameSolveSummary::default(),
            timer_total: ProfilingTimer::new("Total Time"),
            on_step_complete: None,
        }
    }

    /// An integrator with the scheme, sub-step and gravity of `config`.
    pub fn from_config(config: &IntegratorConfig) -> WeftResult<Self> {
        let mut integrator = Self::new();
        integrator.set_integration_type(config.kind);
        integrator.set_sub_timestep(config.sub_timestep)?;
        integrator.set_gravity(config.gravity());
        Ok(integrator)
    }

    /// Takes ownership of an initialized simulation and resets the state
    /// to the output's current positions at rest.
    pub fn initialize(
        &mut self,
        simulation: Box<dyn Simulation>,
        output: &GeneratorOutput,
    ) -> WeftResult<()> {
        let dofs = output.dof_count();
        if output.positions.len() != dofs {
            return Err(WeftError::InvalidTopology(format!(
                "Output has {} positions for {} DOFs",
                output.positions.len(),
                dofs
            )));
        }

        self.buffers.resize(dofs);
        self.buffers.x.copy_from_slice(&output.positions);
        self.actuators = output.actuators.clone();
        self.accum = 0.0;
        self.elapsed = 0.0;
        self.solver_calls = 0;
        self.summary = FrameSolveSummary::default();

        debug!(
            simulation = simulation.name(),
            dofs,
            actuators = self.actuators.len(),
            "Integrator initialized"
        );
        self.simulation = Some(simulation);
        Ok(())
    }

    /// Advances by `real_dt` seconds of wall time and returns the number
    /// of sub-steps taken.
    ///
    /// A failing sub-step is discarded, the accumulated remainder is
    /// dropped, and the error is returned. The completion callback fires
    /// once either way, after the last committed sub-step.
    pub fn update_simulation(&mut self, real_dt: f32) -> WeftResult<u32> {
        if !(real_dt >= 0.0) || !real_dt.is_finite() {
            return Err(WeftError::InvariantViolation(format!(
                "update_simulation needs a finite, non-negative dt, got {real_dt}"
            )));
        }
        let Some(simulation) = self.simulation.as_deref_mut() else {
            return Err(WeftError::InvariantViolation(
                "update_simulation called before initialize".into(),
            ));
        };

        self.timer_total.begin_timing();
        self.solver_calls = 0;
        self.summary = FrameSolveSummary::default();

        let h = self.sub_timestep;
        let mut sub_steps = 0;
        self.accum += f64::from(real_dt);
        while self.accum - f64::from(h) >= 0.0 {
            for actuator in &self.actuators {
                actuator.apply(
                    self.elapsed as f32,
                    &mut self.buffers.x,
                    &mut self.buffers.v,
                );
            }

            let result = sub_step(
                self.kind,
                simulation,
                &mut self.buffers,
                h,
                self.gravity,
                &mut self.solver_calls,
                &mut self.summary,
            );
            if let Err(e) = result {
                self.accum = 0.0;
                self.timer_total.end_timing();
                self.notify();
                return Err(e);
            }

            self.elapsed += f64::from(h);
            self.accum -= f64::from(h);
            sub_steps += 1;
        }

        self.timer_total.end_timing();
        trace!(sub_steps, elapsed = self.elapsed, "Frame integrated");
        self.notify();
        Ok(sub_steps)
    }

    /// Fires the completion callback.
    pub fn notify(&mut self) {
        if let Some(mut callback) = self.on_step_complete.take() {
            callback(self);
            self.on_step_complete = Some(callback);
        }
    }

    pub fn set_on_step_complete(&mut self, callback: StepCallback) {
        self.on_step_complete = Some(callback);
    }

    /// Positions of every DOF.
    pub fn x(&self) -> &[Vec3] {
        &self.buffers.x
    }

    /// Velocities of every DOF.
    pub fn dxdt(&self) -> &[Vec3] {
        &self.buffers.v
    }

    pub fn x_mut(&mut self) -> &mut [Vec3] {
        &mut self.buffers.x
    }

    pub fn dxdt_mut(&mut self) -> &mut [Vec3] {
        &mut self.buffers.v
    }

    pub fn integration_type(&self) -> IntegrationType {
        self.kind
    }

    /// Switches the scheme. The stage buffers are already sized for RK4.
    pub fn set_integration_type(&mut self, kind: IntegrationType) {
        self.kind = kind;
    }

    pub fn sub_timestep(&self) -> f32 {
        self.sub_timestep
    }

    pub fn set_sub_timestep(&mut self, h: f32) -> WeftResult<()> {
        if !(h > 0.0) || !h.is_finite() {
            return Err(WeftError::InvalidConfig(format!(
                "sub_timestep must be positive and finite, got {h}"
            )));
        }
        self.sub_timestep = h;
        Ok(())
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn simulation(&self) -> Option<&dyn Simulation> {
        self.simulation.as_deref()
    }

    pub fn simulation_mut(&mut self) -> Option<&mut (dyn Simulation + 'static)> {
        self.simulation.as_deref_mut()
    }

    /// Removes the simulation, leaving the integrator uninitialized.
    pub fn take_simulation(&mut self) -> Option<Box<dyn Simulation>> {
        self.simulation.take()
    }

    /// Simulation time advanced since the last initialize.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// `step_simulation` calls made in the last update.
    pub fn solver_calls(&self) -> u32 {
        self.solver_calls
    }

    pub fn frame_summary(&self) -> FrameSolveSummary {
        self.summary
    }

    pub fn profiler_total(&self) -> &ProfilingTimer {
        &self.timer_total
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

/// One sub-step of the chosen scheme.
fn sub_step(
    kind: IntegrationType,
    sim: &mut dyn Simulation,
    buf: &mut Buffers,
    h: f32,
    gravity: Vec3,
    calls: &mut u32,
    summary: &mut FrameSolveSummary,
) -> WeftResult<()> {
    let kind = if sim.is_position_based() {
        IntegrationType::Explicit
    } else {
        kind
    };
    for (i, p) in buf.pinned.iter_mut().enumerate() {
        *p = sim.is_static(i);
    }

    let Buffers {
        x,
        v,
        x_tmp,
        stages,
        pinned,
    } = buf;
    let [k2, k3, k4] = stages;
    let mut runner = StageRunner {
        sim,
        gravity,
        calls,
        summary,
    };
    let half = h * 0.5;

    match kind {
        IntegrationType::Explicit => {
            if !runner.run(h, x, v, k2)? {
                debug!(?kind, "Sub-step rejected by the simulation");
                return Ok(());
            }
            v.copy_from_slice(k2);
            for (x, v) in x.iter_mut().zip(v.iter()) {
                *x += *v * h;
            }
        }
        IntegrationType::Rk2 => {
            offset_positions(x_tmp, x, v, half);
            if !runner.run(half, x_tmp, v, k2)? {
                debug!(?kind, "Sub-step rejected by the simulation");
                return Ok(());
            }
            // k2 is the midpoint velocity; its slope spans the whole step.
            for i in 0..x.len() {
                x[i] += k2[i] * h;
                v[i] = if pinned[i] {
                    k2[i]
                } else {
                    v[i] + (k2[i] - v[i]) * 2.0
                };
            }
        }
        IntegrationType::Rk4 => {
            offset_positions(x_tmp, x, v, half);
            let valid2 = runner.run(half, x_tmp, v, k2)?;

            offset_positions(x_tmp, x, k2, half);
            let valid3 = runner.run(half, x_tmp, k2, k3)?;
            rebase_stage(k3, k2, v, pinned);

            offset_positions(x_tmp, x, k3, h);
            let valid4 = runner.run(h, x_tmp, k3, k4)?;
            rebase_stage(k4, k3, v, pinned);

            if !(valid2 && valid3 && valid4) {
                debug!(?kind, "Sub-step rejected by the simulation");
                return Ok(());
            }
            // No slope is sampled at the start of the step, so the first
            // midpoint slope stands in for it.
            for i in 0..x.len() {
                if pinned[i] {
                    v[i] = k4[i];
                    x[i] += v[i] * h;
                    continue;
                }
                let (d2, d3, d4) = (k2[i] - v[i], k3[i] - v[i], k4[i] - v[i]);
                x[i] += (v[i] + (k2[i] + k3[i]) * 2.0 + k4[i]) * (h / 6.0);
                v[i] += (d2 * 6.0 + d3 * 4.0 + d4) / 6.0;
            }
        }
    }
    Ok(())
}
