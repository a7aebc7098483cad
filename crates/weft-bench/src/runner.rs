//! Benchmark runner: drives a manager through a scenario and collects
//! metrics.

use std::time::Instant;

use glam::Vec3;
use tracing::info;
use weft_sim::{IntegrationType, Manager, SimType};
use weft_types::WeftResult;

use crate::metrics::BenchmarkMetrics;
use crate::scenarios::{Scenario, ScenarioKind};

/// Runs benchmark scenarios and collects metrics.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    /// Runs one scenario to completion.
    pub fn run(scenario: &Scenario) -> WeftResult<BenchmarkMetrics> {
        let mut manager = Manager::with_generator(
            scenario.config.clone(),
            scenario.generator()?,
            scenario.sim_type,
        )?;
        for &node in &scenario.pinned {
            manager.set_is_static(node as usize, true)?;
        }

        let base = manager.base();
        let (node_count, tangent_count, element_count) =
            (base.node_count, base.tangent_count, base.elements.len());
        let tracked = node_count.min(manager.integrator().x().len());
        let initial: Vec<Vec3> = manager.integrator().x()[..tracked].to_vec();

        let mut sub_steps: u64 = 0;
        let mut solver_calls: u64 = 0;
        let mut max_iterations = 0;
        let mut converged = true;

        let total_start = Instant::now();
        for _ in 0..scenario.frames {
            let report = manager.update(scenario.frame_dt)?;
            sub_steps += u64::from(report.sub_steps);
            solver_calls += u64::from(manager.integrator().solver_calls());
            if let Some(solve) = report.solve {
                max_iterations = max_iterations.max(solve.max_iterations);
                converged &= solve.converged;
            }
        }
        let total_wall_time = total_start.elapsed().as_secs_f64();

        let max_displacement = manager.integrator().x()[..tracked]
            .iter()
            .zip(&initial)
            .map(|(x, x0)| (*x - *x0).length())
            .fold(0.0f32, f32::max);

        let avg_step_time = if sub_steps > 0 {
            total_wall_time / sub_steps as f64
        } else {
            0.0
        };

        let metrics = BenchmarkMetrics {
            scenario: scenario.kind.name().to_string(),
            simulation: scenario.sim_type.name().to_string(),
            integrator: scenario.config.integrator.kind.name().to_string(),
            node_count,
            tangent_count,
            element_count,
            frames: scenario.frames,
            sub_steps,
            total_wall_time,
            avg_step_time,
            solver_calls,
            max_iterations,
            converged,
            max_displacement,
        };
        info!(
            scenario = %scenario.label(),
            wall_time_s = metrics.total_wall_time,
            sub_steps = metrics.sub_steps,
            "Benchmark finished"
        );
        Ok(metrics)
    }

    /// Runs every combination of scene, variant and scheme.
    pub fn run_matrix(
        kinds: &[ScenarioKind],
        sim_types: &[SimType],
        schemes: &[IntegrationType],
        frames: Option<u32>,
    ) -> WeftResult<Vec<BenchmarkMetrics>> {
        let mut results = Vec::with_capacity(kinds.len() * sim_types.len() * schemes.len());
        for &kind in kinds {
            for &sim_type in sim_types {
                for &scheme in schemes {
                    let mut scenario = Scenario::from_kind(kind)
                        .with_sim_type(sim_type)
                        .with_integrator(scheme);
                    if let Some(frames) = frames {
                        scenario.frames = frames;
                    }
                    results.push(Self::run(&scenario)?);
                }
            }
        }
        Ok(results)
    }

    /// Every scene with every variant, using the default scheme.
    pub fn run_all() -> WeftResult<Vec<BenchmarkMetrics>> {
        Self::run_matrix(
            ScenarioKind::all(),
            &SimType::ALL,
            &[IntegrationType::default()],
            None,
        )
    }
}
