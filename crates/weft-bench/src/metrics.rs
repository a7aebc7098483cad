//! Benchmark metrics: what one scenario run measured.

use serde::{Deserialize, Serialize};
use weft_types::{WeftError, WeftResult};

/// Metrics collected from a benchmark scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Scene name.
    pub scenario: String,
    /// Simulation variant.
    pub simulation: String,
    /// Integration scheme.
    pub integrator: String,
    pub node_count: usize,
    pub tangent_count: usize,
    pub element_count: usize,
    pub frames: u32,
    /// Integrator sub-steps over the whole run.
    pub sub_steps: u64,
    /// Total wall-clock time (seconds).
    pub total_wall_time: f64,
    /// Average wall-clock time per sub-step (seconds).
    pub avg_step_time: f64,
    /// `step_simulation` calls over the whole run.
    pub solver_calls: u64,
    /// Most linear-solver iterations any single solve needed (0 for PBD).
    pub max_iterations: u32,
    /// Whether every linear solve converged.
    pub converged: bool,
    /// Largest node displacement from the initial position.
    pub max_displacement: f32,
}

impl BenchmarkMetrics {
    pub fn to_csv_header() -> String {
        "scenario,simulation,integrator,nodes,tangents,elements,frames,sub_steps,total_wall_time_s,avg_step_ms,solver_calls,max_iterations,converged,max_displacement".to_string()
    }

    /// Format this metrics instance as a CSV data row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{:.6},{:.4},{},{},{},{:.6}",
            self.scenario,
            self.simulation,
            self.integrator,
            self.node_count,
            self.tangent_count,
            self.element_count,
            self.frames,
            self.sub_steps,
            self.total_wall_time,
            self.avg_step_time * 1000.0,
            self.solver_calls,
            self.max_iterations,
            self.converged,
            self.max_displacement,
        )
    }

    /// Header plus one row per run.
    pub fn to_csv(metrics: &[BenchmarkMetrics]) -> String {
        let mut csv = Self::to_csv_header();
        for m in metrics {
            csv.push('\n');
            csv.push_str(&m.to_csv_row());
        }
        csv
    }

    pub fn to_json(metrics: &[BenchmarkMetrics]) -> WeftResult<String> {
        serde_json::to_string_pretty(metrics).map_err(|e| WeftError::Serialization(e.to_string()))
    }
}
