//! CLI command implementations.

use std::error::Error;

use weft_bench::metrics::BenchmarkMetrics;
use weft_bench::runner::BenchmarkRunner;
use weft_bench::scenarios::{Scenario, ScenarioKind};
use weft_mesh::{Generator, SquareGrid};
use weft_sim::{IntegrationType, Manager, SimConfig, SimType};
use weft_telemetry::TracingSink;

type CommandResult = Result<(), Box<dyn Error>>;

/// Run a scene with the given config and print a summary.
pub fn simulate(config_path: Option<&str>, scene: &str, sim: &str, frames: u32) -> CommandResult {
    let config = match config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let kind: ScenarioKind = scene.parse()?;
    let sim_type: SimType = sim.parse()?;

    let mut scenario = Scenario::from_kind(kind)
        .with_sim_type(sim_type)
        .with_frames(frames);
    scenario.config = config;

    println!("Weft Simulation");
    println!("───────────────");
    println!("Config:     {}", config_path.unwrap_or("(defaults)"));
    println!("Run:        {}", scenario.label());

    let mut manager =
        Manager::with_generator(scenario.config.clone(), scenario.generator()?, sim_type)?;
    for &node in &scenario.pinned {
        manager.set_is_static(node as usize, true)?;
    }
    manager.events_mut().add_sink(Box::new(TracingSink::new()));

    let base = manager.base();
    println!(
        "Topology:   {} nodes, {} tangents, {} elements",
        base.node_count,
        base.tangent_count,
        base.elements.len()
    );
    println!();

    let mut sub_steps = 0u64;
    let mut wall_ms = 0.0;
    let mut worst_iterations = 0;
    for _ in 0..scenario.frames {
        let report = manager.update(scenario.frame_dt)?;
        sub_steps += u64::from(report.sub_steps);
        wall_ms += report.wall_time_ms;
        if let Some(solve) = report.solve {
            worst_iterations = worst_iterations.max(solve.max_iterations);
        }
    }
    manager.events_mut().finalize();

    let integrator = manager.integrator();
    println!("Sim time:       {:.3}s", integrator.elapsed());
    println!("Sub-steps:      {sub_steps}");
    println!("Wall time:      {:.1}ms", wall_ms);
    if sub_steps > 0 {
        println!("Avg sub-step:   {:.3}ms", wall_ms / sub_steps as f64);
    }
    if let Some(simulation) = manager.simulation() {
        if simulation.solver().is_some() {
            println!("Max CG iters:   {worst_iterations}");
        }
        let last = simulation.profiler_total();
        println!("Last step:      {:.3}ms", last.total_ms());
        for timer in simulation.sub_profilers() {
            println!("  {:<14}{:.3}ms", timer.alias(), timer.total_ms());
        }
    }

    let lowest = integrator
        .x()
        .iter()
        .take(manager.base().node_count)
        .map(|p| p.y)
        .fold(f32::INFINITY, f32::min);
    if lowest.is_finite() {
        println!("Lowest node y:  {lowest:.4}");
    }
    Ok(())
}

fn parse_all<T: Copy>(
    name: &str,
    all: &[T],
    parse: impl Fn(&str) -> Result<T, Box<dyn Error>>,
) -> Result<Vec<T>, Box<dyn Error>> {
    if name == "all" {
        Ok(all.to_vec())
    } else {
        Ok(vec![parse(name)?])
    }
}

/// Run the benchmark suite.
pub fn benchmark(
    scenario_name: &str,
    sim_name: &str,
    integrator_name: &str,
    frames: Option<u32>,
    output_path: Option<&str>,
    json: bool,
) -> CommandResult {
    println!("Weft Benchmark Suite");
    println!("════════════════════");
    println!();

    let kinds = parse_all(scenario_name, ScenarioKind::all(), |s| Ok(s.parse()?))?;
    let sim_types = parse_all(sim_name, &SimType::ALL, |s| Ok(s.parse()?))?;
    let schemes = parse_all(integrator_name, &IntegrationType::ALL, |s| Ok(s.parse()?))?;

    let all_metrics = BenchmarkRunner::run_matrix(&kinds, &sim_types, &schemes, frames)
        .map_err(|e| format!("Benchmark failed: {e}"))?;

    for m in &all_metrics {
        println!(
            "{}/{}/{} ({} nodes, {} elements, {} frames)",
            m.scenario, m.simulation, m.integrator, m.node_count, m.element_count, m.frames
        );
        println!("  Wall time:     {:.3}s", m.total_wall_time);
        println!("  Avg step:      {:.3}ms", m.avg_step_time * 1000.0);
        println!("  Max iters:     {}", m.max_iterations);
        println!("  Max displace:  {:.4}m", m.max_displacement);
        println!();
    }

    let text = if json {
        BenchmarkMetrics::to_json(&all_metrics)?
    } else {
        BenchmarkMetrics::to_csv(&all_metrics)
    };
    if let Some(path) = output_path {
        std::fs::write(path, &text)?;
        println!("Results written to: {path}");
    } else {
        println!("{}", if json { "JSON Output:" } else { "CSV Output:" });
        println!("{text}");
    }

    Ok(())
}

/// Print what a square grid with `subdivisions` quads per side generates.
pub fn grid(subdivisions: u32) -> CommandResult {
    let grid = SquareGrid::new(subdivisions);
    let out = grid.generate()?;

    println!("Square Grid");
    println!("───────────");
    println!("Quads per side:  {}", grid.visual_subdivisions());
    println!("Nodes per side:  {}", grid.subdivisions());
    println!("Nodes:           {}", out.node_count);
    println!("Tangents:        {}", out.tangent_count);
    println!("Elements:        {}", out.elements.len());
    println!("DOFs:            {}", out.dof_count());
    Ok(())
}

/// Validate a simulation config.
pub fn validate(path: &str) -> CommandResult {
    println!("Weft Validator");
    println!("──────────────");
    println!();

    if path.ends_with(".toml") {
        println!("Validating config: {path}");
        match SimConfig::load(path) {
            Ok(_) => println!("✅ Config is valid."),
            Err(e) => println!("❌ Config validation failed: {e}"),
        }
    } else {
        println!("Unsupported file format. Use .toml (config).");
    }

    Ok(())
}
