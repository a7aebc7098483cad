//! Weft CLI: simulation, benchmarking and grid inspection.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about = "Weft: corotational FE and PBD cloth simulation")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene with a simulation config.
    Simulate {
        /// Path to simulation config (TOML). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<String>,

        /// Scene to run (flat_drop, bend_test).
        #[arg(long, default_value = "flat_drop")]
        scene: String,

        /// Simulation variant (fe_c0, fe_c1, fe_c1_alt, pbd).
        #[arg(long, default_value = "fe_c1")]
        sim: String,

        /// Frames at 60 fps.
        #[arg(short, long, default_value_t = 60)]
        frames: u32,
    },

    /// Run the benchmark suite.
    Benchmark {
        /// Which scenario to run (flat_drop, bend_test, all).
        #[arg(short, long, default_value = "all")]
        scenario: String,

        /// Which variant to run (fe_c0, fe_c1, fe_c1_alt, pbd, all).
        #[arg(long, default_value = "all")]
        sim: String,

        /// Integration scheme (explicit, rk2, rk4, all).
        #[arg(long, default_value = "rk2")]
        integrator: String,

        /// Override the frame count of every scenario.
        #[arg(long)]
        frames: Option<u32>,

        /// Output file path (CSV, or JSON with --json).
        #[arg(short, long)]
        output: Option<String>,

        /// Write JSON instead of CSV.
        #[arg(long)]
        json: bool,
    },

    /// Print the counts a square grid generates.
    Grid {
        /// Quads per side.
        #[arg(short = 'v', long, default_value_t = 4)]
        subdivisions: u32,
    },

    /// Validate a simulation config.
    Validate {
        /// Path to config file (TOML).
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Simulate {
            config,
            scene,
            sim,
            frames,
        } => commands::simulate(config.as_deref(), &scene, &sim, frames),
        Commands::Benchmark {
            scenario,
            sim,
            integrator,
            frames,
            output,
            json,
        } => commands::benchmark(&scenario, &sim, &integrator, frames, output.as_deref(), json),
        Commands::Grid { subdivisions } => commands::grid(subdivisions),
        Commands::Validate { path } => commands::validate(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
