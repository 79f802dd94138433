//! Hyperlapse Simulator CLI
//!
//! Run the hyperlapse pipeline against the synthetic street-view provider.

use clap::Parser;
use hyperlapse_core::HyperlapseConfig;
use hyperlapse_sim::scenarios::ScenarioId;
use hyperlapse_sim::{RunSummary, ScenarioResult, ScenarioRunner};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Hyperlapse Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "hyperlapse-sim")]
#[command(about = "Run deterministic hyperlapse simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (cruise, winding, long_haul, coverage_gap, elevation_outage, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Virtual seconds of playback after loading
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Target distance between samples in meters
    #[arg(long)]
    spacing: Option<f64>,

    /// Maximum number of route samples
    #[arg(long)]
    max_points: Option<usize>,

    /// Hyperlapse configuration as a JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the sequence and rendered frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Keep every n-th rendered frame in the export
    #[arg(long, default_value = "4")]
    export_every: usize,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flag
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("hyperlapse-sim {}", env!("CARGO_PKG_VERSION"));
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    let config = args.config.as_deref().map(|path| {
        let json = std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error: cannot read {}: {}", path, e);
            std::process::exit(1);
        });
        HyperlapseConfig::from_json_str(&json).unwrap_or_else(|e| {
            eprintln!("Error: {}: {}", path, e);
            std::process::exit(1);
        })
    });

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner_for = |seed: u64| {
        let mut runner = ScenarioRunner::new(seed).with_duration(args.duration);
        if let Some(spacing) = args.spacing {
            runner = runner.with_spacing(spacing);
        }
        if let Some(max_points) = args.max_points {
            runner = runner.with_max_points(max_points);
        }
        if let Some(config) = &config {
            runner = runner.with_config(config.clone());
        }
        runner
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let runner = runner_for(base_seed).with_recording(args.export_every);
        let (result, export) = match runner.run_with_export(scenarios[0]) {
            Ok(run) => run,
            Err(e) => {
                error!("FAIL {} seed={}: {}", scenarios[0], base_seed, e);
                std::process::exit(1);
            }
        };

        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {}", e);
            std::process::exit(1);
        }
        info!("Exported {} frames to {}", export.frames.len(), export_path);

        log_result(&result);
        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    let mut summary = RunSummary::default();
    for seed in (0..args.seeds as u64).map(|offset| base_seed.wrapping_add(offset)) {
        let runner = runner_for(seed);
        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                log_result(&result);
            }
            summary.record(result);
        }
    }

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: cannot serialize summary: {}", e);
                std::process::exit(1);
            }
        }
    } else if summary.all_passed() {
        info!("{}/{} scenario runs passed", summary.passed, summary.total);
    } else {
        error!("{}/{} scenario runs failed:", summary.failed, summary.total);
        for result in summary.failures() {
            error!(
                "  {} seed={}: {}",
                result.scenario,
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    if !summary.all_passed() {
        std::process::exit(1);
    }
}

fn log_result(result: &ScenarioResult) {
    if result.passed {
        info!(
            "ok   {} seed={}: {} frames, {} rendered, {:.1}s virtual",
            result.scenario,
            result.seed,
            result.frames,
            result.metrics.frames_rendered,
            result.final_time_secs
        );
    } else {
        error!(
            "FAIL {} seed={}: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}
