#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use peersync_sim::campaign::{CampaignConfig, run_campaign};
use peersync_sim::{SimulationConfig, Simulator};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "peersync-sim",
    version,
    about = "Deterministic convergence simulation for peersync replicas",
    long_about = None
)]
struct Cli {
    /// Seed of the first run.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of consecutive seeds to run as a campaign.
    #[arg(long, default_value_t = 1)]
    seeds: u64,

    /// Override the number of replicas.
    #[arg(long)]
    replicas: Option<usize>,

    /// Override the number of faulty editing rounds.
    #[arg(long)]
    rounds: Option<u64>,

    /// TOML file with simulation parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut simulation = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(replicas) = cli.replicas {
        simulation.replica_count = replicas;
    }
    if let Some(rounds) = cli.rounds {
        simulation.rounds = rounds;
    }

    if cli.seeds <= 1 {
        simulation.seed = cli.seed;
        let result = Simulator::new(simulation)?.run()?;
        let oracle = result.check();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "result": result,
                    "oracle": oracle,
                }))?
            );
        } else {
            println!(
                "seed {}: edits={} resolved={} merged={} dropped={} sync_rounds={} converged={}",
                result.seed,
                result.stats.edits,
                result.stats.resolved,
                result.stats.merged,
                result.stats.frames_dropped,
                result.sync_rounds,
                oracle.passed
            );
            for violation in &oracle.violations {
                println!("  {violation}");
            }
        }
        if !oracle.passed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let campaign = CampaignConfig {
        seed_range: cli.seed..cli.seed.saturating_add(cli.seeds),
        simulation,
    };
    let report = run_campaign(&campaign)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign: {}/{} seeds passed, {} conflicts resolved ({} by tie-break), {} interesting",
            report.seeds_passed,
            report.seeds_run,
            report.conflicts_resolved,
            report.tie_breaks,
            report.interesting_states_reached
        );
        if let Some(seed) = report.first_failure {
            println!("first failure: seed {seed} (replay with --seed {seed})");
        }
    }
    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PEERSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "peersync=debug,info"
        } else {
            "peersync=info,warn"
        })
    });

    let format = env::var("PEERSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}
