//! # csma-sim
//!
//! Runs one simulation from a YAML configuration and prints its summary.

use clap::Parser;
use csma_sim::logger;
use csma_sim::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

/// Shared medium access simulator
#[derive(Parser, Debug)]
#[command(name = "csma-sim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration
    config: PathBuf,

    /// Overrides the seed of the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Stops once no event before this simulation time (in seconds) is left,
    /// required unless the configuration sets a limit
    #[arg(long, value_name = "SECS")]
    until: Option<f64>,

    /// Log filter directives, falls back to RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Suppresses the runtime banners
    #[arg(long)]
    quiet: bool,
}

fn run(cli: Cli) -> Result<Summary, Box<dyn std::error::Error>> {
    logger::init(cli.log.as_deref())?;

    let mut config = SimConfig::load(&cli.config)?;
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(until) = cli.until {
        let until = Duration::try_from_secs_f64(until)
            .map_err(|_| format!("--until {until} is not a valid simulation time"))?;
        config.limit.time = Some(SimTime::from_duration(until));
    }
    config.ensure_bounded()?;

    let sim = MacSim::new(config)?;
    let mut builder = sim.builder();
    if cli.quiet {
        builder = builder.quiet();
    }

    let (sim, end, profiler) = builder.build(sim).run().map_err(|e| e.to_string())?;
    tracing::info!(
        events = profiler.event_count,
        "finished at {end} after {:?}",
        profiler.duration
    );
    Ok(sim.summary(end))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).and_then(|summary| Ok(serde_yml::to_string(&summary)?)) {
        Ok(yaml) => {
            print!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
