//! Simulation runtime CLI entry point.
//!
//! Loads a simulation file, brings every resource up, and tears them down on
//! Ctrl-C (or right away with `--once`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sim_runtime_common::SimulationFile;
use sim_runtime_resources::Simulator;

/// Run a local resource simulation.
#[derive(Debug, Parser)]
#[command(name = "sim-runtime", version, about)]
struct Args {
    /// Simulation file (TOML, or JSON by extension).
    #[arg(short, long)]
    config: PathBuf,

    /// Emit every traced activity to the log.
    #[arg(short, long, env = "SIM_VERBOSE")]
    verbose: bool,

    /// Start, then stop immediately instead of waiting for Ctrl-C.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sim_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting simulation runtime");

    let mut file = SimulationFile::from_file(&args.config)
        .with_context(|| format!("Failed to load simulation file {}", args.config.display()))?;
    if args.verbose {
        file.simulator.trace.verbose = true;
    }

    info!(
        path = %args.config.display(),
        resources = file.resources.len(),
        backend = ?file.simulator.storage.backend,
        "Configuration loaded"
    );

    let mut simulator = Simulator::from_file(&file).context("Invalid simulation file")?;
    let once = args.once;
    let shutdown = async move {
        if !once {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutdown requested");
        }
        Ok::<(), anyhow::Error>(())
    };

    info!(resources = ?simulator.resource_ids(), "Simulation starting");

    // Cleanup failures are reported, not turned into a failing exit.
    let report = simulator.run_until(shutdown).await?;
    if !report.is_clean() {
        warn!(failed = ?report.failed_ids(), "Some resources were not cleaned up");
    }

    info!(activities = simulator.traces().len(), "Simulation stopped");
    Ok(())
}
