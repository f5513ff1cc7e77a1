//! ---
//! fms_section: "01-core-functionality"
//! fms_subsection: "binary"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Binary entrypoint for the R-FMS master daemon."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use r_fms_common::config::MasterConfig;
use r_fms_common::logging::init_tracing;
use r_fms_common::time::SystemClock;
use r_fms_master::{
    FleetOrchestrator, HeartbeatWatchdog, NullDeploymentManager, NullRemoteClient,
};
use tokio::signal;
use tracing::{info, warn};

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["configs/r-fms.toml", "/etc/r-fms/r-fms.toml"];

#[derive(Debug, Parser)]
#[command(author, version, about = "R-FMS master daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the master")]
    Run,
    #[command(about = "Validate the configuration and exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => MasterConfig::load_with_source(std::slice::from_ref(path))?,
        None => MasterConfig::load_with_source(DEFAULT_CONFIG_CANDIDATES)?,
    };
    let config = loaded.config;

    if matches!(cli.command, Some(Commands::CheckConfig)) {
        println!("configuration ok: {}", loaded.source.display());
        return Ok(());
    }

    init_tracing("r-fmsd", &config.logging)?;
    info!(config_path = %loaded.source.display(), "master configuration loaded");

    let clock = Arc::new(SystemClock);
    let orchestrator = Arc::new(FleetOrchestrator::new(
        Arc::new(NullRemoteClient),
        Arc::new(NullDeploymentManager),
        clock.clone(),
        &config.orchestration,
    ));

    // Pre-register the declared inventory so callbacks for configured
    // nodes are never dropped as unknown.
    let controllers = config.inventory.controller_definitions();
    orchestrator.active_controllers(&controllers);
    let units = config.inventory.unit_definitions()?;
    orchestrator.active_units(&units);
    for group in config.inventory.group_definitions()? {
        orchestrator.active_group(&group);
    }
    info!(
        controllers = controllers.len(),
        units = units.len(),
        "declared inventory registered"
    );

    let watchdog = HeartbeatWatchdog::spawn(orchestrator.clone(), clock, config.watchdog.clone());

    info!("master started; waiting for shutdown signal");
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }

    watchdog.shutdown().await?;
    info!("master shutdown complete");
    Ok(())
}
