//! Swap Solver Service
//!
//! Main service binary that runs all solver tasks concurrently:
//! - Event watchers: poll both chains for lock/redeem activity
//! - Lock schedulers: serialize counter-lock submissions per chain
//! - Control API: health, introspection and out-of-band lock notification
//!
//! ## Usage
//!
//! ```bash
//! cargo run -- --config solver.toml
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! SOLVER_CONFIG_PATH=solver.toml cargo run
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use swap_solver::{
    api::run_api_server, scheduler::run_lock_worker, ChainId, ChainWatcher, SolverConfig,
    SolverEngine,
};
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swap-solver")]
#[command(about = "Atomic-swap solver service - counter-locks and completes HTLC swaps")]
struct Args {
    /// Path to solver configuration file (default: config/solver.toml or
    /// SOLVER_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    info!("Starting Swap Solver Service");

    // Load configuration
    // Priority: CLI arg > env var > default
    let config = if let Some(path) = args.config {
        info!("Loading configuration from: {}", path);
        SolverConfig::load_from_path(Some(&path))?
    } else {
        if let Ok(path) = std::env::var("SOLVER_CONFIG_PATH") {
            info!("Loading configuration from SOLVER_CONFIG_PATH: {}", path);
        } else {
            info!("Loading configuration from default location");
        }
        SolverConfig::load()?
    };

    info!("Configuration loaded successfully");
    info!(
        "Aztec chain: {} ({})",
        config.aztec_chain.name, config.aztec_chain.chain_label
    );
    info!(
        "EVM chain: {} (chain ID: {})",
        config.evm_chain.name, config.evm_chain.chain_id
    );
    info!("Polling interval: {}ms", config.service.poll_interval_ms);

    let api_host = config.service.api_host.clone();
    let api_port = config.service.api_port;

    let (engine, lock_jobs) = SolverEngine::new(config)?;

    // Both chains must be able to sign for the solver before anything runs:
    // the PXE gets the solver account registered, and the EVM node must
    // already manage the solver key.
    info!("Running startup signing checks...");
    engine
        .startup_checks()
        .await
        .context("Startup signing checks failed")?;
    info!("Startup signing checks passed");

    let aztec_watcher = ChainWatcher::new(Arc::clone(&engine), ChainId::Aztec);
    let evm_watcher = ChainWatcher::new(Arc::clone(&engine), ChainId::Evm);

    let aztec_lock_worker = run_lock_worker(Arc::clone(&engine), ChainId::Aztec, lock_jobs.aztec);
    let evm_lock_worker = run_lock_worker(Arc::clone(&engine), ChainId::Evm, lock_jobs.evm);

    let api_server = run_api_server(Arc::clone(&engine), api_host, api_port);

    info!("Starting all services...");

    tokio::select! {
        // Aztec-side event watcher loop
        _ = aztec_watcher.run() => {}

        // EVM-side event watcher loop
        _ = evm_watcher.run() => {}

        // Per-chain counter-lock schedulers
        _ = aztec_lock_worker => {}
        _ = evm_lock_worker => {}

        // Control API server
        _ = api_server => {}

        // Graceful shutdown on Ctrl+C
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping services...");
        }
    }

    info!("Swap solver service stopped");
    Ok(())
}
