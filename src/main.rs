//! Swap GMP Service
//!
//! Runs the configured set of simulated chains, the relay loop between
//! them, and the REST API callers use to submit deposits and query
//! balances, reserves, and message status.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use swap_gmp::api::ApiServer;
use swap_gmp::chain::LocalNetwork;
use swap_gmp::config::Config;
use swap_gmp::relay::Relayer;

/// Main application entry point.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Builds the local chain network
/// 4. Spawns the relay task and runs the API server until shutdown
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting swap-gmp service");

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("swap-gmp service");
        println!();
        println!("Usage: swap-gmp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  SWAP_GMP_CONFIG_PATH    Path to config file (overrides --config)");
        return Ok(());
    }

    let mut i = 1; // Skip program name
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            if std::env::var("SWAP_GMP_CONFIG_PATH").is_err() {
                std::env::set_var("SWAP_GMP_CONFIG_PATH", &args[i + 1]);
            }
            i += 1;
        }
        i += 1;
    }

    let config = Config::load()?;
    info!("configuration loaded: {} chains", config.chains.len());

    let network = Arc::new(LocalNetwork::from_config(&config)?);
    let relayer = Arc::new(Relayer::new(&network, &config.relayer)?);

    let relay_task = relayer.clone();
    tokio::spawn(async move {
        relay_task.run().await;
    });

    let api = ApiServer::new(config, network, relayer);
    api.run().await
}
