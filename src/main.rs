//! aprx Dashboard - Web dashboard backend for the aprx packet-radio daemon.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use aprx_dashboard::{config::Config, tail};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// aprx Dashboard - serve the operator dashboard API for an aprx node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the dashboard config file (TOML)
    #[arg(short, long, env = "APRX_DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Port for the dashboard HTTP API (overrides the config file)
    #[arg(short, long, env = "APRX_DASHBOARD_PORT")]
    port: Option<u16>,

    /// Follow a log on stdout instead of serving HTTP (rf or daemon)
    #[arg(long, value_parser = ["rf", "daemon"])]
    follow: Option<String>,

    /// Maximum runtime in seconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_runtime: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    info!("aprx Dashboard starting...");
    info!("Daemon config: {}", config.aprx_config_path.display());
    info!("RF log: {}", config.rf_log_path.display());

    match args.follow.as_deref() {
        Some(which) => follow_log(&config, which, args.max_runtime).await,
        None => aprx_dashboard::server::serve(config).await,
    }
}

/// Print a daemon log to stdout as it grows, until Ctrl+C.
async fn follow_log(config: &Config, which: &str, max_runtime: u64) -> Result<()> {
    let path = match which {
        "daemon" => config.daemon_log_path.clone(),
        _ => config.rf_log_path.clone(),
    };

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Optional max runtime
    if max_runtime > 0 {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_runtime)).await;
            info!("Max runtime reached");
            let _ = shutdown_tx_clone.send(true);
        });
    }

    let (tx, mut rx) = mpsc::channel(256);
    let tail = tokio::spawn(tail::tail_task(path, tx, shutdown_rx));

    while let Some(line) = rx.recv().await {
        println!("{}", line);
    }

    tail.await??;
    Ok(())
}
