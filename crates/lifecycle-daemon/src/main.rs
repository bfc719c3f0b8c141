//! # life-mngr
//!
//! VM lifecycle manager daemon. Runs as the Service VM supervisor or as a
//! User VM agent depending on `role` in its configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lifecycle_daemon::{run_daemon, DaemonConfig};

/// Log filter environment variable.
const ENV_LOG: &str = "LM_LOG";

#[derive(Parser, Debug)]
#[command(name = "life-mngr")]
#[command(about = "Coordinates ordered shutdown between the service VM and its user VMs")]
struct Args {
    /// Configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long, env = "LM_CONFIG")]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<DaemonConfig> {
    let mut config = match path {
        Some(path) => DaemonConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DaemonConfig::default(),
    };
    config.apply_env().context("Bad environment override")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    info!("===========================================");
    info!("  life-mngr v{}", env!("CARGO_PKG_VERSION"));
    info!("  Role: {}", config.role);
    info!("===========================================");

    run_daemon(config).await?;
    Ok(())
}
