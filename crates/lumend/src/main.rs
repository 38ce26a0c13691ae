//! lumend - DMX512 / RDM lighting daemon
//!
//! Usage: `lumend [CONFIG.toml]`. Without a path the defaults are used.

use std::path::PathBuf;

use anyhow::{Context, Result};
use lumen_core::LumenConfig;
use lumend::{logging_setup, Daemon};
use tracing::{error, info};

fn load_config() -> Result<LumenConfig> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => LumenConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(LumenConfig::default()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

fn main() -> Result<()> {
    let config = load_config()?;
    logging_setup::init(&config.log)?;

    info!("==========================================");
    info!("===        Lumen Daemon Started        ===");
    info!("==========================================");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?;

    runtime.block_on(async {
        let daemon = Daemon::new(&config);
        daemon.run(shutdown_signal()).await;
    });

    Ok(())
}
