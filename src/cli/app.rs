use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use crate::config::load_config;
use crate::logging::init_logging;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = load_config(cli.config.as_deref())?;
    let log_level = cli.log_level.clone().unwrap_or_else(|| loaded.config.log_level.clone());
    let log_json = cli.log_json || loaded.config.log_json;
    let _log_guard = init_logging(&log_level, log_json, loaded.config.log_dir.as_deref())?;

    info!("starting autopilot v{}", env!("CARGO_PKG_VERSION"));

    let ctx = CliContext::new(loaded.config, loaded.path);

    match dispatch(cli.command, &ctx).await {
        Ok(()) => {
            info!("command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!(%err, "command failed");
            Err(err)
        }
    }
}
