use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Write the default configuration to the resolved config path
    Init,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(ctx.config())?);
        }
        ConfigAction::Init => {
            let path = ctx
                .config_path()
                .cloned()
                .unwrap_or_else(|| std::path::PathBuf::from("config/autopilot.toml"));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let rendered = toml::to_string_pretty(ctx.config())?;
            tokio::fs::write(&path, rendered).await?;
            info!(path = %path.display(), "wrote default configuration");
        }
    }
    Ok(())
}
