use anyhow::Result;

use super::automate::cmd_automate;
use super::commands::Commands;
use super::config::cmd_config;
use super::context::CliContext;
use super::record::cmd_record;
use super::sessions::cmd_sessions;

pub async fn dispatch(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Automate(args) => cmd_automate(args, ctx).await,
        Commands::Record(args) => cmd_record(args, ctx).await,
        Commands::Sessions(args) => cmd_sessions(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Tools => {
            for tool in ctx.registry().list() {
                println!("{:<24} {}", tool.name, tool.description);
            }
            Ok(())
        }
    }
}
