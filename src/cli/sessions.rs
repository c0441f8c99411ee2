use std::sync::Arc;

use anyhow::Result;
use automation_orchestrator::Orchestrator;
use automation_types::AutomationSessionId;
use cdp_adapter::{CdpAdapter, CdpConfig};
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::context::CliContext;
use crate::browser::AttachedBrowser;

#[derive(Args, Clone, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub action: SessionsAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SessionsAction {
    /// List stored sessions, most recently updated first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Print the full stored record for one session
    Show { id: AutomationSessionId },
    /// Resume a paused or interrupted session against a fresh browser
    Resume {
        id: AutomationSessionId,
        #[arg(short, long, default_value = "about:blank")]
        start_url: String,
    },
    /// Permanently delete a stored session
    Delete { id: AutomationSessionId },
}

pub async fn cmd_sessions(args: SessionsArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        SessionsAction::List { limit, offset } => {
            let summaries = ctx.store().list_sessions(limit, offset).await?;
            for summary in summaries {
                println!(
                    "{}  {:?}  steps={}  {}",
                    summary.id, summary.status, summary.executed_step_count, summary.user_goal
                );
            }
        }
        SessionsAction::Show { id } => {
            let loaded = ctx.store().load_session(id).await?;
            println!("{}", serde_json::to_string_pretty(&loaded.session)?);
        }
        SessionsAction::Resume { id, start_url } => {
            let (bus, _rx) = cdp_adapter::event_bus(64);
            let adapter = Arc::new(CdpAdapter::new(CdpConfig::default(), bus));
            Arc::clone(&adapter).start().await?;
            let page = adapter.create_page(&start_url).await?;
            let browser = AttachedBrowser::new(Arc::clone(&adapter), page);

            let planner = ctx.planner()?;
            let orchestrator = Orchestrator::new(ctx.config().orchestrator_config(), ctx.store(), planner, ctx.registry());
            orchestrator.resume(&browser, id, CancellationToken::new()).await?;
            info!(%id, "session resumed to completion");
            adapter.shutdown().await;
        }
        SessionsAction::Delete { id } => {
            ctx.store().delete_session(id).await?;
            info!(%id, "session deleted");
        }
    }
    Ok(())
}
