use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use automation_orchestrator::Orchestrator;
use automation_types::RecordingSessionId;
use cdp_adapter::{CdpAdapter, CdpConfig};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::context::CliContext;
use crate::browser::AttachedBrowser;

#[derive(Args, Clone, Debug)]
pub struct AutomateArgs {
    /// Natural-language goal to drive the automation toward
    pub goal: String,

    /// Page to start the automation on
    #[arg(short, long, default_value = "about:blank")]
    pub start_url: String,

    /// Prior recording to use as reference material for planning
    #[arg(short, long)]
    pub recording: Option<RecordingSessionId>,
}

pub async fn cmd_automate(args: AutomateArgs, ctx: &CliContext) -> Result<()> {
    let (bus, _rx) = cdp_adapter::event_bus(64);
    let adapter = Arc::new(CdpAdapter::new(CdpConfig::default(), bus));
    Arc::clone(&adapter).start().await?;
    let page = adapter.create_page(&args.start_url).await?;
    let browser = AttachedBrowser::new(Arc::clone(&adapter), page);

    let planner = ctx.planner()?;
    let orchestrator = Orchestrator::new(ctx.config().orchestrator_config(), ctx.store(), planner, ctx.registry());

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "automation event");
        }
    });

    let session_id = orchestrator
        .start(&browser, args.goal.clone(), args.recording, None, CancellationToken::new())
        .await?;
    info!(%session_id, goal = %args.goal, "automation session finished");

    tokio::time::sleep(Duration::from_millis(50)).await;
    adapter.shutdown().await;
    Ok(())
}
