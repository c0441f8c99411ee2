use std::sync::Arc;
use std::time::Duration;

use action_executor::BrowserOps;
use anyhow::Result;
use automation_types::TabId;
use cdp_adapter::{CdpAdapter, CdpConfig};
use clap::Args;
use recorder::script::build_drain_queue_script;
use recorder::{Recorder, RecorderConfig};
use serde_json::Value;
use tracing::{info, warn};

use super::context::CliContext;
use crate::browser::AttachedBrowser;

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// Human-readable name for the saved recording
    pub name: String,

    /// Page to start recording from
    #[arg(short = 'u', long = "start-url")]
    pub url: String,

    /// Stop recording after this many seconds of wall-clock time
    #[arg(short, long, default_value_t = 120)]
    pub duration_secs: u64,

    /// Polling interval for draining captured actions, in milliseconds
    #[arg(long, default_value_t = 250)]
    pub poll_interval_ms: u64,
}

pub async fn cmd_record(args: RecordArgs, ctx: &CliContext) -> Result<()> {
    let (bus, _rx) = cdp_adapter::event_bus(64);
    let adapter = Arc::new(CdpAdapter::new(CdpConfig::default(), bus));
    Arc::clone(&adapter).start().await?;
    let page = adapter.create_page(&args.url).await?;
    let browser: Arc<AttachedBrowser> = Arc::new(AttachedBrowser::new(Arc::clone(&adapter), page));

    let recorder_config = RecorderConfig {
        max_actions: ctx.config().max_recording_actions,
        ..RecorderConfig::new(
            ctx.config()
                .data_dir
                .join("recordings")
                .join("snapshots"),
        )
    };
    let initial_tab = TabId::new();
    let (recorder, mut events) = Recorder::start(recorder_config, args.name.clone(), args.url.clone(), initial_tab);
    recorder.inject(browser.as_ref()).await?;

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "recording event");
        }
    });

    info!(name = %args.name, url = %args.url, "recording started, interact with the browser window");

    let drain_script = build_drain_queue_script();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.duration_secs);
    let poll_interval = Duration::from_millis(args.poll_interval_ms);

    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(poll_interval).await;
        let drained = match browser.eval_in_page(&drain_script).await {
            Ok(value) => value,
            Err(err) => {
                warn!(?err, "drain queue poll failed");
                continue;
            }
        };
        let current_url = browser.current_url().await.unwrap_or_else(|_| args.url.clone());
        if let Value::Array(entries) = drained {
            for entry in entries {
                if let Value::String(raw_text) = entry {
                    let ops: Arc<dyn recorder::ops::RecorderOps> = browser.clone();
                    if let Err(err) = recorder
                        .handle_console_message(ops, initial_tab, &current_url, &current_url, &raw_text)
                        .await
                    {
                        warn!(?err, "failed to record captured action");
                    }
                }
            }
        }
    }

    let session = recorder.stop();
    let store = session_store::recordings::RecordingStore::new(ctx.config().data_dir.clone());
    store.save_recording(&session).await?;
    info!(id = %session.id, actions = session.actions.len(), "recording saved");

    adapter.shutdown().await;
    Ok(())
}
