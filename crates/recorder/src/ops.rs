//! The minimal Browser Control Surface the recorder needs: inject the
//! bootstrap script and grab a post-action snapshot. Event delivery (console
//! messages, frame navigations) is push-based — the caller forwards them via
//! `Recorder::handle_console_message`/`handle_frame_navigated` rather than
//! the recorder pulling from a subscription itself, matching how the real
//! CDP event stream is driven from outside this crate.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderOpsError {
    #[error("protocol error: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait RecorderOps: Send + Sync {
    /// Installs the observer script so it runs at document creation and
    /// after every subsequent load, gated by its own window sentinel so
    /// re-injection on a `switch` is a no-op on a document that already has it.
    async fn inject_bootstrap_script(&self, script: &str) -> Result<(), RecorderOpsError>;

    /// Best-effort, bounded-size screenshot taken after an action. Failure is
    /// logged and ignored by the caller, never surfaced as a recording error.
    async fn capture_screenshot(&self) -> Result<Vec<u8>, RecorderOpsError>;
}
