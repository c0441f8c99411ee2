//! The minimal Browser Control Surface (BCS) operations the executor needs,
//! kept narrow and explicit per the engine-context convention: no global
//! singleton, just a trait object threaded in by the caller (the binary
//! crate, which wires the real implementation against `cdp-adapter`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitUntil {
    Load,
    DomReady,
    NetworkIdle,
}

#[derive(Debug, Error)]
pub enum BrowserOpsError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser surface is detached")]
    Detached,
}

/// Operations dispatched against the attached tab. All operations are
/// serialized per tab by the implementation; the executor never issues two
/// concurrent `eval_in_page` calls against the same tab.
#[async_trait]
pub trait BrowserOps: Send + Sync {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<(), BrowserOpsError>;
    async fn eval_in_page(&self, script: &str) -> Result<Value, BrowserOpsError>;
    async fn dispatch_mouse_click(&self, x: f64, y: f64) -> Result<(), BrowserOpsError>;
    async fn dispatch_key(&self, key: &str, modifiers: &[String]) -> Result<(), BrowserOpsError>;
    async fn insert_text(&self, text: &str) -> Result<(), BrowserOpsError>;
    async fn current_url(&self) -> Result<String, BrowserOpsError>;
    async fn capture_screenshot(&self, max_dimension: u32, quality: u8) -> Result<Vec<u8>, BrowserOpsError>;
}

/// Adapts a `BrowserOps` to `context_extractor::PageEval`, since both traits
/// agree on the single `eval_in_page` primitive.
pub struct PageEvalAdapter<'a>(pub &'a dyn BrowserOps);

#[async_trait]
impl<'a> context_extractor::PageEval for PageEvalAdapter<'a> {
    async fn eval_in_page(&self, script: &str) -> Result<Value, context_extractor::ExtractorError> {
        self.0
            .eval_in_page(script)
            .await
            .map_err(|err| context_extractor::ExtractorError::Eval(err.to_string()))
    }
}
