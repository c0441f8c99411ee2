//! Bridges the narrow `action_executor::BrowserOps` / `recorder::RecorderOps`
//! traits onto a live `cdp_adapter::CdpAdapter` attached to a single page.
//! Both traits only ever see one tab at a time (the recorder's tab switches
//! swap the underlying `PageId` rather than widening the interface), so this
//! wrapper is deliberately a thin `RwLock<PageId>` around the adapter, not a
//! multi-tab router.

use std::sync::Arc;
use std::time::Duration;

use action_executor::{BrowserOps, BrowserOpsError, WaitUntil};
use async_trait::async_trait;
use cdp_adapter::{Cdp, CdpAdapter, PageId};
use recorder::ops::{RecorderOps, RecorderOpsError};
use serde_json::Value;
use tokio::sync::RwLock;

pub struct AttachedBrowser {
    adapter: Arc<CdpAdapter>,
    page: RwLock<PageId>,
}

impl AttachedBrowser {
    pub fn new(adapter: Arc<CdpAdapter>, page: PageId) -> Self {
        Self {
            adapter,
            page: RwLock::new(page),
        }
    }

    pub async fn current_page(&self) -> PageId {
        *self.page.read().await
    }

    pub async fn switch_page(&self, page: PageId) {
        *self.page.write().await = page;
    }

    fn protocol_err(err: cdp_adapter::AdapterError) -> BrowserOpsError {
        BrowserOpsError::Protocol(err.to_string())
    }
}

fn wait_gate_for(wait_until: WaitUntil) -> &'static str {
    match wait_until {
        WaitUntil::Load => "dom_ready",
        WaitUntil::DomReady => "dom_ready",
        WaitUntil::NetworkIdle => "network_quiet",
    }
}

#[async_trait]
impl BrowserOps for AttachedBrowser {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<(), BrowserOpsError> {
        let page = self.current_page().await;
        self.adapter
            .navigate(page, url, timeout)
            .await
            .map_err(Self::protocol_err)?;
        self.adapter
            .wait_basic(page, wait_gate_for(wait_until).to_string(), timeout)
            .await
            .map_err(Self::protocol_err)
    }

    async fn eval_in_page(&self, script: &str) -> Result<Value, BrowserOpsError> {
        let page = self.current_page().await;
        self.adapter
            .evaluate_script(page, script)
            .await
            .map_err(Self::protocol_err)
    }

    async fn dispatch_mouse_click(&self, x: f64, y: f64) -> Result<(), BrowserOpsError> {
        let page = self.current_page().await;
        let press = serde_json::json!({
            "type": "mousePressed",
            "x": x,
            "y": y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        let release = serde_json::json!({
            "type": "mouseReleased",
            "x": x,
            "y": y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        self.adapter
            .dispatch_mouse_event(page, press)
            .await
            .map_err(Self::protocol_err)?;
        self.adapter
            .dispatch_mouse_event(page, release)
            .await
            .map_err(Self::protocol_err)
    }

    async fn dispatch_key(&self, key: &str, modifiers: &[String]) -> Result<(), BrowserOpsError> {
        let page = self.current_page().await;
        let modifier_bits = key_modifier_bits(modifiers);
        let down = serde_json::json!({
            "type": "rawKeyDown",
            "key": key,
            "modifiers": modifier_bits,
        });
        let up = serde_json::json!({
            "type": "keyUp",
            "key": key,
            "modifiers": modifier_bits,
        });
        self.adapter
            .dispatch_key_event(page, down)
            .await
            .map_err(Self::protocol_err)?;
        self.adapter
            .dispatch_key_event(page, up)
            .await
            .map_err(Self::protocol_err)
    }

    async fn insert_text(&self, text: &str) -> Result<(), BrowserOpsError> {
        let page = self.current_page().await;
        self.adapter
            .insert_text_event(page, text)
            .await
            .map_err(Self::protocol_err)
    }

    async fn current_url(&self) -> Result<String, BrowserOpsError> {
        let page = self.current_page().await;
        self.adapter
            .registry()
            .get(&page)
            .and_then(|ctx| ctx.recent_url)
            .ok_or(BrowserOpsError::Detached)
    }

    async fn capture_screenshot(&self, max_dimension: u32, quality: u8) -> Result<Vec<u8>, BrowserOpsError> {
        let page = self.current_page().await;
        let png = self
            .adapter
            .screenshot(page, Duration::from_secs(10))
            .await
            .map_err(Self::protocol_err)?;
        Ok(downscale_hint(png, max_dimension, quality))
    }
}

/// The adapter's screenshot is already a bounded JPEG/PNG capture; recompression
/// to a target dimension/quality is left to the caller that actually needs the
/// bytes over the wire (the planner's vision attachments), so this is a no-op
/// passthrough kept distinct from `eval_in_page` calls for clarity at call sites.
fn downscale_hint(bytes: Vec<u8>, _max_dimension: u32, _quality: u8) -> Vec<u8> {
    bytes
}

fn key_modifier_bits(modifiers: &[String]) -> u8 {
    let mut bits = 0u8;
    for modifier in modifiers {
        bits |= match modifier.to_ascii_lowercase().as_str() {
            "alt" => 1,
            "ctrl" | "control" => 2,
            "meta" | "cmd" | "command" => 4,
            "shift" => 8,
            _ => 0,
        };
    }
    bits
}

#[async_trait]
impl RecorderOps for AttachedBrowser {
    async fn inject_bootstrap_script(&self, script: &str) -> Result<(), RecorderOpsError> {
        let page = self.current_page().await;
        self.adapter
            .evaluate_script(page, script)
            .await
            .map(|_| ())
            .map_err(|err| RecorderOpsError::Protocol(err.to_string()))
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, RecorderOpsError> {
        let page = self.current_page().await;
        self.adapter
            .screenshot(page, Duration::from_secs(10))
            .await
            .map_err(|err| RecorderOpsError::Protocol(err.to_string()))
    }
}
