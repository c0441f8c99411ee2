//! One function per published tool (§4.5). Every function returns a
//! `ToolResult`, never an `Err` — failures are reported in
//! `ToolResult.error`, matching the "executor never throws" contract.

use std::time::Duration;

use automation_types::{ToolError, ToolResult};
use context_extractor::{extract, ExtractRequest};
use context_extractor::script::{ExtractionMode, ScrollTarget as ExtractScrollTarget};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::browser_ops::{BrowserOps, PageEvalAdapter, WaitUntil};
use crate::resolver::{resolve, ResolveError};
use crate::script::{
    build_scroll_by_script, build_scroll_into_view_script, build_select_script, build_set_checked_script,
    build_submit_script, ScrollDirection, SelectBy,
};

const DEFAULT_WAIT_FOR_ELEMENT_MS: u64 = 10_000;
const DEFAULT_NAVIGATE_TIMEOUT_MS: u64 = 30_000;
const KEY_SPACING: Duration = Duration::from_millis(15);
const SNAPSHOT_MAX_DIMENSION: u32 = 1568;
const SNAPSHOT_JPEG_QUALITY: u8 = 85;

async fn current_url_or(ops: &dyn BrowserOps, fallback: &str) -> String {
    ops.current_url().await.unwrap_or_else(|_| fallback.to_string())
}

fn selector_not_found(url: String, attempted: Vec<String>) -> ToolResult {
    ToolResult::failure(
        url,
        ToolError::new("TargetNotFound", "no selector strategy located the requested element").with_suggestions(attempted),
    )
}

fn resolve_error_to_result(url: String, err: ResolveError) -> ToolResult {
    match err {
        ResolveError::Exhausted { attempted } => selector_not_found(url, attempted),
        ResolveError::Browser(inner) => ToolResult::failure(url, ToolError::new("ProtocolError", inner.to_string())),
    }
}

#[derive(Deserialize)]
struct NavigateInput {
    url: String,
    #[serde(default, rename = "waitUntil")]
    wait_until: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

pub async fn navigate(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: NavigateInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let wait_until = match parsed.wait_until.as_deref() {
        Some("dom_ready") => WaitUntil::DomReady,
        Some("network_idle") => WaitUntil::NetworkIdle,
        _ => WaitUntil::Load,
    };
    let timeout = Duration::from_millis(parsed.timeout.unwrap_or(DEFAULT_NAVIGATE_TIMEOUT_MS));
    match ops.navigate(&parsed.url, wait_until, timeout).await {
        Ok(()) => ToolResult::success(current_url_or(ops, &parsed.url).await).with_summary(format!("navigated to {}", parsed.url)),
        Err(err) => ToolResult::failure(parsed.url, ToolError::new("Timeout", err.to_string())),
    }
}

#[derive(Deserialize)]
struct ClickInput {
    selector: String,
    #[serde(default, rename = "backupSelectors")]
    backup_selectors: Vec<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "waitForElement")]
    wait_for_element: Option<u64>,
    #[serde(default, rename = "verifyVisible")]
    verify_visible: Option<bool>,
}

pub async fn click(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: ClickInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let timeout = Duration::from_millis(parsed.wait_for_element.unwrap_or(DEFAULT_WAIT_FOR_ELEMENT_MS));
    let url = current_url_or(ops, "").await;

    let resolved = match resolve(ops, &parsed.selector, &parsed.backup_selectors, parsed.text.as_deref(), timeout).await {
        Ok(r) => r,
        Err(err) => return resolve_error_to_result(url, err),
    };

    if resolved.disabled {
        return ToolResult::failure(url, ToolError::new("TargetNotFound", "element is disabled"));
    }
    let require_visible = parsed.verify_visible.unwrap_or(true);
    if require_visible && !resolved.visible {
        return ToolResult::failure(url, ToolError::new("TargetNotFound", "element is not visible"));
    }

    let cx = resolved.rect.x + resolved.rect.width / 2.0;
    let cy = resolved.rect.y + resolved.rect.height / 2.0;
    if let Err(err) = ops.dispatch_mouse_click(cx, cy).await {
        return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
    }
    sleep(Duration::from_millis(100)).await;

    ToolResult::success(current_url_or(ops, &url).await).with_summary(format!("clicked {}", resolved.selector))
}

#[derive(Deserialize)]
struct TypeInput {
    selector: String,
    #[serde(default, rename = "backupSelectors")]
    backup_selectors: Vec<String>,
    text: String,
    #[serde(default, rename = "clearFirst")]
    clear_first: bool,
    #[serde(default, rename = "pressEnter")]
    press_enter: bool,
    #[serde(default, rename = "waitForElement")]
    wait_for_element: Option<u64>,
}

pub async fn type_text(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: TypeInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let timeout = Duration::from_millis(parsed.wait_for_element.unwrap_or(DEFAULT_WAIT_FOR_ELEMENT_MS));
    let url = current_url_or(ops, "").await;

    let resolved = match resolve(ops, &parsed.selector, &parsed.backup_selectors, None, timeout).await {
        Ok(r) => r,
        Err(err) => return resolve_error_to_result(url, err),
    };

    let cx = resolved.rect.x + resolved.rect.width / 2.0;
    let cy = resolved.rect.y + resolved.rect.height / 2.0;
    if let Err(err) = ops.dispatch_mouse_click(cx, cy).await {
        return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
    }

    if parsed.clear_first {
        if let Err(err) = ops.dispatch_key("a", &["Control".to_string()]).await {
            return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
        }
        if let Err(err) = ops.dispatch_key("Backspace", &[]).await {
            return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
        }
    }

    for ch in parsed.text.chars() {
        if let Err(err) = ops.insert_text(&ch.to_string()).await {
            return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
        }
        sleep(KEY_SPACING).await;
    }

    // Nudge framework-managed reactive state: dispatch the events a real
    // keyboard session would have produced.
    let sync_script = format!(
        "(() => {{ const el = document.querySelector({sel}); if (el) {{ el.dispatchEvent(new Event('input', {{ bubbles: true }})); el.dispatchEvent(new Event('change', {{ bubbles: true }})); }} }})()",
        sel = json!(resolved.selector)
    );
    let _ = ops.eval_in_page(&sync_script).await;

    if parsed.press_enter {
        if let Err(err) = ops.dispatch_key("Enter", &[]).await {
            return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
        }
    }

    ToolResult::success(current_url_or(ops, &url).await).with_summary(format!("typed into {}", resolved.selector))
}

#[derive(Deserialize)]
struct SelectInput {
    selector: String,
    #[serde(default, rename = "backupSelectors")]
    backup_selectors: Vec<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default, rename = "waitForElement")]
    wait_for_element: Option<u64>,
}

pub async fn select(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: SelectInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let timeout = Duration::from_millis(parsed.wait_for_element.unwrap_or(DEFAULT_WAIT_FOR_ELEMENT_MS));
    let url = current_url_or(ops, "").await;

    let resolved = match resolve(ops, &parsed.selector, &parsed.backup_selectors, None, timeout).await {
        Ok(r) => r,
        Err(err) => return resolve_error_to_result(url, err),
    };

    let by = if let Some(v) = parsed.value {
        SelectBy::Value(v)
    } else if let Some(l) = parsed.label {
        SelectBy::Label(l)
    } else if let Some(i) = parsed.index {
        SelectBy::Index(i)
    } else {
        return ToolResult::failure(url, ToolError::new("SchemaValidation", "select requires one of value, label, index"));
    };

    let script = build_select_script(&resolved.selector, &by);
    match ops.eval_in_page(&script).await {
        Ok(_) => ToolResult::success(current_url_or(ops, &url).await).with_summary(format!("set select {}", resolved.selector)),
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

#[derive(Deserialize)]
struct CheckedInput {
    selector: String,
    checked: bool,
}

async fn set_checked(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: CheckedInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;
    let resolved = match resolve(ops, &parsed.selector, &[], None, Duration::from_millis(DEFAULT_WAIT_FOR_ELEMENT_MS)).await {
        Ok(r) => r,
        Err(err) => return resolve_error_to_result(url, err),
    };
    let script = build_set_checked_script(&resolved.selector, parsed.checked);
    match ops.eval_in_page(&script).await {
        Ok(_) => ToolResult::success(current_url_or(ops, &url).await).with_summary(format!("set checked={} on {}", parsed.checked, resolved.selector)),
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

pub async fn checkbox(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    set_checked(ops, input).await
}

pub async fn radio(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    set_checked(ops, input).await
}

#[derive(Deserialize)]
struct WaitInput {
    duration_ms: u64,
}

pub async fn wait(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: WaitInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    sleep(Duration::from_millis(parsed.duration_ms)).await;
    ToolResult::success(current_url_or(ops, "").await)
}

#[derive(Deserialize)]
struct WaitForElementInput {
    selector: String,
    state: String,
    #[serde(default)]
    timeout: Option<u64>,
}

pub async fn wait_for_element(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: WaitForElementInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let deadline = Duration::from_millis(parsed.timeout.unwrap_or(DEFAULT_WAIT_FOR_ELEMENT_MS));
    let url = current_url_or(ops, "").await;
    let poll_interval = Duration::from_millis(200);
    let start = tokio::time::Instant::now();

    loop {
        match resolve(ops, &parsed.selector, &[], None, Duration::from_millis(500)).await {
            Ok(resolved) => {
                let satisfied = match parsed.state.as_str() {
                    "visible" => resolved.visible,
                    "hidden" => !resolved.visible,
                    "attached" => true,
                    _ => true,
                };
                if satisfied {
                    return ToolResult::success(current_url_or(ops, &url).await);
                }
            }
            Err(ResolveError::Exhausted { .. }) if parsed.state == "hidden" => {
                return ToolResult::success(current_url_or(ops, &url).await);
            }
            Err(_) => {}
        }
        if start.elapsed() >= deadline {
            return ToolResult::failure(url, ToolError::new("Timeout", format!("element did not reach state `{}` in time", parsed.state)));
        }
        sleep(poll_interval).await;
    }
}

#[derive(Deserialize)]
struct KeyPressInput {
    key: String,
    #[serde(default)]
    modifiers: Vec<String>,
    #[serde(default)]
    selector: Option<String>,
}

pub async fn key_press(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: KeyPressInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;

    if let Some(selector) = &parsed.selector {
        match resolve(ops, selector, &[], None, Duration::from_millis(DEFAULT_WAIT_FOR_ELEMENT_MS)).await {
            Ok(resolved) => {
                let cx = resolved.rect.x + resolved.rect.width / 2.0;
                let cy = resolved.rect.y + resolved.rect.height / 2.0;
                if let Err(err) = ops.dispatch_mouse_click(cx, cy).await {
                    return ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string()));
                }
            }
            Err(err) => return resolve_error_to_result(url, err),
        }
    }

    match ops.dispatch_key(&parsed.key, &parsed.modifiers).await {
        Ok(()) => ToolResult::success(current_url_or(ops, &url).await).with_summary(format!("pressed {}", parsed.key)),
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

#[derive(Deserialize)]
struct ScrollInput {
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default, rename = "toElement")]
    to_element: Option<String>,
}

pub async fn scroll(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: ScrollInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;

    if let Some(target) = &parsed.to_element {
        let resolved = match resolve(ops, target, &[], None, Duration::from_millis(DEFAULT_WAIT_FOR_ELEMENT_MS)).await {
            Ok(r) => r,
            Err(err) => return resolve_error_to_result(url, err),
        };
        let script = build_scroll_into_view_script(&resolved.selector);
        return match ops.eval_in_page(&script).await {
            Ok(_) => ToolResult::success(current_url_or(ops, &url).await),
            Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
        };
    }

    let direction = match parsed.direction.as_deref() {
        Some("up") => ScrollDirection::Up,
        Some("left") => ScrollDirection::Left,
        Some("right") => ScrollDirection::Right,
        _ => ScrollDirection::Down,
    };
    let script = build_scroll_by_script(direction, parsed.amount.unwrap_or(400.0));
    match ops.eval_in_page(&script).await {
        Ok(_) => ToolResult::success(current_url_or(ops, &url).await),
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

#[derive(Deserialize)]
struct SubmitInput {
    #[serde(default, rename = "formSelector")]
    form_selector: Option<String>,
    #[serde(default, rename = "submitButtonSelector")]
    submit_button_selector: Option<String>,
}

pub async fn submit(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: SubmitInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;
    let script = build_submit_script(parsed.form_selector.as_deref(), parsed.submit_button_selector.as_deref());
    match ops.eval_in_page(&script).await {
        Ok(value) if value.get("found").and_then(Value::as_bool).unwrap_or(false) => {
            ToolResult::success(current_url_or(ops, &url).await).with_summary("submitted form")
        }
        Ok(_) => ToolResult::failure(url, ToolError::new("TargetNotFound", "no matching form or submit button")),
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

#[derive(Deserialize)]
struct ExtractContextInput {
    #[serde(default)]
    full: bool,
    #[serde(default, rename = "scrollTo")]
    scroll_to: Option<String>,
    #[serde(default, rename = "maxElements")]
    max_elements: Option<usize>,
}

fn parse_scroll_target(raw: &str) -> ExtractScrollTarget {
    match raw {
        "top" => ExtractScrollTarget::Top,
        "bottom" => ExtractScrollTarget::Bottom,
        other => match other.parse::<f64>() {
            Ok(y) => ExtractScrollTarget::AbsoluteY(y),
            Err(_) => ExtractScrollTarget::Selector { primary: other.to_string(), backups: Vec::new() },
        },
    }
}

pub async fn extract_context(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: ExtractContextInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;
    let adapter = PageEvalAdapter(ops);
    let request = ExtractRequest {
        mode: if parsed.full { ExtractionMode::Full } else { ExtractionMode::Viewport },
        max_elements: parsed.max_elements.unwrap_or(500),
        scroll_to: parsed.scroll_to.as_deref().map(parse_scroll_target),
    };
    match extract(&adapter, request).await {
        Ok(context) => {
            let value = serde_json::to_value(&context).unwrap_or(Value::Null);
            ToolResult::success(context.url.clone())
                .with_summary(format!("extracted {} elements, {} forms", context.stats.interactive_elements, context.stats.forms))
                .with_value(value)
        }
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

#[derive(Deserialize)]
struct TakeSnapshotInput {
    #[serde(default, rename = "scrollTo")]
    scroll_to: Option<String>,
}

pub async fn take_snapshot(ops: &dyn BrowserOps, input: &Value) -> ToolResult {
    let parsed: TakeSnapshotInput = match serde_json::from_value(input.clone()) {
        Ok(v) => v,
        Err(err) => return ToolResult::failure("", ToolError::new("SchemaValidation", err.to_string())),
    };
    let url = current_url_or(ops, "").await;

    if let Some(raw) = &parsed.scroll_to {
        let target = parse_scroll_target(raw);
        let script = match target {
            ExtractScrollTarget::Top => "window.scrollTo(0, 0);".to_string(),
            ExtractScrollTarget::Bottom => "window.scrollTo(0, document.documentElement.scrollHeight);".to_string(),
            ExtractScrollTarget::AbsoluteY(y) => format!("window.scrollTo(0, {y});"),
            ExtractScrollTarget::Selector { primary, .. } => build_scroll_into_view_script(&primary),
        };
        let _ = ops.eval_in_page(&script).await;
        sleep(Duration::from_secs(2)).await;
    }

    match ops.capture_screenshot(SNAPSHOT_MAX_DIMENSION, SNAPSHOT_JPEG_QUALITY).await {
        Ok(bytes) => {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            ToolResult::success(current_url_or(ops, &url).await).with_value(json!(encoded))
        }
        Err(err) => ToolResult::failure(url, ToolError::new("ProtocolError", err.to_string())),
    }
}

pub async fn declare_plan_metadata(ops: &dyn BrowserOps, _input: &Value) -> ToolResult {
    // Pseudo-tool; no side effect. The Plan Parser ordinarily pulls this out
    // of the executable step list, so reaching this function means the
    // metadata tool_use was left in by a non-conforming caller.
    ToolResult::success(current_url_or(ops, "").await)
}
