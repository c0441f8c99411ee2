//! Executes individual tool invocations from an approved plan step against a
//! live page. Pairs with `plan-parser` (which enforces tool_use/tool_result
//! pairing) and `tool-registry` (which defines the schemas inputs here are
//! assumed to already satisfy).
//!
//! Per the published contract, this crate never propagates a tool failure as
//! a Rust `Err` — every outcome, including a missing element or a protocol
//! error, comes back as a `ToolResult` the caller can feed straight into the
//! next planner turn.

pub mod browser_ops;
pub mod resolver;
pub mod script;
mod tools;

use automation_types::{ToolError, ToolResult};
use serde_json::Value;

pub use browser_ops::{BrowserOps, BrowserOpsError, PageEvalAdapter, WaitUntil};
pub use resolver::{resolve, ResolveError, ResolvedElement};

/// Dispatches `tool_name` with `input` against `ops`. Unrecognized tool names
/// produce a failed `ToolResult` rather than a panic, since the plan came
/// from an LLM and the registry's schema check happens upstream of this call.
pub async fn execute_tool(tool_name: &str, input: &Value, ops: &dyn BrowserOps) -> ToolResult {
    match tool_name {
        "navigate" => tools::navigate(ops, input).await,
        "click" => tools::click(ops, input).await,
        "type" => tools::type_text(ops, input).await,
        "select" => tools::select(ops, input).await,
        "checkbox" => tools::checkbox(ops, input).await,
        "radio" => tools::radio(ops, input).await,
        "wait" => tools::wait(ops, input).await,
        "waitForElement" => tools::wait_for_element(ops, input).await,
        "keyPress" => tools::key_press(ops, input).await,
        "scroll" => tools::scroll(ops, input).await,
        "submit" => tools::submit(ops, input).await,
        "extract_context" => tools::extract_context(ops, input).await,
        "take_snapshot" => tools::take_snapshot(ops, input).await,
        "declare_plan_metadata" => tools::declare_plan_metadata(ops, input).await,
        other => ToolResult::failure(
            ops.current_url().await.unwrap_or_default(),
            ToolError::new("UnknownTool", format!("no executor registered for tool `{other}`")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeOps {
        url: Mutex<String>,
        eval_responses: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl BrowserOps for FakeOps {
        async fn navigate(&self, url: &str, _wait_until: WaitUntil, _timeout: Duration) -> Result<(), BrowserOpsError> {
            *self.url.lock().unwrap() = url.to_string();
            Ok(())
        }
        async fn eval_in_page(&self, _script: &str) -> Result<Value, BrowserOpsError> {
            let mut responses = self.eval_responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({"found": false}))
            } else {
                Ok(responses.remove(0))
            }
        }
        async fn dispatch_mouse_click(&self, _x: f64, _y: f64) -> Result<(), BrowserOpsError> {
            Ok(())
        }
        async fn dispatch_key(&self, _key: &str, _modifiers: &[String]) -> Result<(), BrowserOpsError> {
            Ok(())
        }
        async fn insert_text(&self, _text: &str) -> Result<(), BrowserOpsError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, BrowserOpsError> {
            Ok(self.url.lock().unwrap().clone())
        }
        async fn capture_screenshot(&self, _max_dimension: u32, _quality: u8) -> Result<Vec<u8>, BrowserOpsError> {
            Ok(vec![1, 2, 3])
        }
    }

    #[tokio::test]
    async fn navigate_updates_url_and_succeeds() {
        let ops = FakeOps { url: Mutex::new(String::new()), eval_responses: Mutex::new(vec![]) };
        let result = execute_tool("navigate", &json!({"url": "https://example.com"}), &ops).await;
        assert!(result.success);
        assert_eq!(result.url, "https://example.com");
    }

    #[tokio::test]
    async fn click_fails_when_selector_unresolvable() {
        let ops = FakeOps { url: Mutex::new("https://example.com".into()), eval_responses: Mutex::new(vec![]) };
        let result = execute_tool("click", &json!({"selector": "#missing"}), &ops).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "TargetNotFound");
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_panicking() {
        let ops = FakeOps { url: Mutex::new("https://example.com".into()), eval_responses: Mutex::new(vec![]) };
        let result = execute_tool("not_a_real_tool", &json!({}), &ops).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "UnknownTool");
    }

    #[tokio::test]
    async fn select_by_value_dispatches_script() {
        let ops = FakeOps {
            url: Mutex::new("https://example.com".into()),
            eval_responses: Mutex::new(vec![
                json!({"found": true, "strategy": "css", "selector": "#country", "tag": "select", "disabled": false, "visible": true, "rect": {"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0}}),
                json!({"found": true, "value": "US"}),
            ]),
        };
        let result = execute_tool("select", &json!({"selector": "#country", "value": "US"}), &ops).await;
        assert!(result.success);
    }
}
