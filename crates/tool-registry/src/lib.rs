//! Declarative catalog of the automation tool set: names, JSON-schema-shaped input
//! contracts, and validation of planner-supplied arguments.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Selector idioms that are not CSS and must be refused before any browser call,
/// matching the Selector Engine's CSS-only contract.
const REJECTED_SELECTOR_PATTERNS: &[&str] = &[
    ":has-text(",
    ":visible",
    ":enabled",
    ":contains(",
    ":has(",
    ":text(",
];

#[derive(Debug, Error)]
pub enum ToolRegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("validation failed for tool {tool}: {messages:?}")]
    ValidationFailed { tool: String, messages: Vec<String> },
}

/// One field in a tool's input schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A published tool definition: name, description, required/optional fields, and a
/// usage example rendered into the planner prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub required_fields: Vec<FieldSpec>,
    pub optional_fields: Vec<FieldSpec>,
    pub example: String,
    /// Tools whose purpose is to read page state without modifying it.
    pub is_analysis_tool: bool,
}

impl ToolDescriptor {
    pub fn prompt_block(&self) -> String {
        let mut out = format!("• {} — {}\n  When to use: {}\n", self.name, self.description, self.usage);
        if !self.required_fields.is_empty() {
            let fields: Vec<String> = self
                .required_fields
                .iter()
                .map(|f| format!("{} ({})", f.name, f.description))
                .collect();
            out.push_str(&format!("  Required fields: {}\n", fields.join(", ")));
        }
        if !self.optional_fields.is_empty() {
            let fields: Vec<String> = self
                .optional_fields
                .iter()
                .map(|f| format!("{} ({})", f.name, f.description))
                .collect();
            out.push_str(&format!("  Optional fields: {}\n", fields.join(", ")));
        }
        out.push_str(&format!("  Example: {}\n", self.example));
        out
    }
}

/// Validates a `selector`-bearing JSON value against the CSS-only contract.
fn validate_selector_string(value: &str, field: &str, errors: &mut Vec<String>) {
    for pattern in REJECTED_SELECTOR_PATTERNS {
        if value.contains(pattern) {
            errors.push(format!(
                "{field} contains non-CSS pseudo-selector `{pattern}`; only CSS selectors are accepted"
            ));
        }
    }
}

fn require_field(input: &Value, name: &str, errors: &mut Vec<String>) -> Option<Value> {
    match input.get(name) {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => {
            errors.push(format!("missing required field `{name}`"));
            None
        }
    }
}

/// Catalog of the fourteen automation tools, thread-safe for concurrent reads/writes.
/// The tool set is fixed rather than pluggable.
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, ToolDescriptor>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtin_tools()
    }
}

impl ToolRegistry {
    pub fn with_builtin_tools() -> Self {
        let mut map = HashMap::new();
        for descriptor in builtin_descriptors() {
            map.insert(descriptor.name.clone(), descriptor);
        }
        Self {
            entries: RwLock::new(map),
        }
    }

    pub fn get(&self, name: &str) -> Option<ToolDescriptor> {
        self.entries.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self.entries.read().values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn is_analysis_tool(&self, name: &str) -> bool {
        self.entries
            .read()
            .get(name)
            .map(|d| d.is_analysis_tool)
            .unwrap_or(false)
    }

    pub fn prompt_for_llm(&self) -> String {
        self.list()
            .iter()
            .map(ToolDescriptor::prompt_block)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validates a planner-supplied tool call's input. Returns `Ok(())` or a
    /// human-readable message list suitable for inclusion in a recovery prompt.
    pub fn validate(&self, tool_name: &str, input: &Value) -> Result<(), ToolRegistryError> {
        let descriptor = self
            .get(tool_name)
            .ok_or_else(|| ToolRegistryError::UnknownTool(tool_name.to_string()))?;

        let mut errors = Vec::new();
        for field in &descriptor.required_fields {
            if let Some(value) = require_field(input, &field.name, &mut errors) {
                if field.name == "selector" || field.name == "formSelector" || field.name == "submitButtonSelector" {
                    if let Some(s) = value.as_str() {
                        validate_selector_string(s, &field.name, &mut errors);
                    }
                }
            }
        }

        if let Some(backups) = input.get("backupSelectors").and_then(|v| v.as_array()) {
            for backup in backups {
                if let Some(s) = backup.as_str() {
                    validate_selector_string(s, "backupSelectors", &mut errors);
                }
            }
        }
        if let Some(s) = input.get("selector").and_then(|v| v.as_str()) {
            // Catches the case where `selector` is optional for this tool but still supplied.
            if !descriptor.required_fields.iter().any(|f| f.name == "selector") {
                validate_selector_string(s, "selector", &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToolRegistryError::ValidationFailed {
                tool: tool_name.to_string(),
                messages: errors,
            })
        }
    }
}

/// The fourteen tools published by the Action Executor (§4.5/§4.12).
pub fn builtin_descriptors() -> Vec<ToolDescriptor> {
    let mut out = Vec::new();

    macro_rules! tool {
        ($name:expr, $desc:expr, $usage:expr, $example:expr, $analysis:expr, [$($req:expr),* $(,)?], [$($opt:expr),* $(,)?]) => {{
            let mut required = Vec::new();
            let mut optional = Vec::new();
            $(required.push($req);)*
            $(optional.push($opt);)*
            out.push(ToolDescriptor {
                name: $name.to_string(),
                description: $desc.to_string(),
                usage: $usage.to_string(),
                required_fields: required,
                optional_fields: optional,
                example: $example.to_string(),
                is_analysis_tool: $analysis,
            });
        }};
    }

    tool!(
        "navigate", "Load a URL in the current tab.", "Start a plan or jump to a known page.",
        r#"{"url":"https://github.com/new","waitUntil":"load","timeout":30000}"#, false,
        [FieldSpec::new("url", "absolute URL to load")],
        [FieldSpec::new("waitUntil", "load|dom_ready|network_idle"), FieldSpec::new("timeout", "milliseconds, default 30000")]
    );
    tool!(
        "click", "Click an element.", "Activate a button, link, or other clickable element.",
        r#"{"selector":"button[type=\"submit\"]","backupSelectors":["button.btn-primary"]}"#, false,
        [FieldSpec::new("selector", "primary CSS selector")],
        [FieldSpec::new("backupSelectors", "ranked fallback CSS selectors"), FieldSpec::new("text", "expected visible text"), FieldSpec::new("waitForElement", "ms to wait for the element"), FieldSpec::new("verifyVisible", "require the element to be visible before clicking")]
    );
    tool!(
        "type", "Type text into a focused field.", "Fill a text input, textarea, or contenteditable.",
        r#"{"selector":"#repository-name-input","text":"my-project","clearFirst":true}"#, false,
        [FieldSpec::new("selector", "primary CSS selector"), FieldSpec::new("text", "text to type")],
        [FieldSpec::new("backupSelectors", "ranked fallback CSS selectors"), FieldSpec::new("clearFirst", "select-all + backspace before typing"), FieldSpec::new("pressEnter", "press Enter after typing"), FieldSpec::new("waitForElement", "ms to wait for the element")]
    );
    tool!(
        "select", "Set a <select> element's value.", "Choose an option in a dropdown.",
        r#"{"selector":"#country","value":"US"}"#, false,
        [FieldSpec::new("selector", "primary CSS selector")],
        [FieldSpec::new("value", "option value"), FieldSpec::new("label", "option label"), FieldSpec::new("index", "option index"), FieldSpec::new("waitForElement", "ms to wait for the element")]
    );
    tool!(
        "checkbox", "Set a checkbox's checked state.", "Check or uncheck a checkbox input.",
        r#"{"selector":"#accept-terms","checked":true}"#, false,
        [FieldSpec::new("selector", "primary CSS selector"), FieldSpec::new("checked", "desired checked state")],
        []
    );
    tool!(
        "radio", "Select a radio button.", "Choose one option from a radio group.",
        r#"{"selector":"input[name=\"plan\"][value=\"pro\"]","checked":true}"#, false,
        [FieldSpec::new("selector", "primary CSS selector"), FieldSpec::new("checked", "desired checked state")],
        []
    );
    tool!(
        "wait", "Sleep for a fixed duration.", "Allow an animation or async update to settle. Infallible.",
        r#"{"duration_ms":1500}"#, false,
        [FieldSpec::new("duration_ms", "milliseconds to sleep")],
        []
    );
    tool!(
        "waitForElement", "Wait for an element to reach a DOM state.", "Block until an element appears, disappears, or attaches.",
        r#"{"selector":".toast-success","state":"visible","timeout":10000}"#, false,
        [FieldSpec::new("selector", "primary CSS selector"), FieldSpec::new("state", "visible|hidden|attached")],
        [FieldSpec::new("timeout", "milliseconds, default 10000")]
    );
    tool!(
        "keyPress", "Dispatch a key event.", "Send Enter, Escape, Tab, or a modified key combination.",
        r#"{"key":"Escape"}"#, false,
        [FieldSpec::new("key", "key name")],
        [FieldSpec::new("modifiers", "Control|Meta|Alt|Shift"), FieldSpec::new("selector", "element to focus first")]
    );
    tool!(
        "scroll", "Scroll the page or an element into view.", "Bring content into the viewport before interacting with it.",
        r#"{"toElement":"#delete-repo-section"}"#, false,
        [],
        [FieldSpec::new("direction", "up|down|left|right"), FieldSpec::new("amount", "pixels"), FieldSpec::new("toElement", "selector to scroll into view")]
    );
    tool!(
        "submit", "Submit a form.", "Trigger form submission directly rather than clicking a button.",
        r#"{"formSelector":"#new-repo-form"}"#, false,
        [],
        [FieldSpec::new("formSelector", "form CSS selector"), FieldSpec::new("submitButtonSelector", "submit button CSS selector")]
    );
    tool!(
        "extract_context", "Extract structured page context.", "Understand what's on the page before deciding the next step.",
        r#"{"full":false,"scrollTo":"top","maxElements":200}"#, true,
        [],
        [FieldSpec::new("full", "full-page vs viewport-only"), FieldSpec::new("scrollTo", "top|bottom|y-offset|selector"), FieldSpec::new("maxElements", "cap on enumerated elements")]
    );
    tool!(
        "take_snapshot", "Capture a viewport screenshot.", "Visually confirm page state before or after an action.",
        r#"{"scrollTo":"top"}"#, true,
        [],
        [FieldSpec::new("scrollTo", "top|bottom|y-offset|selector")]
    );
    tool!(
        "declare_plan_metadata", "Declare the plan's type.", "Required once per plan so the orchestrator knows whether more turns are expected.",
        r#"{"planType":"final"}"#, false,
        [FieldSpec::new("planType", "intermediate|final")],
        []
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_includes_builtins() {
        let registry = ToolRegistry::with_builtin_tools();
        let prompt = registry.prompt_for_llm();
        assert!(prompt.contains("navigate"));
        assert!(prompt.contains("declare_plan_metadata"));
    }

    #[test]
    fn rejects_playwright_pseudo_selector_before_any_call() {
        let registry = ToolRegistry::with_builtin_tools();
        let result = registry.validate("click", &json!({"selector": "button:has-text(\"X\")"}));
        assert!(result.is_err());
    }

    #[test]
    fn accepts_plain_css_selector() {
        let registry = ToolRegistry::with_builtin_tools();
        let result = registry.validate("click", &json!({"selector": "button[type=\"submit\"]"}));
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let registry = ToolRegistry::with_builtin_tools();
        let result = registry.validate("type", &json!({"selector": "#field"}));
        assert!(matches!(result, Err(ToolRegistryError::ValidationFailed { .. })));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let registry = ToolRegistry::with_builtin_tools();
        let result = registry.validate("not-a-tool", &json!({}));
        assert!(matches!(result, Err(ToolRegistryError::UnknownTool(_))));
    }

    #[test]
    fn extract_context_and_take_snapshot_are_analysis_tools() {
        let registry = ToolRegistry::with_builtin_tools();
        assert!(registry.is_analysis_tool("extract_context"));
        assert!(registry.is_analysis_tool("take_snapshot"));
        assert!(!registry.is_analysis_tool("click"));
    }
}
