use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

/// Result of one tool invocation by the Action Executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub summary: Option<String>,
    /// Full structured payload for analysis tools (`extract_context`'s `PageContext`,
    /// `take_snapshot`'s base64 image); `None` for tools with no meaningful value.
    pub value: Option<Value>,
    pub error: Option<ToolError>,
    /// Current page URL at completion, always set.
    pub url: String,
}

impl ToolResult {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: None,
            value: None,
            error: None,
            url: url.into(),
        }
    }

    pub fn failure(url: impl Into<String>, error: ToolError) -> Self {
        Self {
            success: false,
            summary: None,
            value: None,
            error: Some(error),
            url: url.into(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}
