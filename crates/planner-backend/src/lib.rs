//! Opaque boundary between the Automation Orchestrator and whatever LLM
//! actually plans the next turn. The orchestrator never sees vendor-specific
//! request/response shapes — just text/tool_use content blocks and a usage
//! record it can price with `automation_types::UsageStats`.

mod claude;

use async_trait::async_trait;
use automation_types::{ContentBlock, Message, UsageStats};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tool_registry::ToolDescriptor;

pub use claude::{ClaudeConfig, ClaudePlannerBackend};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner HTTP call failed: {0}")]
    Transport(String),
    #[error("planner returned {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("planner response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// One tool made available to the planner, translated from a `ToolDescriptor`
/// into the JSON-schema shape the planner's native tool-use API expects.
#[derive(Clone, Debug, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for ToolSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in &descriptor.required_fields {
            properties.insert(field.name.clone(), serde_json::json!({ "description": field.description }));
            required.push(field.name.clone());
        }
        for field in &descriptor.optional_fields {
            properties.insert(field.name.clone(), serde_json::json!({ "description": field.description }));
        }
        ToolSpec {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": Value::Object(properties),
                "required": required,
            }),
        }
    }
}

/// Replay context from the reference recording, carried with a cache hint so
/// a provider that supports prompt caching doesn't re-bill it every turn.
#[derive(Clone, Debug)]
pub struct CachedContextBlock {
    pub content: Value,
}

/// Everything the planner needs to produce the next turn. `system` is plain
/// text blocks (instructions, tool catalog prose); `tools` are the callable
/// schemas; `cached_context` is the optional recorded-session reference.
#[derive(Clone, Debug)]
pub struct PlannerRequest {
    pub system: Vec<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub cached_context: Option<CachedContextBlock>,
    pub max_tokens: u32,
}

/// The planner's reply: an ordered list of text/tool_use blocks plus the
/// usage counters the orchestrator prices via `UsageStats::cost_usd`.
#[derive(Clone, Debug)]
pub struct PlannerMessage {
    pub content: Vec<ContentBlock>,
    pub usage: UsageStats,
}

#[async_trait]
pub trait PlannerBackend: Send + Sync {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerMessage, PlannerError>;
}

/// Deterministic backend for tests and offline development. Always emits a
/// `declare_plan_metadata` tool_use plus one inert tool_use, matching the
/// shape a real plan must have (§4.6's validation requires at least one
/// executable step and a metadata declaration).
#[derive(Debug, Default, Clone)]
pub struct MockPlannerBackend {
    pub plan_type: String,
}

impl MockPlannerBackend {
    pub fn new(plan_type: impl Into<String>) -> Self {
        Self { plan_type: plan_type.into() }
    }
}

#[async_trait]
impl PlannerBackend for MockPlannerBackend {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerMessage, PlannerError> {
        let plan_type = if self.plan_type.is_empty() { "final" } else { &self.plan_type };
        let content = vec![
            ContentBlock::text(format!("Mock plan for goal context with {} prior messages", request.messages.len())),
            ContentBlock::tool_use("mock_metadata", "declare_plan_metadata", serde_json::json!({"planType": plan_type})),
            ContentBlock::tool_use("mock_step_1", "extract_context", serde_json::json!({"full": false})),
        ];
        Ok(PlannerMessage {
            content,
            usage: UsageStats {
                input_tokens: 500,
                output_tokens: 80,
                cache_creation_tokens: 0,
                cache_read_tokens: 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_spec_marks_required_fields() {
        let registry = tool_registry::ToolRegistry::with_builtin_tools();
        let click = registry.get("click").unwrap();
        let spec = ToolSpec::from(&click);
        assert_eq!(spec.input_schema["required"], serde_json::json!(["selector"]));
        assert!(spec.input_schema["properties"].get("backupSelectors").is_some());
    }

    #[tokio::test]
    async fn mock_backend_always_declares_plan_metadata() {
        let backend = MockPlannerBackend::new("intermediate");
        let request = PlannerRequest {
            system: vec!["be helpful".into()],
            messages: vec![],
            tools: vec![],
            cached_context: None,
            max_tokens: 1024,
        };
        let message = backend.plan(&request).await.unwrap();
        let has_metadata = message
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { name, .. } if name == "declare_plan_metadata"));
        assert!(has_metadata);
    }
}
