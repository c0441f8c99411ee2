//! Claude-backed `PlannerBackend`. A `reqwest`-based HTTP client against the
//! Messages API, reporting usage counters, native tool_use blocks, and an
//! ephemeral prompt-cache hint on the system prompt.

use std::time::Duration;

use async_trait::async_trait;
use automation_types::ContentBlock;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{PlannerBackend, PlannerError, PlannerMessage, PlannerRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-5".to_string(),
            api_base: "https://api.anthropic.com/v1".to_string(),
            temperature: 0.2,
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct ClaudePlannerBackend {
    client: Client,
    config: ClaudeConfig,
}

impl ClaudePlannerBackend {
    pub fn new(config: ClaudeConfig) -> Result<Self, PlannerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PlannerError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_system_blocks(&self, request: &PlannerRequest) -> Vec<Value> {
        let mut blocks: Vec<Value> = request.system.iter().map(|text| json!({"type": "text", "text": text})).collect();
        if let Some(cached) = &request.cached_context {
            blocks.push(json!({
                "type": "text",
                "text": cached.content.to_string(),
                "cache_control": {"type": "ephemeral"},
            }));
        }
        blocks
    }
}

#[async_trait]
impl PlannerBackend for ClaudePlannerBackend {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerMessage, PlannerError> {
        let messages = serde_json::to_value(&request.messages).map_err(|err| PlannerError::InvalidResponse(err.to_string()))?;
        let tools: Vec<Value> = request.tools.iter().map(|t| serde_json::to_value(t).unwrap_or(Value::Null)).collect();

        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": request.max_tokens.max(self.config.max_tokens),
            "system": self.build_system_blocks(request),
            "messages": messages,
            "tools": tools,
        });

        let url = format!("{}/messages", self.config.api_base.trim_end_matches('/'));
        debug!(url = %url, model = %self.config.model, "calling planner backend");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| PlannerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(status = %status, body = %text, "planner backend returned an error status");
            return Err(PlannerError::BadStatus { status: status.as_u16(), body: text });
        }

        let raw: Value = response.json().await.map_err(|err| PlannerError::InvalidResponse(err.to_string()))?;
        parse_claude_response(raw)
    }
}

fn parse_claude_response(raw: Value) -> Result<PlannerMessage, PlannerError> {
    let blocks = raw
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| PlannerError::InvalidResponse("missing content array".to_string()))?;

    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        let parsed: ContentBlock = serde_json::from_value(block.clone())
            .map_err(|err| PlannerError::InvalidResponse(format!("unparseable content block: {err}")))?;
        content.push(parsed);
    }

    let usage_raw = raw.get("usage").cloned().unwrap_or(Value::Null);
    let usage = automation_types::UsageStats {
        input_tokens: usage_raw.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage_raw.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_creation_tokens: usage_raw.get("cache_creation_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read_tokens: usage_raw.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0),
    };

    Ok(PlannerMessage { content, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_tool_use_blocks_with_usage() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "thinking..."},
                {"type": "tool_use", "id": "tu_1", "name": "click", "input": {"selector": "#go"}},
            ],
            "usage": {
                "input_tokens": 1200,
                "output_tokens": 45,
                "cache_creation_input_tokens": 300,
                "cache_read_input_tokens": 900,
            },
        });
        let message = parse_claude_response(raw).unwrap();
        assert_eq!(message.content.len(), 2);
        assert_eq!(message.usage.input_tokens, 1200);
        assert_eq!(message.usage.cache_read_tokens, 900);
    }

    #[test]
    fn missing_content_array_is_invalid_response() {
        let result = parse_claude_response(json!({"usage": {}}));
        assert!(matches!(result, Err(PlannerError::InvalidResponse(_))));
    }
}
