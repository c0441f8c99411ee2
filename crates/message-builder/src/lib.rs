//! Builds the next user turn from a `Plan` and the `ExecutedStep`s produced so
//! far, preserving 1:1 correspondence with emitted `tool_use` ids (the
//! tool-result pairing invariant).

use automation_types::{ContentBlock, ExecutedStep, Message, Plan};
use serde_json::{json, Value};

/// Canonical marker placed on a placeholder `tool_result` for a step the
/// executor never reached. Context Compression looks for this exact string.
pub const NOT_EXECUTED_MARKER: &str = "Not executed — automation stopped before reaching this step";

/// A continuation or recovery prompt to append after the tool_result blocks.
#[derive(Clone, Debug)]
pub enum FollowUpPrompt {
    /// Intermediate-plan handoff: ask the planner to continue given fresh context.
    Continuation { analysis: String, current_url: String },
    /// Error recovery: include the failed step's params, error, and current URL.
    Recovery {
        failed_tool: String,
        failed_input: Value,
        error_message: String,
        current_url: String,
    },
}

impl FollowUpPrompt {
    fn render(&self) -> String {
        match self {
            FollowUpPrompt::Continuation { analysis, current_url } => format!(
                "Continue the automation. Previous analysis:\n{analysis}\nCurrent URL: {current_url}\nPlan the next phase."
            ),
            FollowUpPrompt::Recovery {
                failed_tool,
                failed_input,
                error_message,
                current_url,
            } => format!(
                "AUTOMATION ERROR ENCOUNTERED\nStep `{failed_tool}` failed with input {failed_input}.\nError: {error_message}\nCurrent URL: {current_url}\nRevise the plan to recover."
            ),
        }
    }
}

/// Builds the `tool_result`-block turn for a plan that has been (partially) executed.
///
/// `executed` must be in plan order and is a prefix of `plan.steps` — the Orchestrator
/// stops calling the executor as soon as a step fails or the loop exits; any remaining
/// plan steps receive a placeholder "Not executed" `tool_result`.
pub fn build_tool_result_message(plan: &Plan, executed: &[ExecutedStep], follow_up: Option<FollowUpPrompt>) -> Message {
    let mut blocks = Vec::new();

    if let Some(metadata_id) = &plan.metadata_tool_use_id {
        blocks.push(ContentBlock::tool_result(
            metadata_id.clone(),
            json!({"success": true, "planType": plan_type_label(plan)}),
            false,
        ));
    }

    let executed_by_id: std::collections::HashMap<&str, &ExecutedStep> =
        executed.iter().map(|step| (step.tool_use_id.as_str(), step)).collect();

    for step in &plan.steps {
        match executed_by_id.get(step.tool_use_id.as_str()) {
            Some(executed_step) => {
                blocks.push(tool_result_for_executed_step(step.tool_name.as_str(), executed_step));
            }
            None => {
                blocks.push(ContentBlock::tool_result(
                    step.tool_use_id.clone(),
                    json!(NOT_EXECUTED_MARKER),
                    true,
                ));
            }
        }
    }

    if let Some(prompt) = follow_up {
        blocks.push(ContentBlock::text(prompt.render()));
    }

    Message::user(blocks)
}

fn plan_type_label(plan: &Plan) -> &'static str {
    match plan.kind {
        automation_types::PlanKind::Intermediate => "intermediate",
        automation_types::PlanKind::Final => "final",
    }
}

fn tool_result_for_executed_step(tool_name: &str, executed: &ExecutedStep) -> ContentBlock {
    if !executed.success {
        let error = executed
            .result
            .as_ref()
            .and_then(|r| r.error.as_ref())
            .map(|e| e.message.clone())
            .or_else(|| executed.error_string.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        return ContentBlock::tool_result(
            executed.tool_use_id.clone(),
            json!({"success": false, "error": error, "toolName": tool_name}),
            true,
        );
    }

    let is_analysis = matches!(tool_name, "extract_context" | "take_snapshot");
    let content = match &executed.result {
        Some(result) if is_analysis => result.value.clone().unwrap_or(Value::Null),
        Some(result) => json!({
            "success": true,
            "message": result.summary.clone().unwrap_or_default(),
            "summary": result.summary.clone(),
        }),
        None => json!({"success": true}),
    };

    ContentBlock::tool_result(executed.tool_use_id.clone(), content, false)
}
