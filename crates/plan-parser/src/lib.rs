//! Translates an assistant message (content blocks + tool uses) into an ordered
//! `Plan` with a declared kind, validating tool names and input shape against the
//! Tool Registry along the way.

use automation_types::{ContentBlock, Message, Plan, PlanKind, PlanStep};
use thiserror::Error;
use tool_registry::{ToolRegistry, ToolRegistryError};

const DECLARE_PLAN_METADATA: &str = "declare_plan_metadata";
const ANALYSIS_TOOLS: &[&str] = &["extract_context", "take_snapshot"];

const INTERMEDIATE_MARKERS: &[&str] = &["then analyze", "partial plan", "will continue"];
const FINAL_MARKERS: &[&str] = &["final plan", "this completes", "should accomplish the goal"];

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("message has no tool_use blocks; at least one executable step is required")]
    NoExecutableSteps,
    #[error("tool `{tool}` at step {order} failed validation: {source}")]
    InvalidStep {
        tool: String,
        order: usize,
        #[source]
        source: ToolRegistryError,
    },
}

/// Parses an assistant message into a `Plan`, in document order.
///
/// `declare_plan_metadata` is pulled out of the executable step list (still
/// required to receive a `tool_result`, but not itself executed).
pub fn parse_plan(message: &Message, registry: &ToolRegistry) -> Result<Plan, PlanParseError> {
    let mut analysis = String::new();
    let mut steps = Vec::new();
    let mut metadata_tool_use_id = None;
    let mut order = 0usize;
    let mut last_tool_name: Option<&str> = None;

    for block in &message.content {
        match block {
            ContentBlock::Text { text } => {
                if !analysis.is_empty() {
                    analysis.push('\n');
                }
                analysis.push_str(text);
            }
            ContentBlock::ToolUse { id, name, input } => {
                if name == DECLARE_PLAN_METADATA {
                    metadata_tool_use_id = Some(id.clone());
                    continue;
                }
                registry
                    .validate(name, input)
                    .map_err(|source| PlanParseError::InvalidStep {
                        tool: name.clone(),
                        order,
                        source,
                    })?;
                steps.push(PlanStep {
                    tool_use_id: id.clone(),
                    tool_name: name.clone(),
                    input: input.clone(),
                    order,
                });
                last_tool_name = Some(name.as_str());
                order += 1;
            }
            ContentBlock::ToolResult { .. } => {
                // Planner messages never carry tool_result blocks; ignore defensively.
            }
        }
    }

    if steps.is_empty() {
        return Err(PlanParseError::NoExecutableSteps);
    }

    let kind = detect_plan_kind(&analysis, last_tool_name);

    Ok(Plan {
        kind,
        steps,
        analysis,
        metadata_tool_use_id,
    })
}

fn detect_plan_kind(analysis: &str, last_tool_name: Option<&str>) -> PlanKind {
    let lower = analysis.to_ascii_lowercase();

    let ends_in_analysis_tool = last_tool_name
        .map(|name| ANALYSIS_TOOLS.contains(&name))
        .unwrap_or(false);
    if ends_in_analysis_tool {
        return PlanKind::Intermediate;
    }

    if INTERMEDIATE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return PlanKind::Intermediate;
    }

    if FINAL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return PlanKind::Final;
    }

    // Default final when no marker is present and no analysis-tool terminator.
    PlanKind::Final
}
