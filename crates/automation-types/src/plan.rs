use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool_result::ToolResult;

/// Whether execution should terminate with further planning turns expected.
///
/// An intermediate plan's execution terminates in an analysis tool so the planner
/// can condition its next plan on fresh page state. A final plan is expected to
/// complete the user's goal without further planning turns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Intermediate,
    Final,
}

/// One step in a `Plan`: a tool name, the LLM-assigned `tool_use_id`, and its input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool_use_id: String,
    pub tool_name: String,
    pub input: Value,
    /// 0-based order index within the plan.
    pub order: usize,
}

/// The result of parsing an assistant message into an ordered set of executable steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub kind: PlanKind,
    pub steps: Vec<PlanStep>,
    pub analysis: String,
    /// The synthetic `declare_plan_metadata` tool_use id, if the planner emitted one.
    /// Still requires a matching `tool_result`, but is not an executable step.
    pub metadata_tool_use_id: Option<String>,
}

impl Plan {
    pub fn has_executable_steps(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// One step that has run to completion (or failure) within a session, numbered globally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub step_number: u64,
    pub tool_use_id: String,
    pub tool_name: String,
    pub success: bool,
    /// `Some` on success or a structured tool-level failure; `None` only when the
    /// executor itself could not even attempt the tool (rare infra failure), in which
    /// case `error_string` carries the description instead.
    pub result: Option<ToolResult>,
    pub error_string: Option<String>,
}

impl ExecutedStep {
    pub fn from_result(step_number: u64, tool_use_id: impl Into<String>, tool_name: impl Into<String>, result: ToolResult) -> Self {
        let success = result.success;
        Self {
            step_number,
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            success,
            result: Some(result),
            error_string: None,
        }
    }
}
