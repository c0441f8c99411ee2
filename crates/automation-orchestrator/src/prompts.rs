//! System prompt text for the three planner-call variants. The human-facing
//! continuation/recovery detail (analysis, failed step, current URL) is not
//! duplicated here — it travels as a `message_builder::FollowUpPrompt` text
//! block in the preceding user turn; these strings are only the standing
//! instructions that accompany the tool catalog on every call.

const AUTOMATION_SYSTEM_PROMPT: &str = "\
You are driving a real web browser to accomplish a user's goal by calling tools. \
Plan in small, verifiable phases: call `declare_plan_metadata` first to say whether this \
is your `intermediate` or `final` plan, then the tool calls to execute in order. End an \
intermediate plan with `extract_context` or `take_snapshot` so you can see the page before \
continuing; end a final plan once the goal is satisfied, with no further analysis step.";

const ERROR_RECOVERY_SYSTEM_PROMPT: &str = "\
The previous plan's step failed. Diagnose from the error and current URL included below, \
then return a revised plan. Prefer re-reading the page with `extract_context` before retrying \
a selector-based step; do not repeat the exact failing call unverified.";

/// Which standing instructions accompany the next planner call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    Planning,
    ContinuePhase,
    Recover,
}

pub fn build_system(kind: CallKind, user_goal: &str, tool_catalog: &str) -> Vec<String> {
    let standing = match kind {
        CallKind::Planning | CallKind::ContinuePhase => AUTOMATION_SYSTEM_PROMPT,
        CallKind::Recover => ERROR_RECOVERY_SYSTEM_PROMPT,
    };
    vec![format!("{standing}\n\nUser goal: {user_goal}"), tool_catalog.to_string()]
}
