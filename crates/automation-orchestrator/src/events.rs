use automation_types::AutomationSessionId;

/// Progress events emitted as a session runs. External collaborators (the
/// CLI, a future UI) subscribe via `Orchestrator::subscribe`; nothing about
/// session correctness depends on whether anyone is listening.
#[derive(Clone, Debug)]
pub enum AutomationEvent {
    StepStart { session_id: AutomationSessionId, step_number: u64, tool_name: String },
    StepComplete { session_id: AutomationSessionId, step_number: u64, tool_name: String },
    StepError { session_id: AutomationSessionId, step_number: u64, tool_name: String, error: String },
    AutomationComplete { session_id: AutomationSessionId, success: bool, reason: Option<String> },
}
