//! The control engine: drives `PLANNING → EXECUTING → RECOVER|CONTINUE_PHASE`
//! to a terminal `COMPLETED`/`ERROR` session state.
//!
//! Per the "iterative" resolution recorded in `DESIGN.md`, this is the only
//! `executePlan` path implemented — there is no single-shot variant.
//!
//! The state machine is not modeled as an explicit enum of its own: the
//! persisted `messages` list already encodes which phase comes next (the
//! last user turn carries either nothing, a continuation follow-up, or a
//! recovery follow-up), so `resume` only needs the stored messages and
//! counters to pick up exactly where a session left off.

mod events;
mod prompts;

use std::sync::Arc;
use std::time::Duration;

use action_executor::BrowserOps;
use automation_types::{
    AutomationSessionId, ExecutedStep, Message, PlanKind, PlanStep, RecordingSessionId, SessionStatus,
};
use message_builder::FollowUpPrompt;
use planner_backend::{CachedContextBlock, PlannerBackend, PlannerError, PlannerMessage, PlannerRequest, ToolSpec};
use serde_json::Value;
use session_store::{SessionPatch, SessionStore, SessionStoreError};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tool_registry::ToolRegistry;
use tracing::warn;

pub use events::AutomationEvent;
pub use prompts::CallKind;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("planner call failed: {0}")]
    Planner(String),
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),
    #[error("automation cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub max_recovery_attempts: u32,
    pub max_automation_steps: u64,
    pub planner_max_tokens: u32,
    pub layer_b: context_compression::LayerBConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 10,
            max_automation_steps: 50,
            planner_max_tokens: 4096,
            layer_b: context_compression::LayerBConfig::default(),
        }
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    store: Arc<SessionStore>,
    planner: Arc<dyn PlannerBackend>,
    registry: Arc<ToolRegistry>,
    events_tx: broadcast::Sender<AutomationEvent>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, store: Arc<SessionStore>, planner: Arc<dyn PlannerBackend>, registry: Arc<ToolRegistry>) -> Self {
        let (events_tx, _rx) = broadcast::channel(256);
        Self { config, store, planner, registry, events_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.events_tx.subscribe()
    }

    /// Starts a brand-new session and drives it to a terminal state.
    pub async fn start(
        &self,
        ops: &dyn BrowserOps,
        user_goal: impl Into<String>,
        recording_id: Option<RecordingSessionId>,
        cached_context: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<AutomationSessionId, OrchestratorError> {
        let user_goal = user_goal.into();
        let session_id = self.store.create_session(user_goal.clone(), recording_id, cached_context.clone()).await?;
        self.drive(ops, session_id, &user_goal, cached_context, Vec::new(), 0, 0, CallKind::Planning, cancel).await?;
        Ok(session_id)
    }

    /// Rehydrates a paused or interrupted session from the store and
    /// continues driving it. A no-op if the session is already terminal.
    pub async fn resume(&self, ops: &dyn BrowserOps, session_id: AutomationSessionId, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        let loaded = self.store.load_session(session_id).await?;
        if matches!(loaded.session.status, SessionStatus::Completed | SessionStatus::Error) {
            return Ok(());
        }

        let call_kind = next_call_kind(&loaded.messages);
        self.drive(
            ops,
            session_id,
            &loaded.session.user_goal,
            loaded.cached_context,
            loaded.messages,
            loaded.session.recovery_attempts,
            loaded.session.phase_number,
            call_kind,
            cancel,
        )
        .await
    }

    pub async fn pause(&self, session_id: AutomationSessionId) -> Result<(), OrchestratorError> {
        self.store.pause_session(session_id).await.map_err(OrchestratorError::from)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        ops: &dyn BrowserOps,
        session_id: AutomationSessionId,
        user_goal: &str,
        cached_context: Option<Value>,
        mut messages: Vec<Message>,
        mut recovery_attempts: u32,
        mut phase_number: u32,
        mut call_kind: CallKind,
        cancel: CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let mut executed_step_count = self.store.load_session(session_id).await?.session.executed_step_count;
        let tool_catalog = self.registry.prompt_for_llm();
        let cached_context_block = cached_context.map(|content| CachedContextBlock { content });

        loop {
            if cancel.is_cancelled() {
                return self.terminate(session_id, false, "cancelled").await.and(Err(OrchestratorError::Cancelled));
            }

            context_compression::compress_structural(&mut messages);
            context_compression::compress_sliding_window(&mut messages, user_goal, &self.config.layer_b);

            let request = PlannerRequest {
                system: prompts::build_system(call_kind, user_goal, &tool_catalog),
                messages: messages.clone(),
                tools: self.registry.list().iter().map(ToolSpec::from).collect(),
                cached_context: cached_context_block.clone(),
                max_tokens: self.config.planner_max_tokens,
            };

            let planner_message = match self.call_planner_with_retry(&request).await {
                Ok(message) => message,
                Err(err) => {
                    self.terminate(session_id, false, &format!("planner_error: {err}")).await?;
                    return Err(OrchestratorError::Planner(err.to_string()));
                }
            };
            self.store.update_usage(session_id, planner_message.usage).await?;

            let assistant_message = Message::assistant(planner_message.content);
            let plan = match plan_parser::parse_plan(&assistant_message, &self.registry) {
                Ok(plan) => plan,
                Err(err) => {
                    messages.push(assistant_message.clone());
                    self.store.append_message(session_id, assistant_message).await?;
                    self.terminate(session_id, false, &format!("plan_parse_error: {err}")).await?;
                    return Err(OrchestratorError::Planner(err.to_string()));
                }
            };
            messages.push(assistant_message.clone());
            self.store.append_message(session_id, assistant_message).await?;

            let outcome = self.execute_plan_steps(ops, session_id, &plan, &mut executed_step_count).await?;

            let current_url = ops.current_url().await.unwrap_or_default();

            match outcome {
                StepOutcome::BudgetExhausted { executed } => {
                    self.append_tool_results(session_id, &mut messages, &plan, &executed, None).await?;
                    self.terminate(session_id, false, "max_steps_reached").await?;
                    return Err(OrchestratorError::BudgetExhausted("max_steps_reached".to_string()));
                }
                StepOutcome::Failed { executed, failed_step, error_message } => {
                    recovery_attempts += 1;
                    self.store
                        .update_session(session_id, SessionPatch { recovery_attempts: Some(recovery_attempts), ..Default::default() })
                        .await?;

                    if recovery_attempts > self.config.max_recovery_attempts {
                        self.append_tool_results(session_id, &mut messages, &plan, &executed, None).await?;
                        self.terminate(session_id, false, "max_recovery_exhausted").await?;
                        return Err(OrchestratorError::BudgetExhausted("max_recovery_exhausted".to_string()));
                    }

                    let follow_up = FollowUpPrompt::Recovery {
                        failed_tool: failed_step.tool_name,
                        failed_input: failed_step.input,
                        error_message,
                        current_url,
                    };
                    self.append_tool_results(session_id, &mut messages, &plan, &executed, Some(follow_up)).await?;
                    call_kind = CallKind::Recover;
                }
                StepOutcome::Completed { executed } if plan.kind == PlanKind::Final => {
                    self.append_tool_results(session_id, &mut messages, &plan, &executed, None).await?;
                    self.terminate(session_id, true, "").await?;
                    let _ = self.events_tx.send(AutomationEvent::AutomationComplete { session_id, success: true, reason: None });
                    return Ok(());
                }
                StepOutcome::Completed { executed } => {
                    phase_number += 1;
                    self.store
                        .update_session(session_id, SessionPatch { phase_number: Some(phase_number), ..Default::default() })
                        .await?;
                    let follow_up = FollowUpPrompt::Continuation { analysis: plan.analysis.clone(), current_url };
                    self.append_tool_results(session_id, &mut messages, &plan, &executed, Some(follow_up)).await?;
                    call_kind = CallKind::ContinuePhase;
                }
            }
        }
    }

    async fn execute_plan_steps(
        &self,
        ops: &dyn BrowserOps,
        session_id: AutomationSessionId,
        plan: &automation_types::Plan,
        executed_step_count: &mut u64,
    ) -> Result<StepOutcome, OrchestratorError> {
        let mut executed = Vec::new();

        for step in &plan.steps {
            if *executed_step_count >= self.config.max_automation_steps {
                return Ok(StepOutcome::BudgetExhausted { executed });
            }

            let step_number = *executed_step_count + 1;
            let _ = self.events_tx.send(AutomationEvent::StepStart { session_id, step_number, tool_name: step.tool_name.clone() });

            let result = action_executor::execute_tool(&step.tool_name, &step.input, ops).await;
            *executed_step_count += 1;

            let executed_step = ExecutedStep::from_result(step_number, step.tool_use_id.clone(), step.tool_name.clone(), result.clone());
            self.store.append_step(session_id, executed_step.clone()).await?;

            if result.success {
                let _ = self.events_tx.send(AutomationEvent::StepComplete { session_id, step_number, tool_name: step.tool_name.clone() });
                executed.push(executed_step);
            } else {
                let error_message = result
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                let _ = self.events_tx.send(AutomationEvent::StepError {
                    session_id,
                    step_number,
                    tool_name: step.tool_name.clone(),
                    error: error_message.clone(),
                });
                executed.push(executed_step);
                return Ok(StepOutcome::Failed { executed, failed_step: step.clone(), error_message });
            }
        }

        Ok(StepOutcome::Completed { executed })
    }

    async fn append_tool_results(
        &self,
        session_id: AutomationSessionId,
        messages: &mut Vec<Message>,
        plan: &automation_types::Plan,
        executed: &[ExecutedStep],
        follow_up: Option<FollowUpPrompt>,
    ) -> Result<(), OrchestratorError> {
        let tool_result_message = message_builder::build_tool_result_message(plan, executed, follow_up);
        messages.push(tool_result_message.clone());
        self.store.append_message(session_id, tool_result_message).await?;
        Ok(())
    }

    async fn terminate(&self, session_id: AutomationSessionId, success: bool, reason: &str) -> Result<(), OrchestratorError> {
        let error = if success { None } else { Some(reason.to_string()) };
        self.store.complete_session(session_id, success, error).await?;
        if !success {
            let _ = self.events_tx.send(AutomationEvent::AutomationComplete {
                session_id,
                success: false,
                reason: Some(reason.to_string()),
            });
        }
        Ok(())
    }

    /// One automatic retry with a short backoff on a transport/parse-level
    /// planner failure, then terminal — matches the error-handling design's
    /// `PlannerError` escalation rule.
    async fn call_planner_with_retry(&self, request: &PlannerRequest) -> Result<PlannerMessage, PlannerError> {
        match self.planner.plan(request).await {
            Ok(message) => Ok(message),
            Err(first_err) => {
                warn!(error = %first_err, "planner call failed, retrying once");
                tokio::time::sleep(Duration::from_millis(500)).await;
                self.planner.plan(request).await
            }
        }
    }
}

enum StepOutcome {
    Completed { executed: Vec<ExecutedStep> },
    Failed { executed: Vec<ExecutedStep>, failed_step: PlanStep, error_message: String },
    BudgetExhausted { executed: Vec<ExecutedStep> },
}

/// Inspects the last stored user turn to determine which system prompt the
/// next planner call should use after a resume. A recovery follow-up and a
/// continuation follow-up are both rendered as a trailing `Text` block, but
/// only the recovery one is preceded by the message builder's error marker.
fn next_call_kind(messages: &[Message]) -> CallKind {
    let Some(last) = messages.last() else {
        return CallKind::Planning;
    };
    let Some(automation_types::ContentBlock::Text { text }) = last.content.last() else {
        return CallKind::Planning;
    };
    if text.starts_with("AUTOMATION ERROR ENCOUNTERED") {
        CallKind::Recover
    } else if text.starts_with("Continue the automation.") {
        CallKind::ContinuePhase
    } else {
        CallKind::Planning
    }
}
