use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AutomationSessionId, RecordingSessionId};
use crate::message::Message;
use crate::plan::ExecutedStep;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Error,
}

/// Accumulated planner token/cost counters. Pricing (per million tokens): input 3.0,
/// output 15.0, cache write 3.75, cache read 0.30.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageStats {
    pub const INPUT_PRICE_PER_MTOK: f64 = 3.0;
    pub const OUTPUT_PRICE_PER_MTOK: f64 = 15.0;
    pub const CACHE_WRITE_PRICE_PER_MTOK: f64 = 3.75;
    pub const CACHE_READ_PRICE_PER_MTOK: f64 = 0.30;

    pub fn add(&mut self, delta: UsageStats) {
        self.input_tokens += delta.input_tokens;
        self.output_tokens += delta.output_tokens;
        self.cache_creation_tokens += delta.cache_creation_tokens;
        self.cache_read_tokens += delta.cache_read_tokens;
    }

    pub fn cost_usd(&self) -> f64 {
        let million = 1_000_000.0;
        (self.input_tokens as f64 / million) * Self::INPUT_PRICE_PER_MTOK
            + (self.output_tokens as f64 / million) * Self::OUTPUT_PRICE_PER_MTOK
            + (self.cache_creation_tokens as f64 / million) * Self::CACHE_WRITE_PRICE_PER_MTOK
            + (self.cache_read_tokens as f64 / million) * Self::CACHE_READ_PRICE_PER_MTOK
    }
}

/// Owns its message list and executed-step list exclusively; both are append-only during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationSession {
    pub id: AutomationSessionId,
    pub user_goal: String,
    pub recording_id: Option<RecordingSessionId>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub usage: UsageStats,
    pub recovery_attempts: u32,
    pub phase_number: u32,
    pub executed_step_count: u64,
    pub terminal_error: Option<String>,
    pub messages: Vec<Message>,
    pub steps: Vec<ExecutedStep>,
}

impl AutomationSession {
    pub fn new(user_goal: impl Into<String>, recording_id: Option<RecordingSessionId>) -> Self {
        let now = Utc::now();
        Self {
            id: AutomationSessionId::new(),
            user_goal: user_goal.into(),
            recording_id,
            status: SessionStatus::Running,
            created_at: now,
            updated_at: now,
            completed_at: None,
            usage: UsageStats::default(),
            recovery_attempts: 0,
            phase_number: 0,
            executed_step_count: 0,
            terminal_error: None,
            messages: Vec::new(),
            steps: Vec::new(),
        }
    }
}

/// A compact row for `list_sessions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: AutomationSessionId,
    pub user_goal: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_step_count: u64,
}

impl From<&AutomationSession> for SessionSummary {
    fn from(session: &AutomationSession) -> Self {
        Self {
            id: session.id,
            user_goal: session.user_goal.clone(),
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
            executed_step_count: session.executed_step_count,
        }
    }
}
