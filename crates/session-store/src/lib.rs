//! Embedded, filesystem-backed store for `AutomationSession`s: one directory
//! per installation, one subdirectory per session, each holding a single
//! `session.json` written via the write-to-`.tmp`-then-rename pattern. No
//! external database: a directory tree plus `serde_json` is enough for a
//! single-process embedded store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod recordings;

use automation_types::{
    AutomationSession, AutomationSessionId, ExecutedStep, Message, RecordingSessionId, SessionStatus, SessionSummary,
    UsageStats,
};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session {0} not found")]
    NotFound(AutomationSessionId),
    #[error("recording {0} not found")]
    RecordingNotFound(RecordingSessionId),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The on-disk record for one session: the `AutomationSession` plus the
/// recorded-session context cached alongside it, which has no home on
/// `AutomationSession` itself since it is replay context rather than
/// session-owned state.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SessionRecord {
    session: AutomationSession,
    cached_context: Option<Value>,
}

/// Returned by `load_session`.
#[derive(Clone, Debug)]
pub struct LoadedSession {
    pub session: AutomationSession,
    pub messages: Vec<Message>,
    pub steps: Vec<ExecutedStep>,
    pub cached_context: Option<Value>,
}

/// Fields `update_session` may patch. `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub phase_number: Option<u32>,
    pub recovery_attempts: Option<u32>,
}

/// Analysis tools whose full `ToolResult.value` must never reach durable
/// storage as part of a step — only the compact form does. The full payload
/// lives transiently in the in-memory message list until compression drops it.
const ANALYSIS_TOOLS: &[&str] = &["extract_context", "take_snapshot"];

const COMPACTED_MARKER: &str = "Full result omitted from durable storage; see message history";

pub struct SessionStore {
    root: PathBuf,
    locks: DashMap<AutomationSessionId, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    fn session_dir(&self, id: AutomationSessionId) -> PathBuf {
        self.root.join("sessions").join(id.to_string())
    }

    fn session_path(&self, id: AutomationSessionId) -> PathBuf {
        self.session_dir(id).join("session.json")
    }

    fn lock_for(&self, id: AutomationSessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn read_record(&self, id: AutomationSessionId) -> Result<SessionRecord, SessionStoreError> {
        let path = self.session_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(SessionStoreError::NotFound(id)),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_record(&self, id: AutomationSessionId, record: &SessionRecord) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(id);
        fs::create_dir_all(&dir).await?;
        let path = self.session_path(id);
        let payload = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &payload).await?;
        Ok(())
    }

    /// Loads, mutates via `f`, and persists a session's record while holding
    /// its per-session lock — the unit of linearizability this store promises.
    async fn with_session<F>(&self, id: AutomationSessionId, f: F) -> Result<(), SessionStoreError>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut record = self.read_record(id).await?;
        f(&mut record);
        record.session.updated_at = Utc::now();
        self.write_record(id, &record).await
    }

    pub async fn create_session(
        &self,
        user_goal: impl Into<String>,
        recording_id: Option<RecordingSessionId>,
        cached_context: Option<Value>,
    ) -> Result<AutomationSessionId, SessionStoreError> {
        let session = AutomationSession::new(user_goal, recording_id);
        let id = session.id;
        let record = SessionRecord { session, cached_context };
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.write_record(id, &record).await?;
        debug!(session_id = %id, "created automation session");
        Ok(id)
    }

    pub async fn append_message(&self, id: AutomationSessionId, message: Message) -> Result<(), SessionStoreError> {
        self.with_session(id, |record| record.session.messages.push(message)).await
    }

    pub async fn append_step(&self, id: AutomationSessionId, step: ExecutedStep) -> Result<(), SessionStoreError> {
        let step = compact_for_storage(step);
        self.with_session(id, |record| {
            record.session.executed_step_count += 1;
            record.session.steps.push(step);
        })
        .await
    }

    pub async fn update_session(&self, id: AutomationSessionId, patch: SessionPatch) -> Result<(), SessionStoreError> {
        self.with_session(id, |record| {
            if let Some(status) = patch.status {
                record.session.status = status;
            }
            if let Some(phase_number) = patch.phase_number {
                record.session.phase_number = phase_number;
            }
            if let Some(recovery_attempts) = patch.recovery_attempts {
                record.session.recovery_attempts = recovery_attempts;
            }
        })
        .await
    }

    pub async fn update_usage(&self, id: AutomationSessionId, delta: UsageStats) -> Result<(), SessionStoreError> {
        self.with_session(id, |record| record.session.usage.add(delta)).await
    }

    pub async fn complete_session(&self, id: AutomationSessionId, success: bool, error: Option<String>) -> Result<(), SessionStoreError> {
        self.with_session(id, |record| {
            record.session.status = if success { SessionStatus::Completed } else { SessionStatus::Error };
            record.session.completed_at = Some(Utc::now());
            record.session.terminal_error = error;
        })
        .await
    }

    pub async fn pause_session(&self, id: AutomationSessionId) -> Result<(), SessionStoreError> {
        self.with_session(id, |record| record.session.status = SessionStatus::Paused).await
    }

    pub async fn load_session(&self, id: AutomationSessionId) -> Result<LoadedSession, SessionStoreError> {
        let record = self.read_record(id).await?;
        Ok(LoadedSession {
            messages: record.session.messages.clone(),
            steps: record.session.steps.clone(),
            cached_context: record.cached_context,
            session: record.session,
        })
    }

    pub async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let sessions_dir = self.root.join("sessions");
        if fs::metadata(&sessions_dir).await.is_err() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join("session.json");
            match read_record_at(&path).await {
                Ok(record) => summaries.push(SessionSummary::from(&record.session)),
                Err(err) => warn!(?err, path = %path.display(), "failed to read session record while listing"),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn delete_session(&self, id: AutomationSessionId) -> Result<(), SessionStoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let dir = self.session_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(SessionStoreError::NotFound(id)),
            Err(err) => return Err(err.into()),
        }
        self.locks.remove(&id);
        Ok(())
    }
}

async fn read_record_at(path: &Path) -> Result<SessionRecord, SessionStoreError> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn compact_for_storage(mut step: ExecutedStep) -> ExecutedStep {
    if ANALYSIS_TOOLS.contains(&step.tool_name.as_str()) {
        if let Some(result) = step.result.as_mut() {
            if result.value.is_some() {
                result.value = Some(Value::String(COMPACTED_MARKER.to_string()));
            }
        }
    }
    step
}

pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.flush().await?;
    fs::rename(tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation_types::{ContentBlock, Role, ToolError, ToolResult};
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_append_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = store.create_session("book a flight", None, Some(Value::String("ctx".into()))).await.unwrap();

        store.append_message(id, Message::user(vec![ContentBlock::text("go")])).await.unwrap();
        store
            .append_step(id, ExecutedStep::from_result(1, "tu_1", "click", ToolResult::success("https://example.com")))
            .await
            .unwrap();
        store.update_usage(id, UsageStats { input_tokens: 100, output_tokens: 50, ..Default::default() }).await.unwrap();

        let loaded = store.load_session(id).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.session.usage.input_tokens, 100);
        assert_eq!(loaded.cached_context, Some(Value::String("ctx".into())));
    }

    #[tokio::test]
    async fn analysis_tool_results_are_compacted_on_append() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = store.create_session("goal", None, None).await.unwrap();

        let mut result = ToolResult::success("https://example.com");
        result.value = Some(serde_json::json!({"url": "x", "dom": "...", "extractedAt": "now"}));
        store.append_step(id, ExecutedStep::from_result(1, "tu_1", "extract_context", result)).await.unwrap();

        let loaded = store.load_session(id).await.unwrap();
        let stored_value = loaded.steps[0].result.as_ref().unwrap().value.clone().unwrap();
        assert_eq!(stored_value, Value::String(COMPACTED_MARKER.to_string()));
    }

    #[tokio::test]
    async fn complete_session_sets_terminal_state() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = store.create_session("goal", None, None).await.unwrap();
        store.complete_session(id, false, Some("recovery budget exhausted".into())).await.unwrap();

        let loaded = store.load_session(id).await.unwrap();
        assert_eq!(loaded.session.status, SessionStatus::Error);
        assert!(loaded.session.completed_at.is_some());
        assert_eq!(loaded.session.terminal_error.as_deref(), Some("recovery budget exhausted"));
    }

    #[tokio::test]
    async fn list_sessions_orders_most_recent_first_and_paginates() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let first = store.create_session("a", None, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_session("b", None, None).await.unwrap();

        let page = store.list_sessions(1, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second);

        let rest = store.list_sessions(10, 1).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, first);
    }

    #[tokio::test]
    async fn delete_session_removes_directory_and_future_loads_fail() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = store.create_session("goal", None, None).await.unwrap();
        store.delete_session(id).await.unwrap();
        assert!(matches!(store.load_session(id).await, Err(SessionStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn load_missing_session_returns_not_found() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let bogus = AutomationSessionId::new();
        assert!(matches!(store.load_session(bogus).await, Err(SessionStoreError::NotFound(_))));
    }
}
