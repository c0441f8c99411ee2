//! Captures a user's browser interactions into a `RecordingSession`.
//!
//! Event delivery is push-based: the host (root binary crate) decodes raw CDP
//! console messages and frame-navigation events and forwards them here via
//! `handle_console_message`/`handle_frame_navigated` rather than the recorder
//! subscribing to a BCS event stream itself — `cdp-adapter`'s event enum has
//! no console-message variant, and the real event stream is naturally driven
//! from outside whichever crate doesn't own the debugger connection.

pub mod ops;
pub mod script;
mod target;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use automation_types::{
    ActionEffects, ActionKind, ActionValue, BoundingBox, RecordedAction, RecordingSession,
    RecordingSessionId, RecordingTab, TabId, TabSwitchMetadata,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

pub use ops::{RecorderOps, RecorderOpsError};
pub use script::{build_drain_queue_script, build_observer_script, ObserverScriptParams, ACTION_SENTINEL};

const NOISE_URL_PREFIXES: &[&str] = &["data:", "about:", "chrome:", "chrome-extension:", "blob:"];
const NOISE_URL_SUBSTRINGS: &[&str] = &[
    "/log?",
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
    "segment.io",
];

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Ops(#[from] RecorderOpsError),
    #[error("could not parse observer payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no pending file dialog for correlation id {0}")]
    UnknownFileDialog(Uuid),
}

#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub max_actions: usize,
    pub file_dialog_timeout: Duration,
    pub snapshot_dir: PathBuf,
}

impl RecorderConfig {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_actions: 1_000,
            file_dialog_timeout: Duration::from_secs(30),
            snapshot_dir: snapshot_dir.into(),
        }
    }
}

/// Events broadcast as the recording progresses. Consumers (a UI, the CLI)
/// subscribe via `Recorder::subscribe`; a slow or absent subscriber never
/// blocks recording since `broadcast` drops oldest-first under backpressure.
#[derive(Clone, Debug)]
pub enum RecordingEvent {
    ActionCaptured { action: RecordedAction },
    MaxActionsReached,
    Stopped { session: RecordingSession },
}

#[derive(Debug, Deserialize)]
struct RawBoundingBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl From<RawBoundingBox> for BoundingBox {
    fn from(raw: RawBoundingBox) -> Self {
        BoundingBox { x: raw.x, y: raw.y, width: raw.width, height: raw.height }
    }
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    tag: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "boundingBox")]
    bounding_box: RawBoundingBox,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSelectValue {
    Single(String),
    Multiple(Vec<String>),
}

impl From<RawSelectValue> for ActionValue {
    fn from(raw: RawSelectValue) -> Self {
        match raw {
            RawSelectValue::Single(value) => ActionValue::Scalar(value),
            RawSelectValue::Multiple(values) => ActionValue::List(values),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum ObserverEvent {
    Click { target: RawTarget, #[allow(dead_code)] x: f64, #[allow(dead_code)] y: f64 },
    Input { target: RawTarget, value: Option<String> },
    Select { target: RawTarget, value: RawSelectValue },
    Checkbox { target: RawTarget, value: bool },
    Radio { target: RawTarget, value: bool },
    Submit { target: RawTarget },
    Keypress { target: RawTarget, key: String, #[serde(default)] modifiers: Vec<String> },
    FileDialogSentinel { target: RawTarget, #[allow(dead_code)] sentinel: String },
}

struct PendingFileDialog {
    tab_id: TabId,
    requested_at: Instant,
}

struct RecorderState {
    session_id: RecordingSessionId,
    display_name: String,
    start_url: String,
    actions: Vec<RecordedAction>,
    tabs: HashMap<TabId, RecordingTab>,
    current_tab: TabId,
    max_actions_reached: bool,
    pending_file_dialogs: HashMap<Uuid, PendingFileDialog>,
}

impl RecorderState {
    fn touch_tab(&mut self, tab_id: TabId) {
        let now = Utc::now();
        self.tabs
            .entry(tab_id)
            .and_modify(|t| {
                t.last_active_at = now;
                t.action_count += 1;
            })
            .or_insert_with(|| RecordingTab {
                tab_id,
                first_active_at: now,
                last_active_at: now,
                action_count: 1,
            });
    }

    fn expire_stale_file_dialogs(&mut self, timeout: Duration) {
        self.pending_file_dialogs.retain(|_, pending| pending.requested_at.elapsed() < timeout);
    }
}

pub struct Recorder {
    config: RecorderConfig,
    observer_script: String,
    started_at: Instant,
    state: Mutex<RecorderState>,
    events_tx: broadcast::Sender<RecordingEvent>,
}

impl Recorder {
    /// Starts a new recording. Returns the recorder (wrapped in `Arc` so
    /// per-action snapshot capture can be spawned as a background task) and a
    /// receiver for its event stream.
    pub fn start(
        config: RecorderConfig,
        display_name: impl Into<String>,
        start_url: impl Into<String>,
        initial_tab: TabId,
    ) -> (Arc<Self>, broadcast::Receiver<RecordingEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let observer_script = build_observer_script(&ObserverScriptParams::default());

        let mut state = RecorderState {
            session_id: RecordingSessionId::new(),
            display_name: display_name.into(),
            start_url: start_url.into(),
            actions: Vec::new(),
            tabs: HashMap::new(),
            current_tab: initial_tab,
            max_actions_reached: false,
            pending_file_dialogs: HashMap::new(),
        };
        state.touch_tab(initial_tab);

        let recorder = Arc::new(Self {
            config,
            observer_script,
            started_at: Instant::now(),
            state: Mutex::new(state),
            events_tx: tx,
        });
        (recorder, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events_tx.subscribe()
    }

    /// Installs the observer script into a freshly-connected tab. Idempotent
    /// on a document that already has it (gated by its own window sentinel).
    pub async fn inject(&self, ops: &dyn RecorderOps) -> Result<(), RecorderError> {
        ops.inject_bootstrap_script(&self.observer_script).await?;
        Ok(())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Decodes a console message and, if it carries one of the recorder's
    /// sentinel prefixes, turns it into a captured action. Messages without
    /// the prefix are ignored (they belong to the page, not the observer).
    pub async fn handle_console_message(
        self: &Arc<Self>,
        ops: Arc<dyn RecorderOps>,
        tab_id: TabId,
        tab_url: &str,
        tab_title: &str,
        raw_text: &str,
    ) -> Result<(), RecorderError> {
        let Some(payload) = raw_text.strip_prefix(ACTION_SENTINEL) else {
            return Ok(());
        };
        let event: ObserverEvent = serde_json::from_str(payload)?;

        if let ObserverEvent::FileDialogSentinel { .. } = &event {
            self.begin_file_dialog(tab_id);
            return Ok(());
        }

        let now_ms = self.elapsed_ms();
        let mut state = self.state.lock();
        if state.max_actions_reached {
            return Ok(());
        }

        let seq = state.actions.len();
        let mut action = build_action(event, now_ms);
        action.tab_id = Some(tab_id);
        action.tab_url = Some(tab_url.to_string());
        action.tab_title = Some(tab_title.to_string());

        state.actions.push(action.clone());
        state.touch_tab(tab_id);
        let reached_max = state.actions.len() >= self.config.max_actions;
        if reached_max {
            state.max_actions_reached = true;
        }
        drop(state);

        let _ = self.events_tx.send(RecordingEvent::ActionCaptured { action });
        if reached_max {
            warn!(max_actions = self.config.max_actions, "recording hit MAX_ACTIONS, capture stopped");
            let _ = self.events_tx.send(RecordingEvent::MaxActionsReached);
        } else {
            self.spawn_snapshot_capture(ops, seq as u64);
        }
        Ok(())
    }

    /// Infers a `navigate` action from a top-frame navigation, filtering
    /// noise (data/about URLs, analytics beacons).
    pub fn handle_frame_navigated(self: &Arc<Self>, tab_id: TabId, url: String, title: String) {
        if is_noise_navigation(&url) {
            debug!(url = %url, "ignoring noise navigation for recording");
            return;
        }

        let now_ms = self.elapsed_ms();
        let mut state = self.state.lock();
        if state.max_actions_reached {
            return;
        }

        let mut action = RecordedAction::new(ActionKind::Navigate, now_ms);
        action.tab_id = Some(tab_id);
        action.tab_url = Some(url.clone());
        action.tab_title = Some(title);
        action.effects = Some(ActionEffects { summary: None, resulting_url: Some(url) });

        state.actions.push(action.clone());
        state.touch_tab(tab_id);
        drop(state);

        let _ = self.events_tx.send(RecordingEvent::ActionCaptured { action });
    }

    /// Re-attaches recording to a new tab: re-injects the observer script and
    /// records a synthetic `tab-switch` action.
    pub async fn switch_tab(self: &Arc<Self>, ops: &dyn RecorderOps, new_tab: TabId) -> Result<(), RecorderError> {
        ops.inject_bootstrap_script(&self.observer_script).await?;

        let now_ms = self.elapsed_ms();
        let mut state = self.state.lock();
        let from_tab = state.current_tab;
        state.current_tab = new_tab;
        if state.max_actions_reached {
            return Ok(());
        }

        let mut action = RecordedAction::new(ActionKind::TabSwitch, now_ms);
        action.tab_id = Some(new_tab);
        action.tab_switch = Some(TabSwitchMetadata { from_tab, to_tab: new_tab });

        state.actions.push(action.clone());
        state.touch_tab(new_tab);
        drop(state);

        let _ = self.events_tx.send(RecordingEvent::ActionCaptured { action });
        Ok(())
    }

    fn begin_file_dialog(&self, tab_id: TabId) -> Uuid {
        let correlation_id = Uuid::new_v4();
        let mut state = self.state.lock();
        state.expire_stale_file_dialogs(self.config.file_dialog_timeout);
        state.pending_file_dialogs.insert(correlation_id, PendingFileDialog { tab_id, requested_at: Instant::now() });
        correlation_id
    }

    /// Completes a file-upload correlation once the host drives the native
    /// file dialog and learns what was selected. Abandons (errors) if the
    /// correlation has expired past the 30 s window or was never opened.
    pub fn complete_file_upload(self: &Arc<Self>, correlation_id: Uuid, filenames: Vec<String>) -> Result<(), RecorderError> {
        let now_ms = self.elapsed_ms();
        let mut state = self.state.lock();
        state.expire_stale_file_dialogs(self.config.file_dialog_timeout);
        let pending = state
            .pending_file_dialogs
            .remove(&correlation_id)
            .ok_or(RecorderError::UnknownFileDialog(correlation_id))?;

        if state.max_actions_reached {
            return Ok(());
        }

        let mut action = RecordedAction::new(ActionKind::FileUpload, now_ms);
        action.tab_id = Some(pending.tab_id);
        action.value = Some(ActionValue::List(filenames));

        state.actions.push(action.clone());
        state.touch_tab(pending.tab_id);
        drop(state);

        let _ = self.events_tx.send(RecordingEvent::ActionCaptured { action });
        Ok(())
    }

    fn spawn_snapshot_capture(self: &Arc<Self>, ops: Arc<dyn RecorderOps>, seq: u64) {
        let recorder = Arc::clone(self);
        let snapshot_dir = recorder.config.snapshot_dir.clone();
        tokio::spawn(async move {
            let bytes = match ops.capture_screenshot().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(error = %err, "post-action snapshot capture failed, ignoring");
                    return;
                }
            };
            if let Err(err) = tokio::fs::create_dir_all(&snapshot_dir).await {
                warn!(error = %err, "could not create snapshot directory");
                return;
            }
            let path = snapshot_dir.join(format!("{seq}.jpg"));
            if let Err(err) = tokio::fs::write(&path, &bytes).await {
                warn!(error = %err, path = %path.display(), "could not persist snapshot");
                return;
            }
            recorder.attach_snapshot_path(seq, path);
        });
    }

    fn attach_snapshot_path(&self, seq: u64, path: PathBuf) {
        let mut state = self.state.lock();
        if let Some(action) = state.actions.get_mut(seq as usize) {
            action.snapshot_path = Some(path);
        }
    }

    /// Freezes the recording into a `RecordingSession`. The recorder may be
    /// discarded afterward; a new one is created for the next recording.
    pub fn stop(&self) -> RecordingSession {
        let duration_ms = self.elapsed_ms();
        let state = self.state.lock();
        let mut tabs: Vec<RecordingTab> = state.tabs.values().cloned().collect();
        tabs.sort_by_key(|t| t.first_active_at);

        let session = RecordingSession {
            id: state.session_id,
            display_name: state.display_name.clone(),
            start_url: state.start_url.clone(),
            duration_ms,
            actions: state.actions.clone(),
            tabs,
            video_path: None,
            snapshot_dir: self.config.snapshot_dir.clone(),
        };
        drop(state);

        let _ = self.events_tx.send(RecordingEvent::Stopped { session: session.clone() });
        session
    }
}

fn is_noise_navigation(url: &str) -> bool {
    NOISE_URL_PREFIXES.iter().any(|p| url.starts_with(p)) || NOISE_URL_SUBSTRINGS.iter().any(|s| url.contains(s))
}

fn build_action(event: ObserverEvent, timestamp_ms: u64) -> RecordedAction {
    match event {
        ObserverEvent::Click { target, .. } => {
            let mut action = RecordedAction::new(ActionKind::Click, timestamp_ms);
            action.target = Some(to_element_target(target));
            action
        }
        ObserverEvent::Input { target, value } => {
            let mut action = RecordedAction::new(ActionKind::Input, timestamp_ms);
            action.target = Some(to_element_target(target));
            action.value = value.map(ActionValue::Scalar);
            action
        }
        ObserverEvent::Select { target, value } => {
            let mut action = RecordedAction::new(ActionKind::Select, timestamp_ms);
            action.target = Some(to_element_target(target));
            action.value = Some(value.into());
            action
        }
        ObserverEvent::Checkbox { target, value } => {
            let mut action = RecordedAction::new(ActionKind::Checkbox, timestamp_ms);
            action.target = Some(to_element_target(target));
            action.value = Some(ActionValue::Scalar(value.to_string()));
            action
        }
        ObserverEvent::Radio { target, value } => {
            let mut action = RecordedAction::new(ActionKind::Radio, timestamp_ms);
            action.target = Some(to_element_target(target));
            action.value = Some(ActionValue::Scalar(value.to_string()));
            action
        }
        ObserverEvent::Submit { target } => {
            let mut action = RecordedAction::new(ActionKind::Submit, timestamp_ms);
            action.target = Some(to_element_target(target));
            action
        }
        ObserverEvent::Keypress { target, key, modifiers } => {
            let mut action = RecordedAction::new(ActionKind::Keypress, timestamp_ms);
            action.target = Some(to_element_target(target));
            let mut value = key;
            if !modifiers.is_empty() {
                value = format!("{}+{value}", modifiers.join("+"));
            }
            action.value = Some(ActionValue::Scalar(value));
            action
        }
        ObserverEvent::FileDialogSentinel { .. } => {
            unreachable!("file-dialog sentinel is handled before build_action is called")
        }
    }
}

fn to_element_target(raw: RawTarget) -> automation_types::ElementTarget {
    target::build_element_target(&raw.tag, raw.attributes, &raw.text, Some(raw.bounding_box.into()), raw.disabled)
}
