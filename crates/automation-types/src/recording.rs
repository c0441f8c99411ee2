use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::ElementTarget;
use crate::ids::{RecordingSessionId, TabId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Navigate,
    Click,
    Input,
    Checkbox,
    Radio,
    Select,
    Submit,
    Keypress,
    FileUpload,
    TabSwitch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionValue {
    Scalar(String),
    List(Vec<String>),
}

/// Post-action observation recorded alongside an action (e.g. resulting URL).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionEffects {
    pub summary: Option<String>,
    pub resulting_url: Option<String>,
}

/// Metadata attached to a synthetic `tab-switch` action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabSwitchMetadata {
    pub from_tab: TabId,
    pub to_tab: TabId,
}

/// One user-observable event captured during recording.
///
/// Invariant: within a `RecordingSession`, `timestamp_ms` is strictly non-decreasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub kind: ActionKind,
    pub timestamp_ms: u64,
    pub target: Option<ElementTarget>,
    pub value: Option<ActionValue>,
    pub tab_id: Option<TabId>,
    pub tab_url: Option<String>,
    pub tab_title: Option<String>,
    pub effects: Option<ActionEffects>,
    pub snapshot_path: Option<PathBuf>,
    pub tab_switch: Option<TabSwitchMetadata>,
}

impl RecordedAction {
    pub fn new(kind: ActionKind, timestamp_ms: u64) -> Self {
        Self {
            kind,
            timestamp_ms,
            target: None,
            value: None,
            tab_id: None,
            tab_url: None,
            tab_title: None,
            effects: None,
            snapshot_path: None,
            tab_switch: None,
        }
    }
}

/// Per-tab participation statistics maintained by the recorder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingTab {
    pub tab_id: TabId,
    pub first_active_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub action_count: u64,
}

/// Immutable once saved. Created on "start recording", frozen on "save", never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: RecordingSessionId,
    pub display_name: String,
    pub start_url: String,
    pub duration_ms: u64,
    pub actions: Vec<RecordedAction>,
    pub tabs: Vec<RecordingTab>,
    pub video_path: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
}

impl RecordingSession {
    /// `true` iff `actions` is sorted by non-decreasing `timestamp_ms` (the ordering invariant).
    pub fn is_ordering_valid(&self) -> bool {
        self.actions
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms)
    }
}
