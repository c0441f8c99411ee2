//! Shared data model for the automation engine.
//!
//! Every other crate in the workspace (selectors, extractor, recorder, executor,
//! plan parser, session store, message builder, compression, orchestrator) builds
//! on these entities rather than defining its own copies.

pub mod element;
pub mod ids;
pub mod message;
pub mod page_context;
pub mod plan;
pub mod recording;
pub mod session;
pub mod tool_result;

pub use element::{BackupSelector, BoundingBox, ElementTarget};
pub use ids::{AutomationSessionId, RecordingSessionId, StepId, TabId};
pub use message::{ContentBlock, Message, Role};
pub use page_context::{Form, FormField, InteractiveElement, PageContext, Stats, Viewport};
pub use plan::{ExecutedStep, Plan, PlanKind, PlanStep};
pub use recording::{
    ActionEffects, ActionKind, ActionValue, RecordedAction, RecordingSession, RecordingTab,
    TabSwitchMetadata,
};
pub use session::{AutomationSession, SessionStatus, SessionSummary, UsageStats};
pub use tool_result::{ToolError, ToolResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_session_ordering_detects_violation() {
        let mut session = RecordingSession {
            id: RecordingSessionId::new(),
            display_name: "test".into(),
            start_url: "https://example.com".into(),
            duration_ms: 0,
            actions: vec![
                RecordedAction::new(ActionKind::Navigate, 100),
                RecordedAction::new(ActionKind::Click, 50),
            ],
            tabs: Vec::new(),
            video_path: None,
            snapshot_dir: "/tmp/snapshots".into(),
        };
        assert!(!session.is_ordering_valid());
        session.actions[1].timestamp_ms = 150;
        assert!(session.is_ordering_valid());
    }

    #[test]
    fn element_target_orders_backups_by_score() {
        let target = ElementTarget::new("button", "#submit")
            .with_backup(".btn-primary", "class", 60)
            .with_backup("[data-testid=\"submit\"]", "data-testid", 90);
        assert_eq!(target.backup_selectors[0].score, 90);
        assert_eq!(target.all_selectors(), vec!["#submit", "[data-testid=\"submit\"]", ".btn-primary"]);
    }

    #[test]
    fn tool_use_and_tool_result_ids_round_trip() {
        let msg = Message::assistant(vec![ContentBlock::tool_use("tu_1", "click", serde_json::json!({}))]);
        assert_eq!(msg.tool_use_ids().collect::<Vec<_>>(), vec!["tu_1"]);

        let reply = Message::user(vec![ContentBlock::tool_result("tu_1", serde_json::json!({"success": true}), false)]);
        assert_eq!(reply.tool_result_ids().collect::<Vec<_>>(), vec!["tu_1"]);
    }
}
