//! Two-layer optimizer over the conversation message list.
//!
//! Layer A is structural and lossless-to-model: it never removes information the
//! planner has not already consumed. Layer B is a sliding-window + summarization
//! fallback applied only when the token estimate exceeds a configured budget.

use automation_types::{ContentBlock, Message, Role};
use message_builder::NOT_EXECUTED_MARKER;

pub const STALE_ERROR_MARKER: &str = "AUTOMATION ERROR ENCOUNTERED";
pub const ANALYSIS_COMPRESSED_PLACEHOLDER: &str = "Analysis completed successfully — full result already consumed";
const ANALYSIS_TOOLS: &[&str] = &["extract_context", "take_snapshot"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerAReport {
    pub unexecuted_pairs_removed: usize,
    pub analysis_results_compressed: usize,
    pub stale_errors_compressed: usize,
}

impl LayerAReport {
    pub fn is_noop(&self) -> bool {
        self.unexecuted_pairs_removed == 0 && self.analysis_results_compressed == 0 && self.stale_errors_compressed == 0
    }
}

/// Runs Layer A's three passes, in order, mutating `messages` in place.
///
/// Idempotent: a second call on the already-compressed list returns a report
/// with every field zero.
pub fn compress_structural(messages: &mut Vec<Message>) -> LayerAReport {
    let unexecuted_pairs_removed = remove_unexecuted_pairs(messages);
    let analysis_results_compressed = compress_analysis_results(messages);
    let stale_errors_compressed = compress_stale_errors(messages);

    LayerAReport {
        unexecuted_pairs_removed,
        analysis_results_compressed,
        stale_errors_compressed,
    }
}

/// Pass 1. Finds every `tool_result` bearing the "Not executed" marker, collects its
/// `tool_use_id`, then removes both the `tool_use` and the `tool_result` block for
/// each id. The tool-result pairing invariant still holds because both sides go
/// together.
fn remove_unexecuted_pairs(messages: &mut Vec<Message>) -> usize {
    let mut unexecuted_ids = Vec::new();
    for message in messages.iter() {
        for block in &message.content {
            if let ContentBlock::ToolResult { tool_use_id, content, is_error } = block {
                if *is_error && content.as_str() == Some(NOT_EXECUTED_MARKER) {
                    unexecuted_ids.push(tool_use_id.clone());
                }
            }
        }
    }

    if unexecuted_ids.is_empty() {
        return 0;
    }

    for message in messages.iter_mut() {
        message.content.retain(|block| match block {
            ContentBlock::ToolUse { id, .. } => !unexecuted_ids.contains(id),
            ContentBlock::ToolResult { tool_use_id, .. } => !unexecuted_ids.contains(tool_use_id),
            ContentBlock::Text { .. } => true,
        });
    }
    messages.retain(|message| !message.content.is_empty());

    unexecuted_ids.len()
}

/// Pass 2. Compresses every `tool_result` whose paired `tool_use` names an analysis
/// tool (`extract_context`, `take_snapshot`) to a constant short string. The pairing
/// is resolved via the `tool_use_id`, not by sniffing the payload shape, since the
/// typed message model already guarantees an exact `tool_use`/`tool_result` match.
fn compress_analysis_results(messages: &mut Vec<Message>) -> usize {
    use std::collections::HashMap;

    let mut analysis_tool_use_ids: HashMap<String, ()> = HashMap::new();
    for message in messages.iter() {
        for block in &message.content {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                if ANALYSIS_TOOLS.contains(&name.as_str()) {
                    analysis_tool_use_ids.insert(id.clone(), ());
                }
            }
        }
    }

    let mut compressed = 0;
    for message in messages.iter_mut() {
        for block in &mut message.content {
            if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
                if analysis_tool_use_ids.contains_key(tool_use_id) {
                    let already_compressed = content.as_str() == Some(ANALYSIS_COMPRESSED_PLACEHOLDER);
                    if !already_compressed {
                        *content = serde_json::Value::String(ANALYSIS_COMPRESSED_PLACEHOLDER.to_string());
                        compressed += 1;
                    }
                }
            }
        }
    }
    compressed
}

/// Pass 3. Replaces every stale-error text block with a placeholder, keeping only
/// the most recent occurrence verbatim.
fn compress_stale_errors(messages: &mut Vec<Message>) -> usize {
    let mut locations = Vec::new();
    for (msg_idx, message) in messages.iter().enumerate() {
        for (block_idx, block) in message.content.iter().enumerate() {
            if let ContentBlock::Text { text } = block {
                if text.contains(STALE_ERROR_MARKER) {
                    locations.push((msg_idx, block_idx));
                }
            }
        }
    }

    if locations.len() <= 1 {
        return 0;
    }

    let (keep_msg, keep_block) = *locations.last().unwrap();
    let mut compressed = 0;
    for (msg_idx, block_idx) in &locations[..locations.len() - 1] {
        if (*msg_idx, *block_idx) == (keep_msg, keep_block) {
            continue;
        }
        if let ContentBlock::Text { text } = &mut messages[*msg_idx].content[*block_idx] {
            *text = "[earlier automation error compressed]".to_string();
            compressed += 1;
        }
    }
    compressed
}

/// Rough token estimate used for the sliding-window budget check.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| serde_json::to_vec(m).map(|bytes| bytes.len() / 4).unwrap_or(0))
        .sum()
}

#[derive(Clone, Debug)]
pub struct LayerBConfig {
    pub context_target_tokens: usize,
    pub recent_turns_to_keep: usize,
}

impl Default for LayerBConfig {
    fn default() -> Self {
        Self {
            context_target_tokens: 140_000,
            recent_turns_to_keep: 10,
        }
    }
}

/// Layer B: if the message list exceeds the token budget, summarize all but the
/// most recent `recent_turns_to_keep` turns. A "turn" is a consecutive pair of
/// messages (user + assistant); a dangling trailing single message is never split
/// off on its own, so a half-turn is never summarized. Returns `true` if the list
/// was modified.
pub fn compress_sliding_window(messages: &mut Vec<Message>, user_goal: &str, config: &LayerBConfig) -> bool {
    if estimate_tokens(messages) <= config.context_target_tokens {
        return false;
    }

    let turns: Vec<Vec<Message>> = messages.chunks(2).map(|c| c.to_vec()).collect();
    if turns.len() <= config.recent_turns_to_keep {
        return false;
    }

    let split_at = turns.len() - config.recent_turns_to_keep;
    let (older, recent) = turns.split_at(split_at);

    let summary_message = build_summary_message(user_goal, older);

    let mut new_messages = vec![summary_message];
    for turn in recent {
        new_messages.extend(turn.iter().cloned());
    }
    *messages = new_messages;
    true
}

fn build_summary_message(user_goal: &str, older_turns: &[Vec<Message>]) -> Message {
    let mut attempted = 0usize;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut success_tool_names: Vec<String> = Vec::new();
    let mut error_strings: Vec<String> = Vec::new();

    for turn in older_turns {
        for message in turn {
            for block in &message.content {
                if let ContentBlock::ToolResult { content, is_error, .. } = block {
                    attempted += 1;
                    if *is_error {
                        failed += 1;
                        if error_strings.len() < 5 {
                            error_strings.push(content.to_string());
                        }
                    } else {
                        succeeded += 1;
                    }
                }
                if let ContentBlock::ToolUse { name, .. } = block {
                    if success_tool_names.len() < 20 {
                        success_tool_names.push(name.clone());
                    }
                }
            }
        }
    }

    let text = format!(
        "EXECUTION HISTORY SUMMARY\nUser goal: {user_goal}\nAttempted: {attempted}, Succeeded: {succeeded}, Failed: {failed}\nTool calls: {}\nErrors: {}",
        success_tool_names.join(", "),
        error_strings.join(" | "),
    );

    Message::text(Role::User, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_use_then_result(id: &str, name: &str, result_content: serde_json::Value, is_error: bool) -> (Message, Message) {
        (
            Message::assistant(vec![ContentBlock::tool_use(id, name, json!({}))]),
            Message::user(vec![ContentBlock::tool_result(id, result_content, is_error)]),
        )
    }

    #[test]
    fn removes_unexecuted_pair_and_leaves_others_intact() {
        let (au, ur) = tool_use_then_result("tu_1", "navigate", json!({"success": true}), false);
        let (au2, ur2) = tool_use_then_result("tu_2", "click", json!(NOT_EXECUTED_MARKER), true);
        let mut messages = vec![au, ur, au2, ur2];

        let report = compress_structural(&mut messages);
        assert_eq!(report.unexecuted_pairs_removed, 1);
        let remaining_ids: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert!(!remaining_ids.contains(&"tu_2"));
        assert!(remaining_ids.contains(&"tu_1"));
    }

    #[test]
    fn compresses_analysis_result_via_matched_tool_use_name() {
        let (au, ur) = tool_use_then_result("tu_1", "extract_context", json!({"url": "https://x", "elements": []}), false);
        let mut messages = vec![au, ur];
        let report = compress_structural(&mut messages);
        assert_eq!(report.analysis_results_compressed, 1);
        match &messages[1].content[0] {
            ContentBlock::ToolResult { content, .. } => {
                assert_eq!(content.as_str(), Some(ANALYSIS_COMPRESSED_PLACEHOLDER));
            }
            _ => panic!("expected tool result"),
        }
    }

    #[test]
    fn second_application_is_idempotent() {
        let (au, ur) = tool_use_then_result("tu_1", "take_snapshot", json!({"data": "base64"}), false);
        let mut messages = vec![au, ur];
        compress_structural(&mut messages);
        let second = compress_structural(&mut messages);
        assert!(second.is_noop());
    }

    #[test]
    fn zero_analysis_results_means_unchanged_and_zero_compressed() {
        let (au, ur) = tool_use_then_result("tu_1", "navigate", json!({"success": true}), false);
        let mut messages = vec![au.clone(), ur.clone()];
        let before = messages.clone();
        let report = compress_structural(&mut messages);
        assert_eq!(report.analysis_results_compressed, 0);
        assert_eq!(messages, before);
    }

    #[test]
    fn stale_error_compression_keeps_only_most_recent() {
        let m1 = Message::user(vec![ContentBlock::text(format!("{STALE_ERROR_MARKER}: first failure"))]);
        let m2 = Message::user(vec![ContentBlock::text(format!("{STALE_ERROR_MARKER}: second failure"))]);
        let mut messages = vec![m1, m2];
        let report = compress_structural(&mut messages);
        assert_eq!(report.stale_errors_compressed, 1);
        assert!(messages[0].content[0].as_text().unwrap().contains("compressed"));
        assert!(messages[1].content[0].as_text().unwrap().contains("second failure"));
    }

    #[test]
    fn sliding_window_noop_when_under_budget() {
        let mut messages = vec![Message::text(Role::User, "hi")];
        let changed = compress_sliding_window(&mut messages, "goal", &LayerBConfig { context_target_tokens: 1_000_000, recent_turns_to_keep: 10 });
        assert!(!changed);
    }

    #[test]
    fn sliding_window_summarizes_older_turns_only() {
        let mut messages = Vec::new();
        for i in 0..20 {
            messages.push(Message::assistant(vec![ContentBlock::tool_use(format!("tu_{i}"), "navigate", json!({}))]));
            messages.push(Message::user(vec![ContentBlock::tool_result(format!("tu_{i}"), json!({"success": true}), false)]));
        }
        let config = LayerBConfig {
            context_target_tokens: 1,
            recent_turns_to_keep: 3,
        };
        let changed = compress_sliding_window(&mut messages, "goal", &config);
        assert!(changed);
        assert!(matches!(messages[0].content[0], ContentBlock::Text { .. }));
        // 1 summary message + 3 kept turns * 2 messages each
        assert_eq!(messages.len(), 1 + 3 * 2);
    }

    #[test]
    fn sliding_window_does_nothing_when_fewer_than_n_turns() {
        let mut messages = Vec::new();
        for i in 0..4 {
            messages.push(Message::assistant(vec![ContentBlock::tool_use(format!("tu_{i}"), "navigate", json!({}))]));
            messages.push(Message::user(vec![ContentBlock::tool_result(format!("tu_{i}"), json!({"success": true}), false)]));
        }
        let config = LayerBConfig {
            context_target_tokens: 1,
            recent_turns_to_keep: 10,
        };
        let changed = compress_sliding_window(&mut messages, "goal", &config);
        assert!(!changed);
    }
}
