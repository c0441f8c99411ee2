//! Typed builder for the in-page observer script injected by the recorder.
//! Parameters are interpolated as a single JSON config object, matching the
//! script-builder convention used throughout the workspace.

use serde_json::json;

pub const ACTION_SENTINEL: &str = "__AUTOPILOT_ACTION__";
pub const FILE_DIALOG_SENTINEL: &str = "__AUTOPILOT_FILE_DIALOG__";
const WINDOW_SENTINEL: &str = "__autopilotObserverInstalled__";
/// Name of the in-page array the caller drains by polling, for transports
/// (like the CDP bridge's event bus) that don't surface `Runtime.consoleAPICalled`.
pub const EVENT_QUEUE_GLOBAL: &str = "__autopilotEventQueue";

/// Script that atomically reads and clears the in-page event queue. Evaluates
/// to a JSON array of sentinel-prefixed strings, each suitable for passing
/// straight to `Recorder::handle_console_message`.
pub fn build_drain_queue_script() -> String {
    format!(
        "(() => {{ const q = window.{queue} || []; window.{queue} = []; return q; }})()",
        queue = EVENT_QUEUE_GLOBAL
    )
}

#[derive(Clone, Debug)]
pub struct ObserverScriptParams {
    pub input_debounce_ms: u64,
    pub max_traversal_depth: u32,
    pub max_contenteditable_depth: u32,
}

impl Default for ObserverScriptParams {
    fn default() -> Self {
        Self {
            input_debounce_ms: 3_000,
            max_traversal_depth: 5,
            max_contenteditable_depth: 3,
        }
    }
}

/// Builds the observer script. Gated by `WINDOW_SENTINEL` so repeated
/// injection (e.g. on `switch_tab`) is idempotent on a document that already
/// has the hooks installed.
pub fn build_observer_script(params: &ObserverScriptParams) -> String {
    let config = json!({
        "actionSentinel": ACTION_SENTINEL,
        "fileDialogSentinel": FILE_DIALOG_SENTINEL,
        "inputDebounceMs": params.input_debounce_ms,
        "maxTraversalDepth": params.max_traversal_depth,
        "maxContentEditableDepth": params.max_contenteditable_depth,
        "immediateValueTags": ["checkbox", "radio", "file", "range", "color"],
        "recordedKeydownKeys": ["Enter", "Escape", "Tab", "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight", "Home", "End", "PageUp", "PageDown"],
    });

    format!(
        r#"(() => {{
    if (window.{sentinel}) return;
    window.{sentinel} = true;
    const cfg = {config};
    window.{queue} = window.{queue} || [];
    const emit = (action) => {{
        const line = cfg.actionSentinel + JSON.stringify(action);
        console.log(line);
        window.{queue}.push(line);
    }};

    const describeTarget = (el) => {{
        const rect = el.getBoundingClientRect();
        const attrs = {{}};
        for (const a of el.attributes) attrs[a.name] = a.value;
        return {{
            tag: el.tagName.toLowerCase(),
            text: (el.textContent || '').trim().slice(0, 200),
            boundingBox: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }},
            disabled: !!el.disabled,
            attributes: attrs,
        }};
    }};

    const nearestInteractive = (el) => {{
        let cur = el;
        let depth = 0;
        while (cur && depth <= cfg.maxTraversalDepth) {{
            const tag = cur.tagName ? cur.tagName.toLowerCase() : '';
            if (['button', 'a', 'input', 'textarea', 'select'].includes(tag)) return cur;
            const role = cur.getAttribute && cur.getAttribute('role');
            if (role === 'button' || role === 'link') return cur;
            cur = cur.parentElement;
            depth += 1;
        }}
        return el;
    }};

    const isContentEditableDescendant = (el) => {{
        let cur = el;
        let depth = 0;
        while (cur && depth <= cfg.maxContentEditableDepth) {{
            if (cur.isContentEditable) return cur;
            cur = cur.parentElement;
            depth += 1;
        }}
        return null;
    }};

    document.addEventListener('click', (ev) => {{
        const target = nearestInteractive(ev.target);
        const tag = target.tagName ? target.tagName.toLowerCase() : '';
        if (tag === 'input' && target.type === 'file') {{
            ev.preventDefault();
            emit({{ kind: 'file-dialog-sentinel', sentinel: cfg.fileDialogSentinel, target: describeTarget(target) }});
            return;
        }}
        emit({{ kind: 'click', target: describeTarget(target), x: ev.clientX, y: ev.clientY }});
    }}, true);

    const debounceTimers = new WeakMap();
    const flushInput = (el) => {{
        emit({{ kind: 'input', target: describeTarget(el), value: el.value !== undefined ? el.value : el.textContent }});
    }};

    document.addEventListener('input', (ev) => {{
        const el = ev.target;
        const tag = el.tagName ? el.tagName.toLowerCase() : '';
        const type = (el.type || '').toLowerCase();
        const editableAncestor = isContentEditableDescendant(el);
        if (cfg.immediateValueTags.includes(type)) {{
            flushInput(el);
            return;
        }}
        const key = editableAncestor || el;
        const existing = debounceTimers.get(key);
        if (existing) clearTimeout(existing);
        const timer = setTimeout(() => {{ debounceTimers.delete(key); flushInput(key); }}, cfg.inputDebounceMs);
        debounceTimers.set(key, timer);
    }}, true);

    document.addEventListener('blur', (ev) => {{
        const el = ev.target;
        const editableAncestor = isContentEditableDescendant(el);
        const key = editableAncestor || el;
        const timer = debounceTimers.get(key);
        if (timer) {{ clearTimeout(timer); debounceTimers.delete(key); flushInput(key); }}
    }}, true);

    document.addEventListener('change', (ev) => {{
        const el = ev.target;
        const tag = el.tagName ? el.tagName.toLowerCase() : '';
        if (tag === 'select') {{
            const value = el.multiple ? Array.from(el.selectedOptions).map(o => o.value) : el.value;
            emit({{ kind: 'select', target: describeTarget(el), value }});
        }} else if (tag === 'input' && (el.type === 'checkbox')) {{
            emit({{ kind: 'checkbox', target: describeTarget(el), value: el.checked }});
        }} else if (tag === 'input' && el.type === 'radio') {{
            emit({{ kind: 'radio', target: describeTarget(el), value: el.checked }});
        }}
    }}, true);

    document.addEventListener('submit', (ev) => {{
        emit({{ kind: 'submit', target: describeTarget(ev.target) }});
    }}, true);

    document.addEventListener('keydown', (ev) => {{
        const combined = ev.ctrlKey || ev.metaKey || ev.altKey;
        if (!combined && !cfg.recordedKeydownKeys.includes(ev.key)) return;
        emit({{
            kind: 'keypress',
            target: describeTarget(ev.target),
            key: ev.key,
            modifiers: [ev.ctrlKey && 'Control', ev.metaKey && 'Meta', ev.altKey && 'Alt', ev.shiftKey && 'Shift'].filter(Boolean),
        }});
    }}, true);
}})()"#,
        sentinel = WINDOW_SENTINEL,
        queue = EVENT_QUEUE_GLOBAL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_embeds_config_as_json_not_concatenation() {
        let script = build_observer_script(&ObserverScriptParams::default());
        assert!(script.contains("\"inputDebounceMs\":3000"));
        assert!(script.contains(ACTION_SENTINEL));
    }

    #[test]
    fn script_is_gated_by_window_sentinel() {
        let script = build_observer_script(&ObserverScriptParams::default());
        assert!(script.contains("window.__autopilotObserverInstalled__"));
    }
}
