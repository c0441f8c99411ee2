//! Typed builders for the in-page scripts the executor evaluates. Parameters
//! are interpolated as JSON literals, never string-concatenated, matching the
//! context-extractor's script-builder convention.

use serde_json::json;

/// Resolves the first candidate selector that exists in the document, falling
/// back to an exact-text match when every selector misses. On a match, tags
/// the element with a temporary unique attribute so the caller gets back a
/// single selector usable for the remainder of the action regardless of which
/// strategy found it.
pub fn build_resolve_script(selectors: &[&str], text_fallback: Option<&str>, marker: &str) -> String {
    let selectors_json = json!(selectors);
    let text_json = json!(text_fallback);
    format!(
        r#"(() => {{
    const selectors = {selectors_json};
    const textFallback = {text_json};
    const marker = {marker:?};
    let el = null;
    let strategy = null;
    for (const sel of selectors) {{
        try {{
            const found = document.querySelector(sel);
            if (found) {{ el = found; strategy = 'css'; break; }}
        }} catch (e) {{ /* invalid selector candidate, skip */ }}
    }}
    if (!el && textFallback) {{
        const needle = textFallback.trim();
        const all = document.querySelectorAll('*');
        for (const cand of all) {{
            const text = (cand.textContent || '').trim();
            if (text === needle && cand.children.length === 0) {{ el = cand; strategy = 'text'; break; }}
        }}
    }}
    if (!el) {{
        return {{ found: false }};
    }}
    el.setAttribute('data-autopilot-rid', marker);
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none' && style.visibility !== 'hidden'
        && parseFloat(style.opacity || '1') !== 0 && rect.width > 0 && rect.height > 0;
    return {{
        found: true,
        strategy,
        selector: `[data-autopilot-rid="${{marker}}"]`,
        tag: el.tagName.toLowerCase(),
        disabled: !!el.disabled,
        visible,
        rect: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }},
    }};
}})()"#
    )
}

pub fn build_scroll_into_view_script(selector: &str) -> String {
    let selector_json = json!(selector);
    format!(
        r#"(() => {{
    const el = document.querySelector({selector_json});
    if (el) {{ el.scrollIntoView({{ block: 'center' }}); return true; }}
    return false;
}})()"#
    )
}

pub enum SelectBy {
    Value(String),
    Label(String),
    Index(usize),
}

pub fn build_select_script(selector: &str, by: &SelectBy) -> String {
    let selector_json = json!(selector);
    let assignment = match by {
        SelectBy::Value(v) => format!("el.value = {};", json!(v)),
        SelectBy::Label(label) => format!(
            "const opt = Array.from(el.options).find(o => o.textContent.trim() === {}); if (opt) el.value = opt.value;",
            json!(label)
        ),
        SelectBy::Index(i) => format!("if (el.options[{i}]) el.selectedIndex = {i};"),
    };
    format!(
        r#"(() => {{
    const el = document.querySelector({selector_json});
    if (!el) return {{ found: false }};
    {assignment}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ found: true, value: el.value }};
}})()"#
    )
}

pub fn build_set_checked_script(selector: &str, checked: bool) -> String {
    let selector_json = json!(selector);
    format!(
        r#"(() => {{
    const el = document.querySelector({selector_json});
    if (!el) return {{ found: false }};
    el.checked = {checked};
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ found: true }};
}})()"#
    )
}

pub fn build_submit_script(form_selector: Option<&str>, submit_button_selector: Option<&str>) -> String {
    let form_json = json!(form_selector);
    let button_json = json!(submit_button_selector);
    format!(
        r#"(() => {{
    const buttonSel = {button_json};
    if (buttonSel) {{
        const btn = document.querySelector(buttonSel);
        if (btn) {{ btn.click(); return {{ found: true, via: 'button' }}; }}
    }}
    const formSel = {form_json};
    const form = formSel ? document.querySelector(formSel) : document.forms[0];
    if (!form) return {{ found: false }};
    if (typeof form.requestSubmit === 'function') form.requestSubmit(); else form.submit();
    return {{ found: true, via: 'form' }};
}})()"#
    )
}

#[derive(Clone, Copy, Debug)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

pub fn build_scroll_by_script(direction: ScrollDirection, amount: f64) -> String {
    let (dx, dy) = match direction {
        ScrollDirection::Up => (0.0, -amount),
        ScrollDirection::Down => (0.0, amount),
        ScrollDirection::Left => (-amount, 0.0),
        ScrollDirection::Right => (amount, 0.0),
    };
    format!("window.scrollBy({dx}, {dy});")
}
