//! Typed builder for the in-page extraction script, so parameters are
//! interpolated as JSON literals rather than string-concatenated into the
//! script source.

use serde_json::json;

#[derive(Clone, Copy, Debug)]
pub enum ExtractionMode {
    Full,
    Viewport,
}

#[derive(Clone, Debug)]
pub struct ExtractionScriptParams {
    pub mode: ExtractionMode,
    pub max_elements: usize,
    pub viewport_buffer_px: f64,
}

impl Default for ExtractionScriptParams {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Full,
            max_elements: 500,
            viewport_buffer_px: 100.0,
        }
    }
}

const INTERACTIVE_TAGS: &[&str] = &["button", "a", "input", "textarea", "select"];
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "tab", "menuitem"];

/// Builds the JSON-returning JS expression evaluated via `eval_in_page`.
///
/// The script enumerates interactive elements in document order, applies the
/// visibility predicate (computed `display`/`visibility`/`opacity`, non-zero
/// rect), optionally filters to the viewport-extended rect, and extracts forms
/// separately. Numeric/boolean parameters are passed as a single JSON config
/// object rather than interpolated into identifiers.
pub fn build_extraction_script(params: &ExtractionScriptParams) -> String {
    let viewport_only = matches!(params.mode, ExtractionMode::Viewport);
    let config = json!({
        "maxElements": params.max_elements,
        "viewportOnly": viewport_only,
        "viewportBufferPx": params.viewport_buffer_px,
        "interactiveTags": INTERACTIVE_TAGS,
        "interactiveRoles": INTERACTIVE_ROLES,
        "maxTextChars": 200,
    });

    format!(
        r#"(() => {{
    const cfg = {config};
    const isVisible = (el) => {{
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || parseFloat(style.opacity || '1') === 0) {{
            return false;
        }}
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }};
    const intersectsViewport = (el) => {{
        const rect = el.getBoundingClientRect();
        const buf = cfg.viewportBufferPx;
        return rect.bottom >= -buf && rect.top <= window.innerHeight + buf
            && rect.right >= -buf && rect.left <= window.innerWidth + buf;
    }};
    const isInteractive = (el) => {{
        const tag = el.tagName.toLowerCase();
        if (cfg.interactiveTags.includes(tag)) {{
            if (tag === 'a') return el.hasAttribute('href');
            return true;
        }}
        const role = el.getAttribute('role');
        if (role && cfg.interactiveRoles.includes(role)) return true;
        if (el.hasAttribute('onclick') || el.hasAttribute('tabindex')) return true;
        return false;
    }};
    const truncate = (text) => (text || '').trim().slice(0, cfg.maxTextChars);
    const attrs = (el) => {{
        const out = {{}};
        for (const a of el.attributes) out[a.name] = a.value;
        return out;
    }};

    const elements = [];
    const all = document.querySelectorAll('*');
    for (const el of all) {{
        if (elements.length >= cfg.maxElements) break;
        if (!isInteractive(el) || !isVisible(el)) continue;
        if (cfg.viewportOnly && !intersectsViewport(el)) continue;
        const rect = el.getBoundingClientRect();
        elements.push({{
            selector: null,
            tag: el.tagName.toLowerCase(),
            text: truncate(el.textContent),
            boundingBox: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }},
            parentSelector: null,
            disabled: !!el.disabled,
            attributes: attrs(el),
        }});
    }}

    const forms = [];
    for (const form of document.querySelectorAll('form')) {{
        const fields = [];
        for (const field of form.elements) {{
            fields.push({{
                selector: null,
                tag: field.tagName.toLowerCase(),
                fieldType: field.type || null,
                name: field.name || null,
            }});
        }}
        forms.push({{ selector: null, fields }});
    }}

    const viewport = cfg.viewportOnly ? {{
        width: window.innerWidth,
        height: window.innerHeight,
        scrollX: window.scrollX,
        scrollY: window.scrollY,
        maxScrollX: document.documentElement.scrollWidth - window.innerWidth,
        maxScrollY: document.documentElement.scrollHeight - window.innerHeight,
    }} : null;

    return {{
        url: window.location.href,
        title: document.title,
        elements,
        forms,
        viewport,
    }};
}})()"#
    )
}

#[derive(Clone, Debug)]
pub enum ScrollTarget {
    Top,
    Bottom,
    AbsoluteY(f64),
    Selector { primary: String, backups: Vec<String> },
}

/// Builds the scroll-and-settle script run before a viewport extraction, per the
/// 2-second settle wait specified for scroll-to-element.
pub fn build_scroll_script(target: &ScrollTarget) -> String {
    match target {
        ScrollTarget::Top => "window.scrollTo(0, 0);".to_string(),
        ScrollTarget::Bottom => "window.scrollTo(0, document.documentElement.scrollHeight);".to_string(),
        ScrollTarget::AbsoluteY(y) => format!("window.scrollTo(0, {y});"),
        ScrollTarget::Selector { primary, backups } => {
            let selectors = json!(std::iter::once(primary.clone()).chain(backups.clone()).collect::<Vec<_>>());
            format!(
                r#"(() => {{
    const selectors = {selectors};
    for (const sel of selectors) {{
        const el = document.querySelector(sel);
        if (el) {{ el.scrollIntoView({{ block: 'center' }}); return true; }}
    }}
    return false;
}})()"#
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_script_marks_viewport_only() {
        let script = build_extraction_script(&ExtractionScriptParams {
            mode: ExtractionMode::Viewport,
            ..Default::default()
        });
        assert!(script.contains("\"viewportOnly\":true"));
    }

    #[test]
    fn scroll_to_selector_includes_backups_as_json_array_not_concatenation() {
        let script = build_scroll_script(&ScrollTarget::Selector {
            primary: "#delete-btn".into(),
            backups: vec![".btn-danger".into()],
        });
        assert!(script.contains("\"#delete-btn\""));
        assert!(script.contains("\".btn-danger\""));
    }
}
