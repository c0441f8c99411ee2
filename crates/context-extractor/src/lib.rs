//! Produces a structured `PageContext` snapshot of the current page, in full or
//! viewport-only mode, via in-page script evaluation.

pub mod script;

use std::time::Duration;

use async_trait::async_trait;
use automation_types::{Form, FormField, InteractiveElement, PageContext, Viewport};
use script::{build_extraction_script, build_scroll_script, ExtractionMode, ExtractionScriptParams, ScrollTarget};
use selector_engine::rank::{rank_selectors, RawElementInfo};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("page evaluation failed: {0}")]
    Eval(String),
    #[error("malformed extraction payload: {0}")]
    Malformed(String),
}

/// The minimal in-page evaluation surface the extractor needs from the Browser
/// Control Surface.
#[async_trait]
pub trait PageEval: Send + Sync {
    async fn eval_in_page(&self, script: &str) -> Result<Value, ExtractorError>;
}

/// The 2-second settle wait specified after scrolling to an element before
/// extracting viewport data.
const SCROLL_SETTLE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct ExtractRequest {
    pub mode: ExtractionMode,
    pub max_elements: usize,
    pub scroll_to: Option<ScrollTarget>,
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Full,
            max_elements: 500,
            scroll_to: None,
        }
    }
}

pub async fn extract(backend: &dyn PageEval, request: ExtractRequest) -> Result<PageContext, ExtractorError> {
    if let Some(target) = &request.scroll_to {
        let script = build_scroll_script(target);
        backend.eval_in_page(&script).await?;
        sleep(SCROLL_SETTLE).await;
    }

    let script = build_extraction_script(&ExtractionScriptParams {
        mode: request.mode,
        max_elements: request.max_elements,
        viewport_buffer_px: 100.0,
    });
    let raw = backend.eval_in_page(&script).await?;
    parse_page_context(raw)
}

fn parse_page_context(raw: Value) -> Result<PageContext, ExtractorError> {
    let url = raw
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractorError::Malformed("missing url".into()))?
        .to_string();
    let title = raw.get("title").and_then(Value::as_str).unwrap_or_default().to_string();

    let mut context = PageContext::new(url, title);

    if let Some(elements) = raw.get("elements").and_then(Value::as_array) {
        for element in elements {
            context.elements.push(parse_interactive_element(element));
        }
    }

    if let Some(forms) = raw.get("forms").and_then(Value::as_array) {
        for form in forms {
            context.forms.push(parse_form(form));
        }
    }

    if let Some(viewport) = raw.get("viewport").filter(|v| !v.is_null()) {
        context.viewport = parse_viewport(viewport);
    }

    context.finalize_stats();
    Ok(context)
}

fn parse_interactive_element(value: &Value) -> InteractiveElement {
    let tag = value.get("tag").and_then(Value::as_str).unwrap_or_default().to_string();
    let attributes: std::collections::HashMap<String, String> = value
        .get("attributes")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let selector = derive_selector(&tag, &attributes);
    let bounding_box = value.get("boundingBox").and_then(|bb| {
        Some(automation_types::BoundingBox {
            x: bb.get("x")?.as_f64()?,
            y: bb.get("y")?.as_f64()?,
            width: bb.get("width")?.as_f64()?,
            height: bb.get("height")?.as_f64()?,
        })
    });

    InteractiveElement {
        selector,
        tag: tag.clone(),
        text: value.get("text").and_then(Value::as_str).map(String::from),
        bounding_box,
        parent_selector: value.get("parentSelector").and_then(Value::as_str).map(String::from),
        disabled: value.get("disabled").and_then(Value::as_bool).unwrap_or(false),
        attributes,
    }
}

fn derive_selector(tag: &str, attributes: &std::collections::HashMap<String, String>) -> String {
    let data_attrs: Vec<(String, String)> = attributes
        .iter()
        .filter(|(k, _)| k.starts_with("data-") && k.as_str() != "data-testid")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let classes: Vec<String> = attributes
        .get("class")
        .map(|c| c.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    let info = RawElementInfo {
        tag: tag.to_string(),
        id: attributes.get("id").cloned(),
        data_testid: attributes.get("data-testid").cloned(),
        data_attrs,
        aria_label: attributes.get("aria-label").cloned(),
        role: attributes.get("role").cloned(),
        name_attr: attributes.get("name").cloned(),
        type_attr: attributes.get("type").cloned(),
        classes,
        ancestors: Vec::new(),
        parent_selector: None,
        sibling_index: None,
    };

    rank_selectors(&info)
        .into_iter()
        .next()
        .map(|c| c.selector)
        .unwrap_or_else(|| tag.to_string())
}

fn parse_form(value: &Value) -> Form {
    let fields = value
        .get("fields")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|f| FormField {
                    selector: f.get("selector").and_then(Value::as_str).unwrap_or_default().to_string(),
                    tag: f.get("tag").and_then(Value::as_str).unwrap_or_default().to_string(),
                    field_type: f.get("fieldType").and_then(Value::as_str).map(String::from),
                    name: f.get("name").and_then(Value::as_str).map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    Form {
        selector: value.get("selector").and_then(Value::as_str).unwrap_or_default().to_string(),
        fields,
    }
}

fn parse_viewport(value: &Value) -> Option<Viewport> {
    Some(Viewport {
        width: value.get("width")?.as_f64()?,
        height: value.get("height")?.as_f64()?,
        scroll_x: value.get("scrollX")?.as_f64()?,
        scroll_y: value.get("scrollY")?.as_f64()?,
        max_scroll_x: value.get("maxScrollX")?.as_f64()?,
        max_scroll_y: value.get("maxScrollY")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeBackend {
        responses: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl PageEval for FakeBackend {
        async fn eval_in_page(&self, script: &str) -> Result<Value, ExtractorError> {
            debug!(len = script.len(), "eval_in_page");
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn parses_full_page_extraction() {
        let backend = FakeBackend {
            responses: Mutex::new(vec![json!({
                "url": "https://example.com",
                "title": "Example",
                "elements": [{
                    "tag": "button",
                    "text": "Submit",
                    "boundingBox": {"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0},
                    "disabled": false,
                    "attributes": {"data-testid": "submit-btn"}
                }],
                "forms": [],
                "viewport": null
            })]),
        };

        let context = extract(&backend, ExtractRequest::default()).await.unwrap();
        assert_eq!(context.url, "https://example.com");
        assert_eq!(context.elements.len(), 1);
        assert_eq!(context.elements[0].selector, "[data-testid=\"submit-btn\"]");
        assert_eq!(context.stats.interactive_elements, 1);
    }

    #[tokio::test]
    async fn missing_url_is_malformed() {
        let backend = FakeBackend {
            responses: Mutex::new(vec![json!({"title": "x"})]),
        };
        let result = extract(&backend, ExtractRequest::default()).await;
        assert!(matches!(result, Err(ExtractorError::Malformed(_))));
    }
}
