use serde::{Deserialize, Serialize};

use crate::element::{BoundingBox, ElementTarget};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub selector: String,
    pub tag: String,
    /// Truncated to [`ElementTarget::MAX_TEXT_CHARS`].
    pub text: Option<String>,
    pub bounding_box: Option<BoundingBox>,
    pub parent_selector: Option<String>,
    pub disabled: bool,
    pub attributes: std::collections::HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    pub tag: String,
    pub field_type: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub selector: String,
    pub fields: Vec<FormField>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_elements: usize,
    pub interactive_elements: usize,
    pub forms: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub max_scroll_x: f64,
    pub max_scroll_y: f64,
}

/// A structured extract of a page's interactive elements, forms, and viewport data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub elements: Vec<InteractiveElement>,
    pub forms: Vec<Form>,
    pub stats: Stats,
    pub viewport: Option<Viewport>,
}

impl PageContext {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            elements: Vec::new(),
            forms: Vec::new(),
            stats: Stats::default(),
            viewport: None,
        }
    }

    pub fn finalize_stats(&mut self) {
        self.stats = Stats {
            total_elements: self.elements.len(),
            interactive_elements: self.elements.len(),
            forms: self.forms.len(),
        };
    }
}

impl From<&ElementTarget> for InteractiveElement {
    fn from(target: &ElementTarget) -> Self {
        Self {
            selector: target.primary_selector.clone(),
            tag: target.tag_name.clone(),
            text: target.text.clone(),
            bounding_box: target.bounding_box,
            parent_selector: target.parent_selector.clone(),
            disabled: target.disabled,
            attributes: target.attributes.clone(),
        }
    }
}
