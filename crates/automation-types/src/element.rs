use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A ranked alternative selector produced by the selector engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackupSelector {
    pub selector: String,
    pub strategy: String,
    pub score: u32,
}

/// Axis-aligned bounding box in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The record-time description of a DOM element: primary and backup selectors,
/// tag, text, attributes, bounding box, parent selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementTarget {
    pub tag_name: String,
    pub primary_selector: String,
    pub backup_selectors: Vec<BackupSelector>,
    /// Truncated to 200 chars by whoever constructs this (the selector engine / extractor).
    pub text: Option<String>,
    pub bounding_box: Option<BoundingBox>,
    pub parent_selector: Option<String>,
    pub attributes: HashMap<String, String>,
    pub disabled: bool,
}

impl ElementTarget {
    pub const MAX_TEXT_CHARS: usize = 200;

    pub fn new(tag_name: impl Into<String>, primary_selector: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            primary_selector: primary_selector.into(),
            backup_selectors: Vec::new(),
            text: None,
            bounding_box: None,
            parent_selector: None,
            attributes: HashMap::new(),
            disabled: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let truncated: String = text.chars().take(Self::MAX_TEXT_CHARS).collect();
        self.text = Some(truncated);
        self
    }

    pub fn with_backup(mut self, selector: impl Into<String>, strategy: impl Into<String>, score: u32) -> Self {
        self.backup_selectors.push(BackupSelector {
            selector: selector.into(),
            strategy: strategy.into(),
            score,
        });
        self.backup_selectors.sort_by(|a, b| b.score.cmp(&a.score));
        self
    }

    /// Every candidate selector, primary first, highest score first among backups.
    pub fn all_selectors(&self) -> Vec<&str> {
        let mut out = vec![self.primary_selector.as_str()];
        out.extend(self.backup_selectors.iter().map(|b| b.selector.as_str()));
        out
    }
}
