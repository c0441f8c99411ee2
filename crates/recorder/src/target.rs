//! Converts the raw tag/attributes payload reported by the in-page observer
//! into a ranked `ElementTarget`, reusing the same selector-engine ranking
//! `context-extractor` uses for page-extraction elements. Selector ranking
//! logic stays in exactly one place.

use std::collections::HashMap;

use automation_types::{BoundingBox, ElementTarget};
use selector_engine::rank::{rank_selectors, RawElementInfo};

fn raw_info(tag: &str, attributes: &HashMap<String, String>) -> RawElementInfo {
    let data_attrs: Vec<(String, String)> = attributes
        .iter()
        .filter(|(k, _)| k.starts_with("data-") && k.as_str() != "data-testid")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let classes: Vec<String> = attributes
        .get("class")
        .map(|c| c.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    RawElementInfo {
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
    }
}

/// Builds an `ElementTarget` from the observer script's raw `describeTarget`
/// payload: tag, attribute map, trimmed text, bounding box, disabled flag.
pub fn build_element_target(
    tag: &str,
    attributes: HashMap<String, String>,
    text: &str,
    bounding_box: Option<BoundingBox>,
    disabled: bool,
) -> ElementTarget {
    let info = raw_info(tag, &attributes);
    let mut ranked = rank_selectors(&info);
    let primary = if ranked.is_empty() {
        tag.to_string()
    } else {
        ranked.remove(0).selector
    };

    let mut target = ElementTarget::new(tag.to_string(), primary);
    if !text.is_empty() {
        target = target.with_text(text.to_string());
    }
    target.bounding_box = bounding_box;
    target.disabled = disabled;
    target.attributes = attributes;
    for backup in ranked {
        target = target.with_backup(backup.selector, backup.strategy, backup.score);
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_stable_id_as_primary_and_keeps_rest_as_backups() {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), "submit-btn".to_string());
        attrs.insert("role".to_string(), "button".to_string());
        let target = build_element_target("button", attrs, "Submit", None, false);
        assert_eq!(target.primary_selector, "#submit-btn");
        assert!(target.backup_selectors.iter().any(|b| b.strategy == "role"));
    }

    #[test]
    fn falls_back_to_tag_when_nothing_ranks() {
        let target = build_element_target("div", HashMap::new(), "", None, false);
        assert_eq!(target.primary_selector, "div");
        assert!(target.backup_selectors.is_empty());
    }
}
