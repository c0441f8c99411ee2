//! Record-time selector generation and ranking. Pure function of the raw element
//! attributes collected by the in-page script; no browser I/O happens here.

use automation_types::BackupSelector;

/// A React-style placeholder id (`:r1:`, `:rAB:`) is not stable across reloads.
fn is_react_placeholder_id(id: &str) -> bool {
    id.starts_with(':') && id.ends_with(':')
}

/// Framework-generated class prefixes that should not anchor a selector.
fn is_framework_class(class: &str) -> bool {
    class.starts_with("ng-") || class.starts_with('_') || class.starts_with("css-")
}

/// Raw attributes of a DOM element as reported by the in-page script, prior to
/// ranking. One ancestor entry per level, closest first, up to 5 deep.
#[derive(Clone, Debug, Default)]
pub struct RawElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub data_testid: Option<String>,
    pub data_attrs: Vec<(String, String)>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub name_attr: Option<String>,
    pub type_attr: Option<String>,
    pub classes: Vec<String>,
    /// `(tag, classes)` per ancestor, closest first.
    pub ancestors: Vec<(String, Vec<String>)>,
    pub parent_selector: Option<String>,
    pub sibling_index: Option<usize>,
}

fn filtered_classes(classes: &[String], limit: usize) -> Vec<&str> {
    classes
        .iter()
        .map(String::as_str)
        .filter(|c| !is_framework_class(c))
        .take(limit)
        .collect()
}

/// Produces the ranked candidate selector list for an element, highest score first.
/// Rule numbers follow the published ranking table.
pub fn rank_selectors(info: &RawElementInfo) -> Vec<BackupSelector> {
    let mut candidates = Vec::new();

    // 1. Stable id — 95
    if let Some(id) = &info.id {
        if !is_react_placeholder_id(id) {
            candidates.push(BackupSelector {
                selector: format!("#{id}"),
                strategy: "stable-id".to_string(),
                score: 95,
            });
        }
    }

    // 2. data-testid — 90
    if let Some(testid) = &info.data_testid {
        candidates.push(BackupSelector {
            selector: format!("[data-testid=\"{testid}\"]"),
            strategy: "data-testid".to_string(),
            score: 90,
        });
    }

    // 3. Other data-* attributes with values — 85
    for (name, value) in &info.data_attrs {
        if name == "data-testid" {
            continue;
        }
        candidates.push(BackupSelector {
            selector: format!("[{name}=\"{value}\"]"),
            strategy: "data-attr".to_string(),
            score: 85,
        });
    }

    // 4. aria-label, with and without tag prefix — 80
    if let Some(label) = &info.aria_label {
        candidates.push(BackupSelector {
            selector: format!("{}[aria-label=\"{label}\"]", info.tag),
            strategy: "aria-label-tagged".to_string(),
            score: 80,
        });
        candidates.push(BackupSelector {
            selector: format!("[aria-label=\"{label}\"]"),
            strategy: "aria-label".to_string(),
            score: 80,
        });
    }

    // 5. role — 78
    if let Some(role) = &info.role {
        candidates.push(BackupSelector {
            selector: format!("[role=\"{role}\"]"),
            strategy: "role".to_string(),
            score: 78,
        });
    }

    // 6. tag[name="…"] — 75
    if let Some(name) = &info.name_attr {
        candidates.push(BackupSelector {
            selector: format!("{}[name=\"{name}\"]", info.tag),
            strategy: "name-attr".to_string(),
            score: 75,
        });
    }

    // 7. tag[type="…"] — 70
    if let Some(type_attr) = &info.type_attr {
        candidates.push(BackupSelector {
            selector: format!("{}[type=\"{type_attr}\"]", info.tag),
            strategy: "type-attr".to_string(),
            score: 70,
        });
    }

    // 8. Minimal unique class selector (tag + up to 3 classes) — 60
    let classes = filtered_classes(&info.classes, 3);
    if !classes.is_empty() {
        candidates.push(BackupSelector {
            selector: format!("{}.{}", info.tag, classes.join(".")),
            strategy: "minimal-class".to_string(),
            score: 60,
        });
    }

    // 9. Hierarchical path (up to 5 ancestors) — 55
    if !info.ancestors.is_empty() {
        let mut segments: Vec<String> = info
            .ancestors
            .iter()
            .take(5)
            .rev()
            .map(|(tag, classes)| {
                let cls = filtered_classes(classes, 3);
                if cls.is_empty() {
                    tag.clone()
                } else {
                    format!("{tag}.{}", cls.join("."))
                }
            })
            .collect();
        segments.push(info.tag.clone());
        candidates.push(BackupSelector {
            selector: segments.join(" > "),
            strategy: "hierarchical-path".to_string(),
            score: 55,
        });
    }

    // 10. Parent selector + :nth-child(i) — 50
    if let (Some(parent), Some(index)) = (&info.parent_selector, info.sibling_index) {
        candidates.push(BackupSelector {
            selector: format!("{parent} > :nth-child({})", index + 1),
            strategy: "nth-child".to_string(),
            score: 50,
        });
    }

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_react_placeholder_id_but_keeps_data_testid() {
        let info = RawElementInfo {
            tag: "button".into(),
            id: Some(":r3:".into()),
            data_testid: Some("submit".into()),
            ..Default::default()
        };
        let ranked = rank_selectors(&info);
        assert!(ranked.iter().all(|c| c.strategy != "stable-id"));
        assert_eq!(ranked[0].selector, "[data-testid=\"submit\"]");
    }

    #[test]
    fn orders_candidates_by_descending_score() {
        let info = RawElementInfo {
            tag: "input".into(),
            id: Some("email".into()),
            aria_label: Some("Email address".into()),
            role: Some("textbox".into()),
            ..Default::default()
        };
        let ranked = rank_selectors(&info);
        let scores: Vec<u32> = ranked.iter().map(|c| c.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(scores, sorted);
        assert_eq!(ranked[0].selector, "#email");
    }

    #[test]
    fn filters_framework_generated_classes() {
        let info = RawElementInfo {
            tag: "div".into(),
            classes: vec!["ng-star-inserted".into(), "card".into(), "_private".into(), "css-1x2y3z".into()],
            ..Default::default()
        };
        let ranked = rank_selectors(&info);
        let minimal_class = ranked.iter().find(|c| c.strategy == "minimal-class").unwrap();
        assert_eq!(minimal_class.selector, "div.card");
    }
}
