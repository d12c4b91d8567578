//! Hint normalization and matching against the cached snapshot.
//!
//! Matching is a pure scan over the indexed tree; no new snapshot is taken
//! here, and nothing below the cache is consulted.

use crate::errors::ResolveError;
use crate::types::{A11yHint, AxNodeInfo, NodeIndex};

/// Case-fold, collapse whitespace and straighten curly quotes so recorded
/// hints survive cosmetic text differences.
pub fn normalize(s: &str) -> String {
    let straightened: String = s
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();
    straightened
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn matches(node: &AxNodeInfo, hint: &A11yHint) -> bool {
    if let Some(role) = &hint.role {
        if normalize(&node.role) != normalize(role) {
            return false;
        }
    }
    if let Some(name) = &hint.name {
        if !normalize(&node.name).contains(&normalize(name)) {
            return false;
        }
    }
    if let Some(text) = &hint.text {
        let wanted = normalize(text);
        let hit = normalize(&node.name).contains(&wanted)
            || normalize(&node.description).contains(&wanted)
            || normalize(&node.value).contains(&wanted);
        if !hit {
            return false;
        }
    }
    true
}

/// All nodes matching the hint, in depth-first snapshot order.
pub fn find_by_hint<'a>(index: &'a NodeIndex, hint: &A11yHint) -> Vec<&'a AxNodeInfo> {
    if hint.is_empty() {
        return Vec::new();
    }
    index.iter().filter(|node| matches(node, hint)).collect()
}

/// Resolve a hint to exactly one node: zero matches is not-found, more than
/// one is ambiguous — a multi-match is never silently narrowed.
pub fn resolve_hint<'a>(
    index: &'a NodeIndex,
    hint: &A11yHint,
) -> Result<&'a AxNodeInfo, ResolveError> {
    let found = find_by_hint(index, hint);
    match found.len() {
        0 => Err(ResolveError::HintNotFound { hint: hint.clone() }),
        1 => Ok(found[0]),
        _ => Err(ResolveError::HintAmbiguous {
            hint: hint.clone(),
            candidates: found
                .iter()
                .take(10)
                .map(|node| (*node).clone())
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::index_tree;
    use serde_json::json;

    fn sample_index() -> NodeIndex {
        index_tree(&json!({
            "role": "WebArea",
            "name": "Sample",
            "children": [
                {"role": "button", "name": "Save Draft"},
                {"role": "button", "name": "Save"},
                {"role": "textbox", "name": "Name", "description": "Full legal name"},
            ]
        }))
    }

    #[test]
    fn normalize_folds_case_space_and_quotes() {
        assert_eq!(normalize("  Save\u{2019}s   Draft "), "save's draft");
        assert_eq!(normalize("\u{201C}OK\u{201D}"), "\"ok\"");
    }

    #[test]
    fn name_is_substring_match() {
        let index = sample_index();
        let hint = A11yHint {
            role: Some("button".into()),
            name: Some("save".into()),
            text: None,
        };
        let found = find_by_hint(&index, &hint);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn role_must_match_exactly() {
        let index = sample_index();
        let hint = A11yHint {
            role: Some("butt".into()),
            name: None,
            text: None,
        };
        assert!(find_by_hint(&index, &hint).is_empty());
    }

    #[test]
    fn text_searches_description_too() {
        let index = sample_index();
        let hint = A11yHint {
            role: None,
            name: None,
            text: Some("legal name".into()),
        };
        let found = find_by_hint(&index, &hint);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, "textbox");
    }

    #[test]
    fn resolve_is_idempotent_on_unchanged_snapshot() {
        let index = sample_index();
        let hint = A11yHint::role_name("button", "Save Draft");
        let first = resolve_hint(&index, &hint).unwrap().id.clone();
        let second = resolve_hint(&index, &hint).unwrap().id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn multi_match_is_ambiguous_not_narrowed() {
        let index = sample_index();
        let hint = A11yHint {
            role: Some("button".into()),
            name: Some("Save".into()),
            text: None,
        };
        match resolve_hint(&index, &hint) {
            Err(ResolveError::HintAmbiguous { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn empty_hint_matches_nothing() {
        let index = sample_index();
        assert!(find_by_hint(&index, &A11yHint::default()).is_empty());
    }
}
