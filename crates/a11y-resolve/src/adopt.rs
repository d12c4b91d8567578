//! Adoption of a cached snapshot node into a live, verified locator.
//!
//! Two stages on purpose: the static hint match runs against the snapshot
//! tree, then the adopted locator's live match count is checked against the
//! real DOM — the authoritative guard against stale-snapshot mismatches.

use std::sync::Arc;

use page_port::{LocatorPort, LocatorSpec, PagePort};
use tracing::debug;

use crate::errors::ResolveError;
use crate::types::AxNodeInfo;

/// How many candidate elements an ambiguity report carries at most.
pub const AMBIGUITY_CANDIDATE_LIMIT: usize = 10;

/// Locator strategy for a node: role+name first, then exact text on the
/// name, then on the description. Nodes offering none of these cannot be
/// bound back to the live page.
pub fn locator_spec_for(info: &AxNodeInfo) -> Option<LocatorSpec> {
    if !info.role.is_empty() && !info.name.is_empty() {
        return Some(LocatorSpec::Role {
            role: info.role.clone(),
            name: Some(info.name.clone()),
            exact_name: true,
        });
    }
    if !info.name.is_empty() {
        return Some(LocatorSpec::Text {
            text: info.name.clone(),
            exact: true,
        });
    }
    if !info.description.is_empty() {
        return Some(LocatorSpec::Text {
            text: info.description.clone(),
            exact: true,
        });
    }
    None
}

/// A successfully adopted node: the verified live locator plus its spec.
pub struct Adoption {
    pub locator: Arc<dyn LocatorPort>,
    pub spec: LocatorSpec,
}

impl std::fmt::Debug for Adoption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adoption")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Adopt a cached node into a live locator, verifying the live match count:
/// 0 is not-found, 1 succeeds, more than 1 is ambiguous with candidate
/// summaries attached.
pub async fn adopt(page: &Arc<dyn PagePort>, info: &AxNodeInfo) -> Result<Adoption, ResolveError> {
    let spec =
        locator_spec_for(info).ok_or_else(|| ResolveError::NotBindable(info.id.clone()))?;
    let locator = page.locator(&spec);
    let count = locator.count().await?;
    debug!(node = %info.id, locator = %spec, count, "adopted locator");
    match count {
        0 => Err(ResolveError::LiveNotFound {
            spec: spec.to_string(),
        }),
        1 => Ok(Adoption { locator, spec }),
        n => {
            let candidates = locator.describe(AMBIGUITY_CANDIDATE_LIMIT).await?;
            Err(ResolveError::LiveAmbiguous {
                spec: spec.to_string(),
                count: n,
                candidates,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::mock::{Fixture, MemoryElement, MemoryPage};

    fn node(role: &str, name: &str, description: &str) -> AxNodeInfo {
        AxNodeInfo {
            id: "n0.0".to_string(),
            role: role.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            value: String::new(),
        }
    }

    #[test]
    fn strategy_prefers_role_and_name() {
        let spec = locator_spec_for(&node("button", "Save", "")).unwrap();
        assert!(matches!(spec, LocatorSpec::Role { .. }));
    }

    #[test]
    fn strategy_falls_back_to_description_text() {
        let spec = locator_spec_for(&node("", "", "fine print")).unwrap();
        assert!(matches!(spec, LocatorSpec::Text { exact: true, .. }));
    }

    #[test]
    fn nameless_role_only_node_is_not_bindable() {
        assert!(locator_spec_for(&node("generic", "", "")).is_none());
    }

    fn live_page(buttons: &[&str]) -> Arc<dyn PagePort> {
        let mut fixture = Fixture::new("Live");
        for name in buttons {
            fixture = fixture.with_element(MemoryElement::new("button", "button", *name));
        }
        let page = MemoryPage::new();
        page.load_fixture("about:blank", &fixture);
        Arc::new(page)
    }

    #[tokio::test]
    async fn unique_live_match_adopts() {
        let page = live_page(&["Save"]);
        let adoption = adopt(&page, &node("button", "Save", "")).await.unwrap();
        assert_eq!(adoption.locator.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_live_matches_is_not_found() {
        let page = live_page(&["Other"]);
        let err = adopt(&page, &node("button", "Save", "")).await.unwrap_err();
        assert!(matches!(err, ResolveError::LiveNotFound { .. }));
    }

    #[tokio::test]
    async fn multiple_live_matches_is_ambiguous_with_candidates() {
        let page = live_page(&["Save", "Save"]);
        let err = adopt(&page, &node("button", "Save", "")).await.unwrap_err();
        match err {
            ResolveError::LiveAmbiguous {
                count, candidates, ..
            } => {
                assert_eq!(count, 2);
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[0].tag, "button");
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }
}
