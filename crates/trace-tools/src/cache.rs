//! Per-binding accessibility snapshot cache.
//!
//! Populated only by the snapshot operation; node ids are valid solely
//! against the generation that issued them. Mutating page operations do not
//! invalidate the cache — the live match-count check at adoption time is the
//! guard against stale resolutions. Navigation does clear it, since ids can
//! never survive a cross-document load.

use a11y_resolve::{AxNodeInfo, NodeIndex};

#[derive(Default)]
pub struct AxCache {
    generation: u64,
    index: Option<NodeIndex>,
}

impl AxCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly built index, bumping the generation; all previously
    /// issued node ids become invalid.
    pub fn install(&mut self, index: NodeIndex) -> u64 {
        self.generation += 1;
        self.index = Some(index);
        self.generation
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.index = None;
    }

    pub fn has_snapshot(&self) -> bool {
        self.index.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn node(&self, id: &str) -> Option<AxNodeInfo> {
        self.index.as_ref().and_then(|index| index.get(id)).cloned()
    }

    pub fn index(&self) -> Option<&NodeIndex> {
        self.index.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_resolve::index_tree;
    use serde_json::json;

    #[test]
    fn install_bumps_generation_and_replaces_nodes() {
        let mut cache = AxCache::new();
        assert!(!cache.has_snapshot());

        let first = index_tree(&json!({"role": "WebArea", "children": [{"role": "button", "name": "A"}]}));
        let gen1 = cache.install(first);
        assert!(cache.node("n0.0").is_some());

        let second = index_tree(&json!({"role": "WebArea"}));
        let gen2 = cache.install(second);
        assert!(gen2 > gen1);
        assert!(cache.node("n0.0").is_none());
    }

    #[test]
    fn clear_invalidates_but_keeps_counting() {
        let mut cache = AxCache::new();
        cache.install(index_tree(&json!({"role": "WebArea"})));
        let before = cache.generation();
        cache.clear();
        assert!(!cache.has_snapshot());
        assert!(cache.generation() > before);
    }
}
