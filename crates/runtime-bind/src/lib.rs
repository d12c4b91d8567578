//! Runtime binding layer: attaches a `TraceTools` instance to each
//! workspace's active page and caches the association per tab token until
//! the underlying page closes.

use std::sync::Arc;

use dashmap::DashMap;
use page_port::PagePort;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use tabweaver_core_types::{OpError, ResolvedScope, TabToken, WorkspaceId};
use tabweaver_registry::{CloseHook, Registry, RegistryError};
use trace_tools::{TraceHooks, TraceSink, TraceTags, TraceTools, WaitTimeouts};

#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl BindError {
    pub fn into_op_error(self) -> OpError {
        match self {
            BindError::Registry(err) => err.into_op_error(),
        }
    }
}

/// Cached association of one tab's page handle with its trace tooling.
pub struct PageBinding {
    pub scope: ResolvedScope,
    pub token: TabToken,
    pub page: Arc<dyn PagePort>,
    pub tools: Arc<TraceTools>,
}

/// Produces and caches `PageBinding`s. At most one binding exists per token;
/// a lookup rebinds only when the underlying page handle changed. Bindings
/// and their metadata are dropped by the registry's close notification.
pub struct PageBinder {
    registry: Arc<Registry>,
    sinks: Vec<Arc<dyn TraceSink>>,
    hooks: TraceHooks,
    wait: WaitTimeouts,
    bindings: DashMap<TabToken, Arc<PageBinding>>,
    /// Explicit per-page auxiliary state; lives exactly as long as the
    /// binding entry, so an attachment can never outlive its page.
    metadata: DashMap<TabToken, serde_json::Map<String, Value>>,
}

impl PageBinder {
    pub fn new(
        registry: Arc<Registry>,
        sinks: Vec<Arc<dyn TraceSink>>,
        hooks: TraceHooks,
        wait: WaitTimeouts,
    ) -> Arc<Self> {
        let binder = Arc::new(Self {
            registry: Arc::clone(&registry),
            sinks,
            hooks,
            wait,
            bindings: DashMap::new(),
            metadata: DashMap::new(),
        });
        registry.add_close_hook(binder.clone() as Arc<dyn CloseHook>);
        binder
    }

    /// Resolve the workspace's active page to a binding, creating the
    /// workspace, tab, and binding as needed.
    pub async fn ensure_active_page(
        &self,
        workspace: &WorkspaceId,
    ) -> Result<Arc<PageBinding>, BindError> {
        let tab = self.registry.ensure_workspace(workspace).await?;
        let (token, page) = self.registry.tab_binding(&tab)?;
        let scope = ResolvedScope::new(workspace.clone(), tab);
        Ok(self.bind(scope, token, page))
    }

    /// Idempotent bind: the same page yields the existing binding unchanged;
    /// a different page for the same token replaces it.
    fn bind(
        &self,
        scope: ResolvedScope,
        token: TabToken,
        page: Arc<dyn PagePort>,
    ) -> Arc<PageBinding> {
        if let Some(existing) = self.bindings.get(&token) {
            if existing.value().page.id() == page.id() {
                return Arc::clone(existing.value());
            }
        }
        let tools = TraceTools::new(
            Arc::clone(&page),
            TraceTags {
                workspace: scope.workspace.clone(),
                token: token.clone(),
            },
            self.sinks.clone(),
            self.hooks.clone(),
            self.wait.clone(),
        );
        let binding = Arc::new(PageBinding {
            scope,
            token: token.clone(),
            page,
            tools,
        });
        debug!(%token, "page binding created");
        self.bindings.insert(token, Arc::clone(&binding));
        binding
    }

    pub fn binding_for_token(&self, token: &TabToken) -> Option<Arc<PageBinding>> {
        self.bindings.get(token).map(|entry| Arc::clone(entry.value()))
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Attach auxiliary state to a bound page; replaced values are returned.
    pub fn set_meta(&self, token: &TabToken, key: &str, value: Value) -> Option<Value> {
        self.metadata
            .entry(token.clone())
            .or_default()
            .insert(key.to_string(), value)
    }

    pub fn meta(&self, token: &TabToken, key: &str) -> Option<Value> {
        self.metadata
            .get(token)
            .and_then(|entry| entry.value().get(key).cloned())
    }
}

impl CloseHook for PageBinder {
    fn on_page_closed(&self, _scope: &ResolvedScope, token: &TabToken) {
        self.bindings.remove(token);
        self.metadata.remove(token);
        debug!(%token, "page binding dropped after close");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::mock::MemoryBrowser;
    use page_port::PageFactory;
    use serde_json::json;
    use std::time::Duration;

    fn binder() -> (Arc<Registry>, Arc<PageBinder>) {
        let browser = MemoryBrowser::new();
        let registry = Registry::new(browser as Arc<dyn PageFactory>);
        let binder = PageBinder::new(
            Arc::clone(&registry),
            Vec::new(),
            TraceHooks::default(),
            WaitTimeouts::default(),
        );
        (registry, binder)
    }

    #[tokio::test]
    async fn ensure_active_page_creates_workspace_on_demand() {
        let (registry, binder) = binder();
        let workspace = WorkspaceId::new();
        let binding = binder.ensure_active_page(&workspace).await.unwrap();
        assert!(registry.workspace_exists(&workspace));
        assert_eq!(binding.scope.workspace, workspace);
        assert_eq!(binder.binding_count(), 1);
    }

    #[tokio::test]
    async fn repeated_lookups_reuse_the_binding() {
        let (_, binder) = binder();
        let workspace = WorkspaceId::new();
        let first = binder.ensure_active_page(&workspace).await.unwrap();
        let second = binder.ensure_active_page(&workspace).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(binder.binding_count(), 1);
    }

    #[tokio::test]
    async fn page_close_drops_binding_and_metadata() {
        let (_, binder) = binder();
        let workspace = WorkspaceId::new();
        let binding = binder.ensure_active_page(&workspace).await.unwrap();
        binder.set_meta(&binding.token, "recorder", json!(true));
        assert_eq!(binder.meta(&binding.token, "recorder"), Some(json!(true)));

        binding.page.close().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(binder.binding_count(), 0);
        assert!(binder.meta(&binding.token, "recorder").is_none());
    }

    #[tokio::test]
    async fn new_active_tab_gets_its_own_binding() {
        let (registry, binder) = binder();
        let workspace = WorkspaceId::new();
        let first = binder.ensure_active_page(&workspace).await.unwrap();
        registry.create_tab(&workspace).await.unwrap();
        let second = binder.ensure_active_page(&workspace).await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(binder.binding_count(), 2);
    }
}
