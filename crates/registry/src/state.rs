use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use page_port::{PageFactory, PagePort};
use parking_lot::RwLock;
use tracing::debug;

use tabweaver_core_types::{ResolvedScope, Scope, TabId, TabToken, WorkspaceId};

use crate::{
    api::TabRoutes,
    errors::RegistryError,
    metrics,
    model::{TabCtx, WorkspaceCtx},
};

/// How token discovery behaves for pages that announce themselves.
#[derive(Clone, Debug)]
pub struct BindPolicy {
    pub token_poll_attempts: u32,
    pub token_poll_interval: Duration,
}

impl Default for BindPolicy {
    fn default() -> Self {
        Self {
            token_poll_attempts: 10,
            token_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Observer notified after a tab's registry state has been purged.
pub trait CloseHook: Send + Sync {
    fn on_page_closed(&self, scope: &ResolvedScope, token: &TabToken);
}

/// Serializable view of one workspace for management surfaces.
#[derive(Clone, Debug, serde::Serialize)]
pub struct WorkspaceView {
    pub id: WorkspaceId,
    pub tabs: Vec<TabId>,
    pub active_tab: Option<TabId>,
}

/// In-memory workspace/tab/page registry.
///
/// All registry state is rebuilt from live pages on demand; nothing survives
/// a process restart.
pub struct Registry {
    factory: Arc<dyn PageFactory>,
    workspaces: DashMap<WorkspaceId, Arc<RwLock<WorkspaceCtx>>>,
    tabs: DashMap<TabId, Arc<RwLock<TabCtx>>>,
    tokens: DashMap<TabToken, ResolvedScope>,
    close_hooks: RwLock<Vec<Arc<dyn CloseHook>>>,
    bind: BindPolicy,
}

impl Registry {
    pub fn new(factory: Arc<dyn PageFactory>) -> Arc<Self> {
        Self::with_bind_policy(factory, BindPolicy::default())
    }

    pub fn with_bind_policy(factory: Arc<dyn PageFactory>, bind: BindPolicy) -> Arc<Self> {
        Arc::new(Self {
            factory,
            workspaces: DashMap::new(),
            tabs: DashMap::new(),
            tokens: DashMap::new(),
            close_hooks: RwLock::new(Vec::new()),
            bind,
        })
    }

    pub fn add_close_hook(&self, hook: Arc<dyn CloseHook>) {
        self.close_hooks.write().push(hook);
    }

    /// Open a brand-new workspace with one tab.
    pub async fn create_workspace(
        self: &Arc<Self>,
    ) -> Result<(WorkspaceId, TabId), RegistryError> {
        let workspace = WorkspaceId::new();
        let tab = self.ensure_workspace(&workspace).await?;
        Ok((workspace, tab))
    }

    /// Make sure the workspace exists and has an active tab, creating either
    /// on demand; returns the active tab id.
    pub async fn ensure_workspace(
        self: &Arc<Self>,
        workspace: &WorkspaceId,
    ) -> Result<TabId, RegistryError> {
        let active = {
            let entry = self.workspaces.entry(workspace.clone()).or_insert_with(|| {
                Arc::new(RwLock::new(WorkspaceCtx::new(workspace.clone())))
            });
            let active_tab = entry.value().read().active_tab.clone();
            active_tab
        };
        metrics::set_workspace_count(self.workspaces.len());
        if let Some(tab) = active {
            return Ok(tab);
        }
        self.create_tab(workspace).await
    }

    /// Open a new page under an existing workspace and make it the active tab.
    pub async fn create_tab(self: &Arc<Self>, workspace: &WorkspaceId) -> Result<TabId, RegistryError> {
        if !self.workspaces.contains_key(workspace) {
            return Err(RegistryError::WorkspaceNotFound(workspace.0.clone()));
        }
        let page = self.factory.open_page().await?;
        let token = TabToken::mint();
        Ok(self.attach_tab(workspace.clone(), page, token))
    }

    fn attach_tab(
        self: &Arc<Self>,
        workspace: WorkspaceId,
        page: Arc<dyn PagePort>,
        token: TabToken,
    ) -> TabId {
        let (tab, ctx) = TabCtx::new(workspace.clone(), token.clone(), Arc::clone(&page));
        self.tabs.insert(tab.clone(), Arc::new(RwLock::new(ctx)));
        let scope = ResolvedScope::new(workspace.clone(), tab.clone());
        self.tokens.insert(token.clone(), scope.clone());

        if let Some(entry) = self.workspaces.get(&workspace) {
            let mut ws = entry.value().write();
            ws.tabs.push(tab.clone());
            ws.active_tab = Some(tab.clone());
            ws.touch();
        }

        metrics::set_tab_count(self.tabs.len());
        metrics::record_page_bound();
        self.watch_close(page, scope, token);
        tab
    }

    /// Close a tab's page (allowing in-page unload handling) and purge its
    /// registry state.
    pub async fn close_tab(
        self: &Arc<Self>,
        workspace: &WorkspaceId,
        tab: &TabId,
    ) -> Result<(), RegistryError> {
        let (page, token, page_id) = {
            let entry = self
                .tabs
                .get(tab)
                .ok_or_else(|| RegistryError::TabNotFound(tab.0.clone()))?;
            let ctx = entry.value().read();
            if &ctx.workspace != workspace {
                return Err(RegistryError::TabNotInWorkspace {
                    workspace: workspace.0.clone(),
                    tab: tab.0.clone(),
                });
            }
            (Arc::clone(&ctx.page), ctx.token.clone(), ctx.page.id().to_string())
        };
        page.close().await?;
        let scope = ResolvedScope::new(workspace.clone(), tab.clone());
        self.cleanup_after_close(&scope, &token, &page_id);
        metrics::record_tab_closed();
        Ok(())
    }

    /// Make an existing member tab the workspace's active tab.
    pub fn activate_tab(&self, workspace: &WorkspaceId, tab: &TabId) -> Result<(), RegistryError> {
        let entry = self
            .workspaces
            .get(workspace)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(workspace.0.clone()))?;
        let mut ws = entry.value().write();
        if !ws.tabs.contains(tab) {
            return Err(RegistryError::TabNotInWorkspace {
                workspace: workspace.0.clone(),
                tab: tab.0.clone(),
            });
        }
        ws.active_tab = Some(tab.clone());
        ws.touch();
        Ok(())
    }

    /// Register a live page under its token, discovering the token from the
    /// page's session storage when the caller does not supply one.
    ///
    /// Returns `None` when no token can be determined within the retry
    /// budget — the page is not (yet) part of this system.
    pub async fn bind_page(
        self: &Arc<Self>,
        page: Arc<dyn PagePort>,
        hinted_token: Option<TabToken>,
    ) -> Result<Option<TabToken>, RegistryError> {
        let token = match hinted_token {
            Some(token) => token,
            None => match self.poll_session_token(&page).await? {
                Some(token) => token,
                None => return Ok(None),
            },
        };

        if let Some(scope) = self.tokens.get(&token).map(|s| s.value().clone()) {
            if let Some(entry) = self.tabs.get(&scope.tab) {
                let same_page = {
                    let ctx = entry.value().read();
                    ctx.page.id() == page.id()
                };
                if same_page {
                    entry.value().write().touch();
                    return Ok(Some(token));
                }
                // Token rebound to a fresh page: replace the handle; the old
                // page's close watcher is superseded by the id check.
                {
                    let mut ctx = entry.value().write();
                    ctx.page = Arc::clone(&page);
                    ctx.touch();
                }
                drop(entry);
                metrics::record_page_bound();
                self.watch_close(page, scope, token.clone());
                return Ok(Some(token));
            }
        }

        // Unknown token: the page becomes the sole tab of a new workspace.
        let workspace = WorkspaceId::new();
        self.workspaces.insert(
            workspace.clone(),
            Arc::new(RwLock::new(WorkspaceCtx::new(workspace.clone()))),
        );
        metrics::set_workspace_count(self.workspaces.len());
        self.attach_tab(workspace, page, token.clone());
        Ok(Some(token))
    }

    async fn poll_session_token(
        &self,
        page: &Arc<dyn PagePort>,
    ) -> Result<Option<TabToken>, RegistryError> {
        for attempt in 0..self.bind.token_poll_attempts {
            match page.read_session_token().await {
                Ok(Some(raw)) if !raw.is_empty() => return Ok(Some(TabToken(raw))),
                Ok(_) => {}
                Err(err) => {
                    debug!(attempt, error = %err, "session token probe failed");
                    return Ok(None);
                }
            }
            tokio::time::sleep(self.bind.token_poll_interval).await;
        }
        Ok(None)
    }

    pub(crate) fn tab_ctx(&self, tab: &TabId) -> Result<TabCtx, RegistryError> {
        self.tabs
            .get(tab)
            .map(|entry| entry.value().read().clone())
            .ok_or_else(|| RegistryError::TabNotFound(tab.0.clone()))
    }

    /// Token and page handle of a tab, for binding layers.
    pub fn tab_binding(
        &self,
        tab: &TabId,
    ) -> Result<(TabToken, Arc<dyn PagePort>), RegistryError> {
        let ctx = self.tab_ctx(tab)?;
        Ok((ctx.token, ctx.page))
    }

    pub fn list_workspaces(&self) -> Vec<WorkspaceView> {
        self.workspaces
            .iter()
            .map(|entry| {
                let ws = entry.value().read();
                WorkspaceView {
                    id: ws.id.clone(),
                    tabs: ws.tabs.clone(),
                    active_tab: ws.active_tab.clone(),
                }
            })
            .collect()
    }

    pub fn workspace_exists(&self, workspace: &WorkspaceId) -> bool {
        self.workspaces.contains_key(workspace)
    }

    fn resolve_scope_sync(&self, scope: Option<&Scope>) -> Result<ResolvedScope, RegistryError> {
        let scope = scope.filter(|s| !s.is_empty()).ok_or(RegistryError::NoScope)?;
        let workspace = scope.workspace.clone().ok_or(RegistryError::NoScope)?;
        let entry = self
            .workspaces
            .get(&workspace)
            .ok_or_else(|| RegistryError::WorkspaceNotFound(workspace.0.clone()))?;
        let ws = entry.value().read();
        let tab = match &scope.tab {
            Some(tab) => {
                if !ws.tabs.contains(tab) {
                    return Err(RegistryError::TabNotInWorkspace {
                        workspace: workspace.0.clone(),
                        tab: tab.0.clone(),
                    });
                }
                tab.clone()
            }
            None => ws
                .active_tab
                .clone()
                .ok_or_else(|| RegistryError::TabNotFound(format!(
                    "no active tab in workspace {}",
                    workspace.0
                )))?,
        };
        Ok(ResolvedScope::new(workspace, tab))
    }

    fn watch_close(self: &Arc<Self>, page: Arc<dyn PagePort>, scope: ResolvedScope, token: TabToken) {
        let registry = Arc::downgrade(self);
        let page_id = page.id().to_string();
        let mut closed = page.closed();
        let already_closed = page.is_closed();
        tokio::spawn(async move {
            if !already_closed {
                // Either a close signal or a dropped sender means the page is gone.
                let _ = closed.recv().await;
            }
            if let Some(registry) = registry.upgrade() {
                registry.cleanup_after_close(&scope, &token, &page_id);
            }
        });
    }

    fn cleanup_after_close(&self, scope: &ResolvedScope, token: &TabToken, page_id: &str) {
        // A superseded watcher must not purge a rebound tab.
        if let Some(entry) = self.tabs.get(&scope.tab) {
            if entry.value().read().page.id() != page_id {
                return;
            }
        }
        if self.tokens.remove(token).is_none() {
            return;
        }
        self.tabs.remove(&scope.tab);
        if let Some(entry) = self.workspaces.get(&scope.workspace) {
            let mut ws = entry.value().write();
            ws.tabs.retain(|t| t != &scope.tab);
            if ws.active_tab.as_ref() == Some(&scope.tab) {
                ws.active_tab = ws.tabs.first().cloned();
            }
            ws.touch();
        }
        metrics::set_tab_count(self.tabs.len());
        debug!(%scope, %token, "registry state purged after page close");
        let hooks: Vec<_> = self.close_hooks.read().iter().cloned().collect();
        for hook in hooks {
            hook.on_page_closed(scope, token);
        }
    }
}

#[async_trait]
impl TabRoutes for Registry {
    async fn resolve_scope(&self, scope: Option<Scope>) -> Result<ResolvedScope, RegistryError> {
        self.resolve_scope_sync(scope.as_ref())
    }

    async fn resolve_page(
        self: Arc<Self>,
        scope: Option<Scope>,
    ) -> Result<(ResolvedScope, Arc<dyn PagePort>), RegistryError> {
        let resolved = match self.resolve_scope_sync(scope.as_ref()) {
            Ok(resolved) => resolved,
            Err(RegistryError::NoScope) => {
                let (workspace, tab) = self.create_workspace().await?;
                ResolvedScope::new(workspace, tab)
            }
            Err(RegistryError::WorkspaceNotFound(_)) => {
                let workspace = scope
                    .as_ref()
                    .and_then(|s| s.workspace.clone())
                    .ok_or(RegistryError::NoScope)?;
                let tab = self.ensure_workspace(&workspace).await?;
                ResolvedScope::new(workspace, tab)
            }
            Err(RegistryError::TabNotFound(_)) => {
                // Workspace exists but has no tabs left.
                let workspace = scope
                    .as_ref()
                    .and_then(|s| s.workspace.clone())
                    .ok_or(RegistryError::NoScope)?;
                let tab = self.create_tab(&workspace).await?;
                ResolvedScope::new(workspace, tab)
            }
            Err(other) => return Err(other),
        };
        let ctx = self.tab_ctx(&resolved.tab)?;
        Ok((resolved, ctx.page))
    }

    fn resolve_scope_from_token(&self, token: &TabToken) -> Result<ResolvedScope, RegistryError> {
        self.tokens
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::TokenNotFound(token.0.clone()))
    }
}
