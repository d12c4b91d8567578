use std::sync::Arc;
use std::time::Instant;

use page_port::PagePort;
use tabweaver_core_types::{TabId, TabToken, WorkspaceId};

/// Registry entry for one workspace.
#[derive(Clone)]
pub struct WorkspaceCtx {
    pub id: WorkspaceId,
    /// Member tabs; ordering carries no meaning, membership does.
    pub tabs: Vec<TabId>,
    pub active_tab: Option<TabId>,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl WorkspaceCtx {
    pub fn new(id: WorkspaceId) -> Self {
        let now = Instant::now();
        Self {
            id,
            tabs: Vec::new(),
            active_tab: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Instant::now();
    }
}

/// Registry entry for one tab; exclusively owns its page handle.
#[derive(Clone)]
pub struct TabCtx {
    pub id: TabId,
    pub workspace: WorkspaceId,
    pub token: TabToken,
    pub page: Arc<dyn PagePort>,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl TabCtx {
    pub fn new(workspace: WorkspaceId, token: TabToken, page: Arc<dyn PagePort>) -> (TabId, Self) {
        let id = TabId::new();
        let now = Instant::now();
        let ctx = Self {
            id: id.clone(),
            workspace,
            token,
            page,
            created_at: now,
            updated_at: now,
        };
        (id, ctx)
    }

    pub fn touch(&mut self) {
        self.updated_at = Instant::now();
    }
}
