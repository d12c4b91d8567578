//! Explicit dependency wiring for adapters.
//!
//! One `AgentDeps` is constructed at process start and handed to every
//! adapter; there is no settable global. The active-workspace default lives
//! in `ScopeContext`, owned by the adapter layer — the kernel registry knows
//! nothing about it.

use std::sync::Arc;

use parking_lot::RwLock;
use runtime_bind::PageBinder;
use step_engine::Runner;
use tabweaver_core_types::{OpError, Scope, WorkspaceId};
use tabweaver_registry::Registry;

pub struct AgentDeps {
    pub registry: Arc<Registry>,
    pub binder: Arc<PageBinder>,
    pub runner: Runner,
}

impl AgentDeps {
    pub fn new(registry: Arc<Registry>, binder: Arc<PageBinder>, runner: Runner) -> Arc<Self> {
        Arc::new(Self {
            registry,
            binder,
            runner,
        })
    }
}

/// Adapter-owned default-resolution state: which workspace an unscoped call
/// lands on.
#[derive(Default)]
pub struct ScopeContext {
    active: RwLock<Option<WorkspaceId>>,
}

impl ScopeContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn active(&self) -> Option<WorkspaceId> {
        self.active.read().clone()
    }

    pub fn set_active(&self, workspace: WorkspaceId) {
        *self.active.write() = Some(workspace);
    }

    /// Workspace for a call: explicit scope first, then the active default,
    /// then a freshly created workspace which becomes the default.
    pub async fn resolve_workspace(
        &self,
        deps: &AgentDeps,
        scope: Option<&Scope>,
    ) -> Result<WorkspaceId, OpError> {
        if let Some(workspace) = scope.and_then(|s| s.workspace.clone()) {
            return Ok(workspace);
        }
        if let Some(workspace) = self.active() {
            return Ok(workspace);
        }
        let (workspace, _tab) = deps
            .registry
            .create_workspace()
            .await
            .map_err(|err| err.into_op_error())?;
        self.set_active(workspace.clone());
        Ok(workspace)
    }
}
