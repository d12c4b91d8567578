use std::sync::Arc;

use async_trait::async_trait;
use page_port::PagePort;
use tabweaver_core_types::{ResolvedScope, Scope, TabToken};

use crate::errors::RegistryError;

/// Scope routing seam consumed by adapters and the binding layer.
#[async_trait]
pub trait TabRoutes: Send + Sync {
    /// Resolve an explicit scope; never creates anything.
    async fn resolve_scope(&self, scope: Option<Scope>) -> Result<ResolvedScope, RegistryError>;

    /// Resolve a scope to a usable page, lazily creating a workspace/tab when
    /// none exists yet.
    async fn resolve_page(
        self: Arc<Self>,
        scope: Option<Scope>,
    ) -> Result<(ResolvedScope, Arc<dyn PagePort>), RegistryError>;

    /// Reverse lookup from an opaque tab token.
    fn resolve_scope_from_token(&self, token: &TabToken) -> Result<ResolvedScope, RegistryError>;
}
