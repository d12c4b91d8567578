//! Workspace/tab/page registry: owns the mapping from opaque tab tokens to
//! live (workspace, tab, page) triples and keeps it honest across page
//! closures.

pub mod api;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod state;

pub use api::TabRoutes;
pub use errors::RegistryError;
pub use model::{TabCtx, WorkspaceCtx};
pub use state::{BindPolicy, CloseHook, Registry, WorkspaceView};
