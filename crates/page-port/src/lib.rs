//! Capability interface between the tabweaver kernel and a page engine.
//!
//! The kernel never talks to a concrete browser: it drives `PagePort` and
//! `LocatorPort` handles produced by a `PageFactory`. The `mock` module ships
//! an in-memory engine used by tests and the demo CLI.

mod error;
pub mod mock;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub use error::{PortError, PortErrorKind};
pub use types::{ElementSummary, LocatorSpec, MouseButton, PageInfo};

/// One live page surface.
///
/// All methods are cancel-safe from the caller's perspective: an operation
/// either completes or fails with a `PortError`; no method panics.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Stable identity of the underlying page handle; two bindings compare
    /// page identity through this value.
    fn id(&self) -> &str;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), PortError>;

    async fn info(&self) -> Result<PageInfo, PortError>;

    /// Raw accessibility tree snapshot as engine-shaped JSON.
    async fn ax_snapshot(&self) -> Result<Value, PortError>;

    /// Build a locator handle; cheap and infallible, matching happens lazily.
    fn locator(&self, spec: &LocatorSpec) -> Arc<dyn LocatorPort>;

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, PortError>;

    /// Page-level key press (delivered to the focused element).
    async fn press_key(&self, key: &str) -> Result<(), PortError>;

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), PortError>;
    async fn mouse_down(&self, x: f64, y: f64, button: MouseButton) -> Result<(), PortError>;
    async fn mouse_up(&self, x: f64, y: f64, button: MouseButton) -> Result<(), PortError>;
    async fn mouse_wheel(&self, x: f64, y: f64, delta_x: f64, delta_y: f64)
        -> Result<(), PortError>;

    /// Probe the page's session-scoped storage for a previously written tab
    /// token. Returns `None` when the page carries no token (yet).
    async fn read_session_token(&self) -> Result<Option<String>, PortError>;

    /// Close-notification channel; fires once when the page goes away.
    fn closed(&self) -> broadcast::Receiver<()>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), PortError>;
}

/// Lazily-matching element handle scoped to one page.
#[async_trait]
pub trait LocatorPort: Send + Sync {
    fn spec(&self) -> LocatorSpec;

    /// Number of elements the locator currently matches.
    async fn count(&self) -> Result<usize, PortError>;

    /// Summaries of up to `limit` matching elements, for diagnostics.
    async fn describe(&self, limit: usize) -> Result<Vec<ElementSummary>, PortError>;

    async fn click(&self, click_count: u32, timeout: Duration) -> Result<(), PortError>;
    async fn fill(&self, text: &str, timeout: Duration) -> Result<(), PortError>;
    async fn type_text(&self, text: &str, timeout: Duration) -> Result<(), PortError>;
    async fn hover(&self, timeout: Duration) -> Result<(), PortError>;
    async fn select_option(
        &self,
        values: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>, PortError>;
    async fn drag_to(&self, dest: &LocatorSpec, timeout: Duration) -> Result<(), PortError>;
    async fn scroll_into_view(&self, timeout: Duration) -> Result<(), PortError>;
    async fn wait_visible(&self, timeout: Duration) -> Result<(), PortError>;
    async fn focus(&self) -> Result<(), PortError>;
    async fn press(&self, key: &str, timeout: Duration) -> Result<(), PortError>;
}

/// Opens fresh pages; the registry's only way to create tabs.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open_page(&self) -> Result<Arc<dyn PagePort>, PortError>;
}
