//! In-memory page engine for tests and the demo CLI.
//!
//! Pages hold a flat-ish element tree loaded from URL-keyed fixtures; locator
//! matching reproduces live-engine semantics, including strict-mode ambiguity
//! when a single-element action resolves to multiple matches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    ElementSummary, LocatorPort, LocatorSpec, MouseButton, PageFactory, PageInfo, PagePort,
    PortError,
};

const VISIBLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One node of the mock page's element tree.
#[derive(Clone, Debug)]
pub struct MemoryElement {
    pub tag: String,
    pub role: String,
    pub name: String,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub children: Vec<MemoryElement>,
}

impl MemoryElement {
    pub fn new(
        tag: impl Into<String>,
        role: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            role: role.into(),
            name: name.into(),
            text: String::new(),
            value: String::new(),
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_child(mut self, child: MemoryElement) -> Self {
        self.children.push(child);
        self
    }
}

/// Document loaded into a page when it navigates to the fixture's URL.
#[derive(Clone, Debug, Default)]
pub struct Fixture {
    pub title: String,
    pub elements: Vec<MemoryElement>,
}

impl Fixture {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: MemoryElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    title: String,
    elements: Vec<MemoryElement>,
    session_token: Option<String>,
    closed: bool,
    last_click: Option<String>,
    last_key: Option<String>,
    focused: Option<String>,
    hovered: Option<String>,
    event_log: Vec<String>,
}

struct PageInner {
    id: String,
    state: Mutex<PageState>,
    close_tx: broadcast::Sender<()>,
    fixtures: Arc<RwLock<HashMap<String, Fixture>>>,
}

/// Mock page handle; cheap to clone, all clones share state.
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<PageInner>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::with_fixtures(Arc::new(RwLock::new(HashMap::new())))
    }

    fn with_fixtures(fixtures: Arc<RwLock<HashMap<String, Fixture>>>) -> Self {
        let (close_tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(PageInner {
                id: Uuid::new_v4().to_string(),
                state: Mutex::new(PageState::default()),
                close_tx,
                fixtures,
            }),
        }
    }

    pub fn set_session_token(&self, token: impl Into<String>) {
        self.inner.state.lock().session_token = Some(token.into());
    }

    pub fn load_fixture(&self, url: impl Into<String>, fixture: &Fixture) {
        let mut state = self.inner.state.lock();
        state.url = url.into();
        state.title = fixture.title.clone();
        state.elements = fixture.elements.clone();
    }

    pub fn url(&self) -> String {
        self.inner.state.lock().url.clone()
    }

    pub fn last_click(&self) -> Option<String> {
        self.inner.state.lock().last_click.clone()
    }

    pub fn last_key(&self) -> Option<String> {
        self.inner.state.lock().last_key.clone()
    }

    pub fn focused(&self) -> Option<String> {
        self.inner.state.lock().focused.clone()
    }

    pub fn event_log(&self) -> Vec<String> {
        self.inner.state.lock().event_log.clone()
    }

    /// Value of the first element whose name matches, if any.
    pub fn element_value(&self, name: &str) -> Option<String> {
        let state = self.inner.state.lock();
        find_by_name(&state.elements, name).map(|el| el.value.clone())
    }

    pub fn set_element_visible(&self, name: &str, visible: bool) {
        let mut state = self.inner.state.lock();
        if let Some(el) = find_by_name_mut(&mut state.elements, name) {
            el.visible = visible;
        }
    }

    fn guard_open(&self) -> Result<(), PortError> {
        if self.inner.state.lock().closed {
            Err(PortError::closed("page is closed"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

fn find_by_name<'a>(elements: &'a [MemoryElement], name: &str) -> Option<&'a MemoryElement> {
    for el in elements {
        if el.name == name {
            return Some(el);
        }
        if let Some(found) = find_by_name(&el.children, name) {
            return Some(found);
        }
    }
    None
}

fn find_by_name_mut<'a>(
    elements: &'a mut [MemoryElement],
    name: &str,
) -> Option<&'a mut MemoryElement> {
    for el in elements.iter_mut() {
        if el.name == name {
            return Some(el);
        }
        if let Some(found) = find_by_name_mut(&mut el.children, name) {
            return Some(found);
        }
    }
    None
}

fn fold(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn matches_spec(el: &MemoryElement, spec: &LocatorSpec) -> bool {
    match spec {
        LocatorSpec::Role {
            role,
            name,
            exact_name,
        } => {
            if !el.role.eq_ignore_ascii_case(role) {
                return false;
            }
            match name {
                None => true,
                Some(wanted) => {
                    let have = fold(&el.name);
                    let want = fold(wanted);
                    if *exact_name {
                        have == want
                    } else {
                        have.contains(&want)
                    }
                }
            }
        }
        LocatorSpec::Text { text, exact } => {
            let want = fold(text);
            let name = fold(&el.name);
            let body = fold(&el.text);
            if *exact {
                name == want || body == want
            } else {
                name.contains(&want) || body.contains(&want)
            }
        }
    }
}

fn collect_paths(
    elements: &[MemoryElement],
    spec: &LocatorSpec,
    base: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    for (idx, el) in elements.iter().enumerate() {
        base.push(idx);
        if matches_spec(el, spec) {
            out.push(base.clone());
        }
        collect_paths(&el.children, spec, base, out);
        base.pop();
    }
}

fn element_at_mut<'a>(
    elements: &'a mut Vec<MemoryElement>,
    path: &[usize],
) -> Option<&'a mut MemoryElement> {
    let (&first, rest) = path.split_first()?;
    let el = elements.get_mut(first)?;
    if rest.is_empty() {
        Some(el)
    } else {
        element_at_mut(&mut el.children, rest)
    }
}

fn element_at<'a>(elements: &'a [MemoryElement], path: &[usize]) -> Option<&'a MemoryElement> {
    let (&first, rest) = path.split_first()?;
    let el = elements.get(first)?;
    if rest.is_empty() {
        Some(el)
    } else {
        element_at(&el.children, rest)
    }
}

fn ax_node(el: &MemoryElement) -> Value {
    let mut node = json!({
        "role": el.role,
        "name": el.name,
    });
    if !el.text.is_empty() {
        node["description"] = Value::String(el.text.clone());
    }
    if !el.value.is_empty() {
        node["value"] = Value::String(el.value.clone());
    }
    if !el.children.is_empty() {
        node["children"] = Value::Array(el.children.iter().map(ax_node).collect());
    }
    node
}

#[async_trait]
impl PagePort for MemoryPage {
    fn id(&self) -> &str {
        &self.inner.id
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), PortError> {
        self.guard_open()?;
        let fixture = self.inner.fixtures.read().get(url).cloned();
        let mut state = self.inner.state.lock();
        state.url = url.to_string();
        match fixture {
            Some(fixture) => {
                state.title = fixture.title;
                state.elements = fixture.elements;
            }
            None => {
                state.title = String::from("Untitled");
                state.elements = Vec::new();
            }
        }
        state.event_log.push(format!("goto {url}"));
        Ok(())
    }

    async fn info(&self) -> Result<PageInfo, PortError> {
        self.guard_open()?;
        let state = self.inner.state.lock();
        Ok(PageInfo {
            url: state.url.clone(),
            title: state.title.clone(),
        })
    }

    async fn ax_snapshot(&self) -> Result<Value, PortError> {
        self.guard_open()?;
        let state = self.inner.state.lock();
        Ok(json!({
            "role": "WebArea",
            "name": state.title,
            "children": state.elements.iter().map(ax_node).collect::<Vec<_>>(),
        }))
    }

    fn locator(&self, spec: &LocatorSpec) -> Arc<dyn LocatorPort> {
        Arc::new(MemoryLocator {
            inner: Arc::clone(&self.inner),
            spec: spec.clone(),
        })
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, PortError> {
        self.guard_open()?;
        let state = self.inner.state.lock();
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(state.url.as_bytes());
        if full_page {
            bytes.extend_from_slice(b"+full");
        }
        Ok(bytes)
    }

    async fn press_key(&self, key: &str) -> Result<(), PortError> {
        self.guard_open()?;
        let mut state = self.inner.state.lock();
        state.last_key = Some(key.to_string());
        state.event_log.push(format!("press {key}"));
        Ok(())
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), PortError> {
        self.guard_open()?;
        self.inner
            .state
            .lock()
            .event_log
            .push(format!("mouse_move {x},{y}"));
        Ok(())
    }

    async fn mouse_down(&self, x: f64, y: f64, button: MouseButton) -> Result<(), PortError> {
        self.guard_open()?;
        self.inner
            .state
            .lock()
            .event_log
            .push(format!("mouse_down {x},{y} {button:?}"));
        Ok(())
    }

    async fn mouse_up(&self, x: f64, y: f64, button: MouseButton) -> Result<(), PortError> {
        self.guard_open()?;
        self.inner
            .state
            .lock()
            .event_log
            .push(format!("mouse_up {x},{y} {button:?}"));
        Ok(())
    }

    async fn mouse_wheel(
        &self,
        x: f64,
        y: f64,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<(), PortError> {
        self.guard_open()?;
        self.inner
            .state
            .lock()
            .event_log
            .push(format!("mouse_wheel {x},{y} d=({delta_x},{delta_y})"));
        Ok(())
    }

    async fn read_session_token(&self) -> Result<Option<String>, PortError> {
        self.guard_open()?;
        Ok(self.inner.state.lock().session_token.clone())
    }

    fn closed(&self) -> broadcast::Receiver<()> {
        self.inner.close_tx.subscribe()
    }

    fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    async fn close(&self) -> Result<(), PortError> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.event_log.push("close".to_string());
        drop(state);
        let _ = self.inner.close_tx.send(());
        Ok(())
    }
}

struct MemoryLocator {
    inner: Arc<PageInner>,
    spec: LocatorSpec,
}

impl MemoryLocator {
    fn paths(&self) -> Result<Vec<Vec<usize>>, PortError> {
        let state = self.inner.state.lock();
        if state.closed {
            return Err(PortError::closed("page is closed"));
        }
        let mut out = Vec::new();
        collect_paths(&state.elements, &self.spec, &mut Vec::new(), &mut out);
        Ok(out)
    }

    /// Enforce single-element semantics the way a strict live engine does.
    fn single_path(&self) -> Result<Vec<usize>, PortError> {
        let mut paths = self.paths()?;
        match paths.len() {
            0 => Err(PortError::not_found(format!(
                "no element matches locator {}",
                self.spec
            ))),
            1 => Ok(paths.remove(0)),
            n => Err(PortError::ambiguous(format!(
                "strict mode violation: locator {} resolved to {n} elements",
                self.spec
            ))),
        }
    }

    fn with_single<T>(
        &self,
        f: impl FnOnce(&mut PageState, &[usize]) -> T,
    ) -> Result<T, PortError> {
        let path = self.single_path()?;
        let mut state = self.inner.state.lock();
        Ok(f(&mut state, &path))
    }
}

#[async_trait]
impl LocatorPort for MemoryLocator {
    fn spec(&self) -> LocatorSpec {
        self.spec.clone()
    }

    async fn count(&self) -> Result<usize, PortError> {
        Ok(self.paths()?.len())
    }

    async fn describe(&self, limit: usize) -> Result<Vec<ElementSummary>, PortError> {
        let paths = self.paths()?;
        let state = self.inner.state.lock();
        Ok(paths
            .iter()
            .take(limit)
            .filter_map(|path| element_at(&state.elements, path))
            .map(|el| {
                let text = if el.text.is_empty() { &el.name } else { &el.text };
                ElementSummary {
                    tag: el.tag.clone(),
                    text: text.chars().take(40).collect(),
                }
            })
            .collect())
    }

    async fn click(&self, click_count: u32, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            let name = element_at_mut(&mut state.elements, path).map(|el| el.name.clone());
            if let Some(name) = name {
                state.last_click = Some(name.clone());
                for _ in 0..click_count.max(1) {
                    state.event_log.push(format!("click {name}"));
                }
            }
        })
    }

    async fn fill(&self, text: &str, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at_mut(&mut state.elements, path) {
                el.value = text.to_string();
                let name = el.name.clone();
                state.event_log.push(format!("fill {name}={text}"));
            }
        })
    }

    async fn type_text(&self, text: &str, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at_mut(&mut state.elements, path) {
                el.value.push_str(text);
                let name = el.name.clone();
                state.event_log.push(format!("type {name}+={text}"));
            }
        })
    }

    async fn hover(&self, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at_mut(&mut state.elements, path) {
                state.hovered = Some(el.name.clone());
            }
        })
    }

    async fn select_option(
        &self,
        values: &[String],
        _timeout: Duration,
    ) -> Result<Vec<String>, PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at_mut(&mut state.elements, path) {
                el.value = values.join(",");
                let name = el.name.clone();
                state
                    .event_log
                    .push(format!("select {name}={}", el.value));
            }
            values.to_vec()
        })
    }

    async fn drag_to(&self, dest: &LocatorSpec, _timeout: Duration) -> Result<(), PortError> {
        let src_path = self.single_path()?;
        let dest_locator = MemoryLocator {
            inner: Arc::clone(&self.inner),
            spec: dest.clone(),
        };
        let dest_path = dest_locator.single_path()?;
        let mut state = self.inner.state.lock();
        let src = element_at(&state.elements, &src_path)
            .map(|el| el.name.clone())
            .unwrap_or_default();
        let dst = element_at(&state.elements, &dest_path)
            .map(|el| el.name.clone())
            .unwrap_or_default();
        state.event_log.push(format!("drag {src} -> {dst}"));
        Ok(())
    }

    async fn scroll_into_view(&self, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at(&state.elements, path) {
                let name = el.name.clone();
                state.event_log.push(format!("scroll_into_view {name}"));
            }
        })
    }

    async fn wait_visible(&self, timeout: Duration) -> Result<(), PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            let path = self.single_path()?;
            {
                let state = self.inner.state.lock();
                if let Some(el) = element_at(&state.elements, &path) {
                    if el.visible {
                        return Ok(());
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(PortError::timeout(format!(
                    "timed out waiting for {} to become visible",
                    self.spec
                )));
            }
            tokio::time::sleep(VISIBLE_POLL_INTERVAL).await;
        }
    }

    async fn focus(&self) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at(&state.elements, path) {
                state.focused = Some(el.name.clone());
            }
        })
    }

    async fn press(&self, key: &str, _timeout: Duration) -> Result<(), PortError> {
        self.with_single(|state, path| {
            if let Some(el) = element_at(&state.elements, path) {
                let name = el.name.clone();
                state.last_key = Some(key.to_string());
                state.event_log.push(format!("press {name} {key}"));
            }
        })
    }
}

/// Factory producing `MemoryPage`s that share one fixture table.
pub struct MemoryBrowser {
    fixtures: Arc<RwLock<HashMap<String, Fixture>>>,
    pages: Mutex<Vec<MemoryPage>>,
}

impl MemoryBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fixtures: Arc::new(RwLock::new(HashMap::new())),
            pages: Mutex::new(Vec::new()),
        })
    }

    pub fn add_fixture(&self, url: impl Into<String>, fixture: Fixture) {
        self.fixtures.write().insert(url.into(), fixture);
    }

    /// Pages opened so far, in creation order.
    pub fn pages(&self) -> Vec<MemoryPage> {
        self.pages.lock().clone()
    }
}

#[async_trait]
impl PageFactory for MemoryBrowser {
    async fn open_page(&self) -> Result<Arc<dyn PagePort>, PortError> {
        let page = MemoryPage::with_fixtures(Arc::clone(&self.fixtures));
        self.pages.lock().push(page.clone());
        Ok(Arc::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortErrorKind;

    fn form_fixture() -> Fixture {
        Fixture::new("Form")
            .with_element(MemoryElement::new("button", "button", "Save"))
            .with_element(
                MemoryElement::new("input", "textbox", "Name").with_value("old"),
            )
            .with_element(MemoryElement::new("button", "button", "Delete"))
            .with_element(MemoryElement::new("button", "button", "Delete"))
    }

    async fn page_with_form() -> MemoryPage {
        let page = MemoryPage::new();
        page.load_fixture("https://example.test/form", &form_fixture());
        page
    }

    #[tokio::test]
    async fn role_locator_clicks_unique_match() {
        let page = page_with_form().await;
        let locator = page.locator(&LocatorSpec::Role {
            role: "button".into(),
            name: Some("Save".into()),
            exact_name: true,
        });
        locator.click(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.last_click().as_deref(), Some("Save"));
    }

    #[tokio::test]
    async fn ambiguous_click_is_strict_mode_error() {
        let page = page_with_form().await;
        let locator = page.locator(&LocatorSpec::Role {
            role: "button".into(),
            name: Some("Delete".into()),
            exact_name: true,
        });
        assert_eq!(locator.count().await.unwrap(), 2);
        let err = locator.click(1, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind, PortErrorKind::AmbiguousTarget);
        assert!(err.message.contains("strict mode"));
    }

    #[tokio::test]
    async fn fill_replaces_and_type_appends() {
        let page = page_with_form().await;
        let locator = page.locator(&LocatorSpec::Role {
            role: "textbox".into(),
            name: Some("Name".into()),
            exact_name: true,
        });
        locator.fill("alice", Duration::from_secs(1)).await.unwrap();
        locator.type_text("!", Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.element_value("Name").as_deref(), Some("alice!"));
    }

    #[tokio::test]
    async fn wait_visible_times_out_for_hidden_element() {
        let page = MemoryPage::new();
        page.load_fixture(
            "about:blank",
            &Fixture::new("Hidden").with_element(
                MemoryElement::new("div", "dialog", "Modal").hidden(),
            ),
        );
        let locator = page.locator(&LocatorSpec::Role {
            role: "dialog".into(),
            name: Some("Modal".into()),
            exact_name: true,
        });
        let err = locator
            .wait_visible(Duration::from_millis(40))
            .await
            .unwrap_err();
        assert_eq!(err.kind, PortErrorKind::Timeout);
    }

    #[tokio::test]
    async fn close_notifies_subscribers_and_rejects_ops() {
        let page = MemoryPage::new();
        let mut closed = page.closed();
        page.close().await.unwrap();
        closed.recv().await.unwrap();
        let err = page.info().await.unwrap_err();
        assert_eq!(err.kind, PortErrorKind::Closed);
    }

    #[tokio::test]
    async fn factory_pages_share_fixtures() {
        let browser = MemoryBrowser::new();
        browser.add_fixture("https://example.test/form", form_fixture());
        let page = browser.open_page().await.unwrap();
        page.goto("https://example.test/form", Duration::from_secs(1))
            .await
            .unwrap();
        let info = page.info().await.unwrap();
        assert_eq!(info.title, "Form");
        assert_eq!(browser.pages().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_nests_children() {
        let page = MemoryPage::new();
        page.load_fixture(
            "about:blank",
            &Fixture::new("Nested").with_element(
                MemoryElement::new("nav", "navigation", "Main")
                    .with_child(MemoryElement::new("a", "link", "Home")),
            ),
        );
        let tree = page.ax_snapshot().await.unwrap();
        assert_eq!(tree["children"][0]["children"][0]["name"], "Home");
    }
}
