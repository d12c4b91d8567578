//! The uniform operation wrapper and the fixed set of atomic page
//! operations. No raw engine error escapes this layer: every call yields a
//! normalized `OpError` and a start/end event pair.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use a11y_resolve::{adopt, resolve_hint, A11yHint, Adoption, AxNodeInfo, ResolveError};
use page_port::{MouseButton, PageInfo, PagePort, PortError, PortErrorKind};
use tabweaver_core_types::{OpError, StepId};

use crate::cache::AxCache;
use crate::event::{TraceEvent, TraceHooks, TraceSink, TraceTags};

/// Default waits applied to engine calls.
#[derive(Clone, Debug)]
pub struct WaitTimeouts {
    pub action: Duration,
    pub visible: Duration,
    pub navigate: Duration,
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            action: Duration::from_secs(5),
            visible: Duration::from_secs(5),
            navigate: Duration::from_secs(30),
        }
    }
}

/// Coordinate-level mouse actions exposed as one operation family.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MouseAction {
    Move { x: f64, y: f64 },
    Down { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Wheel { x: f64, y: f64, delta_x: f64, delta_y: f64 },
}

/// Normalize a raw engine error into the wire taxonomy. Ambiguity is also
/// detected from strict-mode style messages so engines that only signal it
/// textually still classify correctly.
pub fn classify_port_error(err: PortError) -> OpError {
    let message = err.message.clone();
    let lower = message.to_lowercase();
    if lower.contains("strict mode") || lower.contains("multiple elements") {
        let mut op = OpError::ambiguous(message);
        if let Some(hint) = err.hint {
            op = op.with_details(json!({ "hint": hint }));
        }
        return op;
    }
    match err.kind {
        PortErrorKind::Timeout => OpError::timeout(message),
        PortErrorKind::TargetNotFound => OpError::not_found(message),
        PortErrorKind::AmbiguousTarget => OpError::ambiguous(message),
        PortErrorKind::NotInteractable => OpError::not_interactable(message),
        PortErrorKind::Closed | PortErrorKind::Io => OpError::unknown(message),
    }
}

fn port<T>(res: Result<T, PortError>) -> Result<T, OpError> {
    res.map_err(classify_port_error)
}

/// Page operations bound to one live page, tagged with their workspace and
/// token so every emitted event is attributable.
pub struct TraceTools {
    page: Arc<dyn PagePort>,
    tags: TraceTags,
    sinks: Vec<Arc<dyn TraceSink>>,
    hooks: TraceHooks,
    cache: Mutex<AxCache>,
    wait: WaitTimeouts,
}

impl TraceTools {
    pub fn new(
        page: Arc<dyn PagePort>,
        tags: TraceTags,
        sinks: Vec<Arc<dyn TraceSink>>,
        hooks: TraceHooks,
        wait: WaitTimeouts,
    ) -> Arc<Self> {
        Arc::new(Self {
            page,
            tags,
            sinks,
            hooks,
            cache: Mutex::new(AxCache::new()),
            wait,
        })
    }

    pub fn page(&self) -> &Arc<dyn PagePort> {
        &self.page
    }

    pub fn tags(&self) -> &TraceTags {
        &self.tags
    }

    pub fn snapshot_generation(&self) -> u64 {
        self.cache.lock().generation()
    }

    fn emit(&self, event: &TraceEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }

    /// Run one operation through the uniform wrapper: start event, execute,
    /// end event with duration and either a result summary or a normalized
    /// error. The future returns its data plus the event-visible summary.
    pub async fn traced<T, F>(&self, op: &str, args: Value, fut: F) -> Result<T, OpError>
    where
        F: Future<Output = Result<(T, Value), OpError>>,
    {
        let started = Instant::now();
        let start = TraceEvent::OpStart {
            ts: Utc::now(),
            op: op.to_string(),
            args,
            tags: self.tags.clone(),
        };
        if let Some(hook) = &self.hooks.before_op {
            hook(&start);
        }
        self.emit(&start);

        let outcome = fut.await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((data, summary)) => {
                let end = TraceEvent::OpEnd {
                    ts: Utc::now(),
                    op: op.to_string(),
                    ok: true,
                    duration_ms,
                    result: Some(summary),
                    error: None,
                    tags: self.tags.clone(),
                };
                self.emit(&end);
                if let Some(hook) = &self.hooks.after_op {
                    hook(&end);
                }
                Ok(data)
            }
            Err(error) => {
                let end = TraceEvent::OpEnd {
                    ts: Utc::now(),
                    op: op.to_string(),
                    ok: false,
                    duration_ms,
                    result: None,
                    error: Some(error.clone()),
                    tags: self.tags.clone(),
                };
                self.emit(&end);
                if let Some(hook) = &self.hooks.after_op {
                    hook(&end);
                }
                if let Some(hook) = &self.hooks.on_error {
                    hook(&end);
                }
                Err(error)
            }
        }
    }

    pub fn emit_step_start(&self, step_id: &StepId, kind: &str) {
        self.emit(&TraceEvent::StepStart {
            ts: Utc::now(),
            step_id: step_id.clone(),
            kind: kind.to_string(),
            tags: self.tags.clone(),
        });
    }

    pub fn emit_step_end(
        &self,
        step_id: &StepId,
        kind: &str,
        ok: bool,
        duration_ms: u64,
        error: Option<&OpError>,
    ) {
        self.emit(&TraceEvent::StepEnd {
            ts: Utc::now(),
            step_id: step_id.clone(),
            kind: kind.to_string(),
            ok,
            duration_ms,
            error: error.cloned(),
            tags: self.tags.clone(),
        });
    }

    /// Look up a cached node and adopt it into a verified live locator.
    async fn adopt_node(&self, node_id: &str) -> Result<Adoption, OpError> {
        let info = self.cached_node(node_id)?;
        adopt(&self.page, &info)
            .await
            .map_err(ResolveError::into_op_error)
    }

    fn cached_node(&self, node_id: &str) -> Result<AxNodeInfo, OpError> {
        let cache = self.cache.lock();
        if !cache.has_snapshot() {
            return Err(OpError::not_found(
                "no accessibility snapshot captured for this page yet",
            ));
        }
        cache
            .node(node_id)
            .ok_or_else(|| ResolveError::UnknownNodeId(node_id.to_string()).into_op_error())
    }

    // --- operations -------------------------------------------------------

    /// Navigate and report the resulting page identity. Ids from earlier
    /// snapshots cannot survive a cross-document load, so the cache is
    /// cleared here.
    pub async fn navigate(&self, url: &str) -> Result<PageInfo, OpError> {
        self.traced("page.navigate", json!({ "url": url }), async {
            port(self.page.goto(url, self.wait.navigate).await)?;
            self.cache.lock().clear();
            let info = port(self.page.info().await)?;
            let summary = json!({ "url": info.url, "title": info.title });
            Ok((info, summary))
        })
        .await
    }

    pub async fn page_info(&self) -> Result<PageInfo, OpError> {
        self.traced("page.info", Value::Null, async {
            let info = port(self.page.info().await)?;
            let summary = json!({ "url": info.url, "title": info.title });
            Ok((info, summary))
        })
        .await
    }

    /// Capture the accessibility tree, (re)build the node index and cache
    /// it. This is the single place the cache is populated.
    pub async fn ax_snapshot(&self) -> Result<Value, OpError> {
        self.traced("a11y.snapshot", Value::Null, async {
            let tree = port(self.page.ax_snapshot().await)?;
            let index = a11y_resolve::index_tree(&tree);
            let nodes = index.len();
            let generation = self.cache.lock().install(index);
            debug!(nodes, generation, "accessibility snapshot cached");
            Ok((tree, json!({ "nodes": nodes, "generation": generation })))
        })
        .await
    }

    /// Resolve a hint against the cached snapshot to exactly one node id.
    pub async fn resolve_hint_node(&self, hint: &A11yHint) -> Result<String, OpError> {
        self.traced("a11y.resolve", json!({ "hint": hint }), async {
            let cache = self.cache.lock();
            let index = cache.index().ok_or_else(|| {
                OpError::not_found("no accessibility snapshot captured for this page yet")
            })?;
            let node = resolve_hint(index, hint).map_err(ResolveError::into_op_error)?;
            let id = node.id.clone();
            drop(cache);
            Ok((id.clone(), json!({ "nodeId": id })))
        })
        .await
    }

    pub async fn click_node(&self, node_id: &str, click_count: u32) -> Result<(), OpError> {
        self.traced(
            "dom.click",
            json!({ "nodeId": node_id, "clickCount": click_count }),
            async {
                let adoption = self.adopt_node(node_id).await?;
                port(adoption.locator.click(click_count, self.wait.action).await)?;
                Ok(((), json!({ "nodeId": node_id })))
            },
        )
        .await
    }

    pub async fn fill_node(&self, node_id: &str, value: &str) -> Result<(), OpError> {
        self.traced(
            "dom.fill",
            json!({ "nodeId": node_id, "value": value }),
            async {
                let adoption = self.adopt_node(node_id).await?;
                port(adoption.locator.fill(value, self.wait.action).await)?;
                Ok(((), json!({ "nodeId": node_id })))
            },
        )
        .await
    }

    pub async fn type_node(&self, node_id: &str, text: &str) -> Result<(), OpError> {
        self.traced(
            "dom.type",
            json!({ "nodeId": node_id, "text": text }),
            async {
                let adoption = self.adopt_node(node_id).await?;
                port(adoption.locator.type_text(text, self.wait.action).await)?;
                Ok(((), json!({ "nodeId": node_id })))
            },
        )
        .await
    }

    pub async fn focus_node(&self, node_id: &str) -> Result<(), OpError> {
        self.traced("dom.focus", json!({ "nodeId": node_id }), async {
            let adoption = self.adopt_node(node_id).await?;
            port(adoption.locator.focus().await)?;
            Ok(((), json!({ "nodeId": node_id })))
        })
        .await
    }

    pub async fn hover_node(&self, node_id: &str) -> Result<(), OpError> {
        self.traced("dom.hover", json!({ "nodeId": node_id }), async {
            let adoption = self.adopt_node(node_id).await?;
            port(adoption.locator.hover(self.wait.action).await)?;
            Ok(((), json!({ "nodeId": node_id })))
        })
        .await
    }

    pub async fn scroll_node_into_view(&self, node_id: &str) -> Result<(), OpError> {
        self.traced("dom.scrollIntoView", json!({ "nodeId": node_id }), async {
            let adoption = self.adopt_node(node_id).await?;
            port(adoption.locator.scroll_into_view(self.wait.action).await)?;
            Ok(((), json!({ "nodeId": node_id })))
        })
        .await
    }

    pub async fn wait_node_visible(&self, node_id: &str) -> Result<(), OpError> {
        self.traced("dom.waitVisible", json!({ "nodeId": node_id }), async {
            let adoption = self.adopt_node(node_id).await?;
            port(adoption.locator.wait_visible(self.wait.visible).await)?;
            Ok(((), json!({ "nodeId": node_id })))
        })
        .await
    }

    pub async fn select_node_option(
        &self,
        node_id: &str,
        values: &[String],
    ) -> Result<Vec<String>, OpError> {
        self.traced(
            "dom.selectOption",
            json!({ "nodeId": node_id, "values": values }),
            async {
                let adoption = self.adopt_node(node_id).await?;
                let selected =
                    port(adoption.locator.select_option(values, self.wait.action).await)?;
                let summary = json!({ "nodeId": node_id, "selected": selected });
                Ok((selected, summary))
            },
        )
        .await
    }

    pub async fn drag_node(&self, source_id: &str, dest_id: &str) -> Result<(), OpError> {
        self.traced(
            "dom.dragAndDrop",
            json!({ "sourceId": source_id, "destId": dest_id }),
            async {
                let source = self.adopt_node(source_id).await?;
                let dest = self.adopt_node(dest_id).await?;
                port(source.locator.drag_to(&dest.spec, self.wait.action).await)?;
                Ok(((), json!({ "sourceId": source_id, "destId": dest_id })))
            },
        )
        .await
    }

    pub async fn press_node_key(&self, node_id: &str, key: &str) -> Result<(), OpError> {
        self.traced(
            "dom.press",
            json!({ "nodeId": node_id, "key": key }),
            async {
                let adoption = self.adopt_node(node_id).await?;
                port(adoption.locator.press(key, self.wait.action).await)?;
                Ok(((), json!({ "nodeId": node_id, "key": key })))
            },
        )
        .await
    }

    /// Page-level key press, delivered to whatever currently holds focus.
    pub async fn press_key(&self, key: &str) -> Result<(), OpError> {
        self.traced("input.press", json!({ "key": key }), async {
            port(self.page.press_key(key).await)?;
            Ok(((), json!({ "key": key })))
        })
        .await
    }

    pub async fn mouse(&self, action: MouseAction) -> Result<(), OpError> {
        let args = serde_json::to_value(&action).unwrap_or(Value::Null);
        self.traced("input.mouse", args.clone(), async {
            match action {
                MouseAction::Move { x, y } => port(self.page.mouse_move(x, y).await)?,
                MouseAction::Down { x, y } => {
                    port(self.page.mouse_down(x, y, MouseButton::Left).await)?
                }
                MouseAction::Up { x, y } => {
                    port(self.page.mouse_up(x, y, MouseButton::Left).await)?
                }
                MouseAction::Wheel {
                    x,
                    y,
                    delta_x,
                    delta_y,
                } => port(self.page.mouse_wheel(x, y, delta_x, delta_y).await)?,
            }
            Ok(((), args))
        })
        .await
    }

    pub async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, OpError> {
        self.traced(
            "page.screenshot",
            json!({ "fullPage": full_page }),
            async {
                let bytes = port(self.page.screenshot(full_page).await)?;
                let summary = json!({ "bytes": bytes.len() });
                Ok((bytes, summary))
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceHooks;
    use page_port::mock::{Fixture, MemoryElement, MemoryPage};
    use tabweaver_core_types::{ErrorCode, TabToken, WorkspaceId};

    #[derive(Default)]
    struct CollectSink {
        events: Mutex<Vec<TraceEvent>>,
    }

    impl TraceSink for CollectSink {
        fn emit(&self, event: &TraceEvent) {
            self.events.lock().push(event.clone());
        }
    }

    fn tools_for(page: MemoryPage) -> (Arc<TraceTools>, Arc<CollectSink>) {
        let sink = Arc::new(CollectSink::default());
        let tools = TraceTools::new(
            Arc::new(page),
            TraceTags {
                workspace: WorkspaceId::new(),
                token: TabToken::mint(),
            },
            vec![sink.clone() as Arc<dyn TraceSink>],
            TraceHooks::default(),
            WaitTimeouts {
                action: Duration::from_millis(200),
                visible: Duration::from_millis(50),
                navigate: Duration::from_millis(200),
            },
        );
        (tools, sink)
    }

    fn form_page() -> MemoryPage {
        let page = MemoryPage::new();
        page.load_fixture(
            "https://example.test/form",
            &Fixture::new("Form")
                .with_element(MemoryElement::new("button", "button", "Save"))
                .with_element(MemoryElement::new("input", "textbox", "Name")),
        );
        page
    }

    #[tokio::test]
    async fn wrapper_emits_start_and_end_pair() {
        let (tools, sink) = tools_for(form_page());
        tools.page_info().await.unwrap();
        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TraceEvent::OpStart { .. }));
        match &events[1] {
            TraceEvent::OpEnd { ok, op, .. } => {
                assert!(ok);
                assert_eq!(op, "page.info");
            }
            other => panic!("expected OpEnd, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_are_normalized_not_thrown() {
        let (tools, sink) = tools_for(form_page());
        tools.ax_snapshot().await.unwrap();
        let err = tools.click_node("n0.99", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let events = sink.events.lock();
        match events.last().unwrap() {
            TraceEvent::OpEnd { ok, error, .. } => {
                assert!(!ok);
                assert_eq!(error.as_ref().unwrap().code, ErrorCode::NotFound);
            }
            other => panic!("expected OpEnd, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strict_mode_messages_classify_as_ambiguous() {
        let err = classify_port_error(PortError::io(
            "strict mode violation: locator resolved to 3 elements",
        ));
        assert_eq!(err.code, ErrorCode::Ambiguous);
    }

    #[tokio::test]
    async fn snapshot_then_click_by_resolved_hint() {
        let (tools, _) = tools_for(form_page());
        tools.ax_snapshot().await.unwrap();
        let id = tools
            .resolve_hint_node(&A11yHint::role_name("button", "Save"))
            .await
            .unwrap();
        tools.click_node(&id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn hint_resolution_requires_snapshot() {
        let (tools, _) = tools_for(form_page());
        let err = tools
            .resolve_hint_node(&A11yHint::role_name("button", "Save"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn navigation_invalidates_cached_node_ids() {
        let (tools, _) = tools_for(form_page());
        tools.ax_snapshot().await.unwrap();
        let id = tools
            .resolve_hint_node(&A11yHint::role_name("button", "Save"))
            .await
            .unwrap();
        tools.navigate("about:blank").await.unwrap();
        let err = tools.click_node(&id, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn hooks_fire_on_error() {
        let page = form_page();
        let fired = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&fired);
        let hooks = TraceHooks {
            on_error: Some(Arc::new(move |_event| {
                *counter.lock() += 1;
            })),
            ..Default::default()
        };
        let tools = TraceTools::new(
            Arc::new(page),
            TraceTags {
                workspace: WorkspaceId::new(),
                token: TabToken::mint(),
            },
            Vec::new(),
            hooks,
            WaitTimeouts::default(),
        );
        let _ = tools.click_node("n0.0", 1).await;
        assert_eq!(*fired.lock(), 1);
    }
}
