//! Trace event shapes, sinks and hooks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tabweaver_core_types::{OpError, StepId, TabToken, WorkspaceId};
use tabweaver_event_bus::BroadcastBus;

/// Attribution carried by every event; this is what lets one sink tell
/// concurrent workspaces apart.
#[derive(Clone, Debug, Serialize)]
pub struct TraceTags {
    pub workspace: WorkspaceId,
    pub token: TabToken,
}

/// Structured start/end record of one atomic page operation or step.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    OpStart {
        ts: DateTime<Utc>,
        op: String,
        args: Value,
        tags: TraceTags,
    },
    OpEnd {
        ts: DateTime<Utc>,
        op: String,
        ok: bool,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<OpError>,
        tags: TraceTags,
    },
    StepStart {
        ts: DateTime<Utc>,
        step_id: StepId,
        kind: String,
        tags: TraceTags,
    },
    StepEnd {
        ts: DateTime<Utc>,
        step_id: StepId,
        kind: String,
        ok: bool,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<OpError>,
        tags: TraceTags,
    },
}

/// Destination for trace events; must not block or panic.
pub trait TraceSink: Send + Sync {
    fn emit(&self, event: &TraceEvent);
}

/// Sink writing events to the `trace` tracing target as JSON lines.
pub struct LogSink;

impl TraceSink for LogSink {
    fn emit(&self, event: &TraceEvent) {
        match serde_json::to_string(event) {
            Ok(line) => tracing::debug!(target: "trace", "{line}"),
            Err(err) => tracing::warn!(target: "trace", "unserializable trace event: {err}"),
        }
    }
}

/// Sink republishing events on a broadcast bus for live subscribers.
pub struct BusSink {
    bus: Arc<BroadcastBus<TraceEvent>>,
}

impl BusSink {
    pub fn new(bus: Arc<BroadcastBus<TraceEvent>>) -> Self {
        Self { bus }
    }
}

impl TraceSink for BusSink {
    fn emit(&self, event: &TraceEvent) {
        self.bus.emit(event.clone());
    }
}

pub type OpHook = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Optional callbacks fired around every wrapped operation.
#[derive(Clone, Default)]
pub struct TraceHooks {
    pub before_op: Option<OpHook>,
    pub after_op: Option<OpHook>,
    pub on_error: Option<OpHook>,
}
