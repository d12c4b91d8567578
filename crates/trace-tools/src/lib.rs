//! Trace layer: atomic page operations wrapped with uniform start/end event
//! emission and error normalization, plus the per-binding snapshot cache.

mod cache;
mod event;
mod tools;

pub use cache::AxCache;
pub use event::{BusSink, LogSink, OpHook, TraceEvent, TraceHooks, TraceSink, TraceTags};
pub use tools::{classify_port_error, MouseAction, TraceTools, WaitTimeouts};
