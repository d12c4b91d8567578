//! Shared identifiers and the flat error taxonomy used by every tabweaver layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// A logical automation session grouping one or more tabs.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub String);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page surface within a workspace.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabId(pub String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque caller-visible credential bound 1:1 to a (workspace, tab) pair.
///
/// A token always resolves to exactly one live pair or fails with not-found;
/// tokens are never reused across distinct pages.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabToken(pub String);

impl TabToken {
    pub fn mint() -> Self {
        Self(format!("tw-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for TabToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of one step within a step list execution.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Explicit, optional workspace/tab scope threaded through calls.
///
/// There is no process-wide active pointer in the kernel; default resolution
/// is owned by whichever adapter needs it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabId>,
}

impl Scope {
    pub fn workspace(workspace: WorkspaceId) -> Self {
        Self {
            workspace: Some(workspace),
            tab: None,
        }
    }

    pub fn tab(workspace: WorkspaceId, tab: TabId) -> Self {
        Self {
            workspace: Some(workspace),
            tab: Some(tab),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workspace.is_none() && self.tab.is_none()
    }
}

/// Fully resolved (workspace, tab) pair.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResolvedScope {
    pub workspace: WorkspaceId,
    pub tab: TabId,
}

impl ResolvedScope {
    pub fn new(workspace: WorkspaceId, tab: TabId) -> Self {
        Self { workspace, tab }
    }
}

impl fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workspace={} tab={}", self.workspace.0, self.tab.0)
    }
}

/// Closed error taxonomy surfaced verbatim by every adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_NOT_FOUND")]
    NotFound,
    #[serde(rename = "ERR_AMBIGUOUS")]
    Ambiguous,
    #[serde(rename = "ERR_TIMEOUT")]
    Timeout,
    #[serde(rename = "ERR_NOT_INTERACTABLE")]
    NotInteractable,
    #[serde(rename = "ERR_INTERNAL")]
    Internal,
    #[serde(rename = "ERR_NOT_IMPLEMENTED")]
    NotImplemented,
    #[serde(rename = "ERR_UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "ERR_NOT_FOUND",
            ErrorCode::Ambiguous => "ERR_AMBIGUOUS",
            ErrorCode::Timeout => "ERR_TIMEOUT",
            ErrorCode::NotInteractable => "ERR_NOT_INTERACTABLE",
            ErrorCode::Internal => "ERR_INTERNAL",
            ErrorCode::NotImplemented => "ERR_NOT_IMPLEMENTED",
            ErrorCode::Unknown => "ERR_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform structured operation error carried through every layer.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct OpError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl OpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Ambiguous, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotInteractable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotImplemented, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }
}
