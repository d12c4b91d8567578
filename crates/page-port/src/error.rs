use thiserror::Error;

/// Raw failure classes surfaced by a page engine. The trace layer normalizes
/// these into the wire error taxonomy; nothing above it sees a `PortError`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortErrorKind {
    Timeout,
    TargetNotFound,
    AmbiguousTarget,
    NotInteractable,
    Closed,
    Io,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct PortError {
    pub kind: PortErrorKind,
    pub message: String,
    /// Optional engine-provided context (selector, candidate list, ...).
    pub hint: Option<String>,
}

impl PortError {
    pub fn new(kind: PortErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::TargetNotFound, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::AmbiguousTarget, message)
    }

    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::NotInteractable, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::Closed, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(PortErrorKind::Io, message)
    }
}
