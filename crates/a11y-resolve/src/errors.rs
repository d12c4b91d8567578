use page_port::{ElementSummary, PortError, PortErrorKind};
use serde_json::json;
use tabweaver_core_types::OpError;
use thiserror::Error;

use crate::types::{A11yHint, AxNodeInfo};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no accessibility node matches the hint")]
    HintNotFound { hint: A11yHint },

    #[error("multiple accessibility nodes match the hint")]
    HintAmbiguous {
        hint: A11yHint,
        candidates: Vec<AxNodeInfo>,
    },

    #[error("node id '{0}' is not part of the current snapshot")]
    UnknownNodeId(String),

    #[error("node '{0}' exposes no bindable locator")]
    NotBindable(String),

    #[error("locator {spec} matched no live elements")]
    LiveNotFound { spec: String },

    #[error("locator {spec} matched {count} live elements")]
    LiveAmbiguous {
        spec: String,
        count: usize,
        candidates: Vec<ElementSummary>,
    },

    #[error("{0}")]
    Port(#[from] PortError),
}

impl ResolveError {
    /// Lower into the wire taxonomy; hint and candidate context is carried in
    /// `details` for diagnosability.
    pub fn into_op_error(self) -> OpError {
        match self {
            ResolveError::HintNotFound { hint } => {
                OpError::not_found("no accessibility node matches the hint")
                    .with_details(json!({ "hint": hint }))
            }
            ResolveError::HintAmbiguous { hint, candidates } => {
                let summaries: Vec<_> = candidates
                    .iter()
                    .map(|node| json!({"id": node.id, "role": node.role, "name": node.name}))
                    .collect();
                OpError::ambiguous(format!(
                    "{} accessibility nodes match the hint",
                    candidates.len()
                ))
                .with_details(json!({ "hint": hint, "candidates": summaries }))
            }
            ResolveError::UnknownNodeId(id) => OpError::not_found(format!(
                "node id '{id}' is not part of the current snapshot"
            ))
            .with_details(json!({ "nodeId": id })),
            ResolveError::NotBindable(id) => {
                OpError::not_found(format!("node '{id}' exposes no bindable locator"))
                    .with_details(json!({ "nodeId": id }))
            }
            ResolveError::LiveNotFound { spec } => {
                OpError::not_found(format!("locator {spec} matched no live elements"))
                    .with_details(json!({ "locator": spec }))
            }
            ResolveError::LiveAmbiguous {
                spec,
                count,
                candidates,
            } => {
                let summaries: Vec<_> = candidates
                    .iter()
                    .map(|el| json!({"tag": el.tag, "text": el.text}))
                    .collect();
                OpError::ambiguous(format!("locator {spec} matched {count} live elements"))
                    .with_details(json!({
                        "locator": spec,
                        "count": count,
                        "candidates": summaries,
                    }))
            }
            ResolveError::Port(err) => match err.kind {
                PortErrorKind::Timeout => OpError::timeout(err.message),
                PortErrorKind::TargetNotFound => OpError::not_found(err.message),
                PortErrorKind::AmbiguousTarget => OpError::ambiguous(err.message),
                PortErrorKind::NotInteractable => OpError::not_interactable(err.message),
                PortErrorKind::Closed | PortErrorKind::Io => OpError::unknown(err.message),
            },
        }
    }
}
