//! Node index and hint types for accessibility resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Caller-supplied description of a target node.
///
/// At least one field must be present; role matches exactly, name and text
/// match as case-insensitive substrings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct A11yHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl A11yHint {
    pub fn role_name(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            name: Some(name.into()),
            text: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.name.is_none() && self.text.is_none()
    }
}

/// Cached info for one snapshot node, keyed by its synthetic dotted id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AxNodeInfo {
    pub id: String,
    pub role: String,
    pub name: String,
    pub description: String,
    pub value: String,
}

/// Indexed snapshot: synthetic id -> node info, preserving depth-first order.
///
/// Ids are stable within one snapshot generation only; re-snapshotting
/// invalidates every previously issued id.
#[derive(Clone, Debug, Default)]
pub struct NodeIndex {
    nodes: HashMap<String, AxNodeInfo>,
    order: Vec<String>,
}

impl NodeIndex {
    pub fn insert(&mut self, info: AxNodeInfo) {
        self.order.push(info.id.clone());
        self.nodes.insert(info.id.clone(), info);
    }

    pub fn get(&self, id: &str) -> Option<&AxNodeInfo> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in depth-first snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &AxNodeInfo> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }
}
