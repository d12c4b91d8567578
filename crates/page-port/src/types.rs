use std::fmt;

use serde::{Deserialize, Serialize};

/// Basic page identity reported by the engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
}

/// Concrete element-addressing strategy understood by the engine.
///
/// The accessibility layer adopts snapshot nodes into one of these; the
/// engine answers with live match counts and single-element actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LocatorSpec {
    /// ARIA role plus optional accessible name.
    Role {
        role: String,
        name: Option<String>,
        exact_name: bool,
    },
    /// Visible text content, exact or substring.
    Text { text: String, exact: bool },
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorSpec::Role {
                role,
                name: Some(name),
                exact_name,
            } => write!(
                f,
                "role={role}[name{}'{name}']",
                if *exact_name { "=" } else { "~" }
            ),
            LocatorSpec::Role { role, .. } => write!(f, "role={role}"),
            LocatorSpec::Text { text, exact } => {
                write!(f, "text{}'{text}'", if *exact { "=" } else { "~" })
            }
        }
    }
}

/// Compact element description used in ambiguity diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}
