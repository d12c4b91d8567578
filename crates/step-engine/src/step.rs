//! The closed step union. Adding a step kind is a compile-time change: the
//! dispatcher matches exhaustively, so a new variant fails to build until
//! every consumer handles it.

use a11y_resolve::A11yHint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabweaver_core_types::{StepId, TabId};

/// Which surface produced a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSource {
    Mcp,
    Play,
    Script,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepMeta {
    pub source: StepSource,
    pub ts: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

/// Element target: a previously resolved node id, or a hint matched against
/// the cached accessibility snapshot. Coordinates are a separate argument —
/// the two targeting styles are mutually exclusive within one step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Node {
        #[serde(rename = "nodeId")]
        node_id: String,
    },
    Hint {
        #[serde(rename = "a11yHint")]
        a11y_hint: A11yHint,
    },
}

impl Target {
    pub fn node(id: impl Into<String>) -> Self {
        Target::Node { node_id: id.into() }
    }

    pub fn hint(hint: A11yHint) -> Self {
        Target::Hint { a11y_hint: hint }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseActionKind {
    Move,
    Down,
    Up,
    Wheel,
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum StepKind {
    Goto {
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    Snapshot {
        #[serde(default)]
        include_a11y: bool,
    },
    #[serde(rename_all = "camelCase")]
    Click {
        #[serde(default)]
        target: Option<Target>,
        #[serde(default)]
        coord: Option<Coord>,
        #[serde(default = "one")]
        click_count: u32,
    },
    Fill {
        target: Target,
        value: String,
    },
    TypeText {
        target: Target,
        text: String,
        #[serde(default)]
        submit: bool,
    },
    Hover {
        target: Target,
    },
    SelectOption {
        target: Target,
        values: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Scroll {
        #[serde(default)]
        target: Option<Target>,
        #[serde(default)]
        delta_y: Option<f64>,
    },
    Drag {
        source: Target,
        dest: Target,
    },
    PressKey {
        key: String,
        #[serde(default)]
        target: Option<Target>,
    },
    #[serde(rename_all = "camelCase")]
    Mouse {
        action: MouseActionKind,
        x: f64,
        y: f64,
        #[serde(default)]
        delta_x: Option<f64>,
        #[serde(default)]
        delta_y: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Screenshot {
        #[serde(default)]
        full_page: bool,
    },
    TabCreate,
    TabSwitch {
        tab: TabId,
    },
    TabClose {
        tab: TabId,
    },
    WaitMs {
        ms: u64,
    },
}

impl StepKind {
    /// Wire/step-event name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Goto { .. } => "goto",
            StepKind::Snapshot { .. } => "snapshot",
            StepKind::Click { .. } => "click",
            StepKind::Fill { .. } => "fill",
            StepKind::TypeText { .. } => "type_text",
            StepKind::Hover { .. } => "hover",
            StepKind::SelectOption { .. } => "select_option",
            StepKind::Scroll { .. } => "scroll",
            StepKind::Drag { .. } => "drag",
            StepKind::PressKey { .. } => "press_key",
            StepKind::Mouse { .. } => "mouse",
            StepKind::Screenshot { .. } => "screenshot",
            StepKind::TabCreate => "tab_create",
            StepKind::TabSwitch { .. } => "tab_switch",
            StepKind::TabClose { .. } => "tab_close",
            StepKind::WaitMs { .. } => "wait_ms",
        }
    }
}

/// One immutable unit of automation intent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: StepId,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<StepMeta>,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: StepId::new(),
            kind,
            meta: None,
        }
    }

    pub fn with_source(mut self, source: StepSource) -> Self {
        self.meta = Some(StepMeta {
            source,
            ts: Utc::now(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_round_trip_through_wire_shape() {
        let step = Step::new(StepKind::Click {
            target: Some(Target::hint(A11yHint::role_name("button", "Save"))),
            coord: None,
            click_count: 2,
        });
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["name"], "click");
        assert_eq!(value["args"]["clickCount"], 2);
        assert_eq!(value["args"]["target"]["a11yHint"]["role"], "button");

        let back: Step = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind.name(), "click");
    }

    #[test]
    fn wire_steps_can_omit_ids_and_defaults() {
        let raw = json!({"name": "snapshot", "args": {"includeA11y": true}});
        let step: Step = serde_json::from_value(raw).unwrap();
        assert!(matches!(step.kind, StepKind::Snapshot { include_a11y: true }));
        assert!(!step.id.0.is_empty());

        let raw = json!({"name": "goto", "args": {"url": "https://example.test"}});
        let step: Step = serde_json::from_value(raw).unwrap();
        assert_eq!(step.kind.name(), "goto");
    }

    #[test]
    fn target_forms_are_distinguished_untagged() {
        let node: Target = serde_json::from_value(json!({"nodeId": "n0.1"})).unwrap();
        assert!(matches!(node, Target::Node { .. }));
        let hint: Target =
            serde_json::from_value(json!({"a11yHint": {"role": "button"}})).unwrap();
        assert!(matches!(hint, Target::Hint { .. }));
    }
}
