use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabweaver_core_types::{OpError, StepId};

/// Outcome of one step; produced exactly once and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl StepResult {
    pub fn success(step_id: StepId, data: Value) -> Self {
        Self {
            step_id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(step_id: StepId, error: OpError) -> Self {
        Self {
            step_id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Result of one `run_steps` call; `ok` is the conjunction of all executed
/// steps' outcomes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub ok: bool,
    pub results: Vec<StepResult>,
}

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    pub stop_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { stop_on_error: true }
    }
}
