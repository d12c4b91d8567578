//! MCP adapter: JSON-RPC `initialize`/`tools/list`/`tools/call`, each tool
//! mapping to exactly one step executed through the runner.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use a11y_resolve::A11yHint;
use step_engine::{Coord, MouseActionKind, RunOptions, Step, StepKind, StepSource, Target};

use crate::deps::{AgentDeps, ScopeContext};

const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

const ERROR_PARSE: i64 = -32700;
const ERROR_INVALID_REQUEST: i64 = -32600;
const ERROR_METHOD_NOT_FOUND: i64 = -32601;
const ERROR_INVALID_PARAMS: i64 = -32602;

pub struct McpAdapter {
    deps: Arc<AgentDeps>,
    ctx: Arc<ScopeContext>,
}

impl McpAdapter {
    pub fn new(deps: Arc<AgentDeps>, ctx: Arc<ScopeContext>) -> Self {
        Self { deps, ctx }
    }

    pub async fn handle_text(&self, raw: &str) -> String {
        let reply = match serde_json::from_str::<Value>(raw) {
            Ok(request) => self.handle(request).await,
            Err(err) => error_reply(Value::Null, ERROR_PARSE, &format!("parse error: {err}")),
        };
        serde_json::to_string(&reply).unwrap_or_else(|_| String::from("{}"))
    }

    pub async fn handle(&self, request: Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = match request.get("method").and_then(Value::as_str) {
            Some(method) => method,
            None => return error_reply(id, ERROR_INVALID_REQUEST, "missing method"),
        };
        debug!(method, "mcp request");
        match method {
            "initialize" => result_reply(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "tabweaver",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "tools/list" => result_reply(id, json!({ "tools": tool_descriptors() })),
            "tools/call" => self.handle_call(id, request.get("params")).await,
            _ => error_reply(id, ERROR_METHOD_NOT_FOUND, &format!("unknown method '{method}'")),
        }
    }

    async fn handle_call(&self, id: Value, params: Option<&Value>) -> Value {
        let params = match params.and_then(Value::as_object) {
            Some(params) => params,
            None => return error_reply(id, ERROR_INVALID_PARAMS, "missing params"),
        };
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => return error_reply(id, ERROR_INVALID_PARAMS, "missing tool name"),
        };
        let empty = Map::new();
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let kind = match step_for_tool(name, arguments) {
            Ok(Some(kind)) => kind,
            Ok(None) => {
                return error_reply(id, ERROR_METHOD_NOT_FOUND, &format!("unknown tool '{name}'"))
            }
            Err(message) => return error_reply(id, ERROR_INVALID_PARAMS, &message),
        };

        let step = Step::new(kind).with_source(StepSource::Mcp);
        let outcome = async {
            let workspace = self.ctx.resolve_workspace(&self.deps, None).await?;
            self.deps
                .runner
                .run_steps(&workspace, vec![step], RunOptions::default())
                .await
        }
        .await;

        match outcome {
            Ok(outcome) => {
                let first = outcome.results.into_iter().next();
                let (is_error, payload) = match first {
                    Some(result) if result.ok => {
                        (false, result.data.unwrap_or(Value::Null))
                    }
                    Some(result) => (
                        true,
                        serde_json::to_value(&result.error).unwrap_or(Value::Null),
                    ),
                    None => (true, json!({ "message": "no step executed" })),
                };
                result_reply(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": payload.to_string(),
                        }],
                        "isError": is_error,
                    }),
                )
            }
            Err(error) => result_reply(
                id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": serde_json::to_value(&error).unwrap_or(Value::Null).to_string(),
                    }],
                    "isError": true,
                }),
            ),
        }
    }
}

fn result_reply(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
}

fn error_reply(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn target_schema_props() -> Value {
    json!({
        "nodeId": { "type": "string", "description": "Node id from the latest snapshot" },
        "role": { "type": "string", "description": "ARIA role to match" },
        "name": { "type": "string", "description": "Accessible name substring" },
        "text": { "type": "string", "description": "Visible text substring" },
    })
}

fn tool_descriptors() -> Vec<Value> {
    let target = target_schema_props();
    let with_target = |extra: Value, required: Vec<&str>| -> Value {
        let mut props = target.as_object().cloned().unwrap_or_default();
        if let Some(extra) = extra.as_object() {
            for (key, value) in extra {
                props.insert(key.clone(), value.clone());
            }
        }
        json!({ "type": "object", "properties": props, "required": required })
    };

    vec![
        json!({
            "name": "browser_goto",
            "description": "Navigate the active tab to a URL",
            "inputSchema": {
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"],
            },
        }),
        json!({
            "name": "browser_snapshot",
            "description": "Capture page info and optionally the accessibility tree",
            "inputSchema": {
                "type": "object",
                "properties": { "includeA11y": { "type": "boolean" } },
            },
        }),
        json!({
            "name": "browser_click",
            "description": "Click an element by accessibility target or coordinates",
            "inputSchema": with_target(
                json!({
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "clickCount": { "type": "integer", "minimum": 1 },
                }),
                vec![],
            ),
        }),
        json!({
            "name": "browser_fill",
            "description": "Replace the value of an input element",
            "inputSchema": with_target(json!({ "value": { "type": "string" } }), vec!["value"]),
        }),
        json!({
            "name": "browser_type",
            "description": "Type text into an element, optionally submitting with Enter",
            "inputSchema": with_target(
                json!({
                    "text": { "type": "string" },
                    "submit": { "type": "boolean" },
                }),
                vec!["text"],
            ),
        }),
        json!({
            "name": "browser_hover",
            "description": "Hover an element",
            "inputSchema": with_target(json!({}), vec![]),
        }),
        json!({
            "name": "browser_select",
            "description": "Select options in a listbox or dropdown",
            "inputSchema": with_target(
                json!({ "values": { "type": "array", "items": { "type": "string" } } }),
                vec!["values"],
            ),
        }),
        json!({
            "name": "browser_press_key",
            "description": "Press a key on the page or a specific element",
            "inputSchema": with_target(json!({ "key": { "type": "string" } }), vec!["key"]),
        }),
        json!({
            "name": "browser_screenshot",
            "description": "Capture a screenshot of the active tab",
            "inputSchema": {
                "type": "object",
                "properties": { "fullPage": { "type": "boolean" } },
            },
        }),
        json!({
            "name": "browser_tab_new",
            "description": "Open a new tab in the active workspace",
            "inputSchema": { "type": "object", "properties": {} },
        }),
        json!({
            "name": "browser_tab_close",
            "description": "Close a tab by id",
            "inputSchema": {
                "type": "object",
                "properties": { "tabId": { "type": "string" } },
                "required": ["tabId"],
            },
        }),
        json!({
            "name": "browser_mouse_wheel",
            "description": "Scroll the page with a synthetic wheel event",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "deltaX": { "type": "number" },
                    "deltaY": { "type": "number" },
                },
                "required": ["deltaY"],
            },
        }),
    ]
}

fn target_from(args: &Map<String, Value>) -> Option<Target> {
    if let Some(node_id) = args.get("nodeId").and_then(Value::as_str) {
        return Some(Target::node(node_id));
    }
    let hint = A11yHint {
        role: args.get("role").and_then(Value::as_str).map(String::from),
        name: args.get("name").and_then(Value::as_str).map(String::from),
        text: args.get("text").and_then(Value::as_str).map(String::from),
    };
    if hint.is_empty() {
        None
    } else {
        Some(Target::hint(hint))
    }
}

fn required_str(args: &Map<String, Value>, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| format!("missing required argument '{key}'"))
}

fn required_target(args: &Map<String, Value>, tool: &str) -> Result<Target, String> {
    target_from(args).ok_or_else(|| format!("{tool} requires nodeId or role/name/text"))
}

/// Map a tool call to its step kind. `Ok(None)` means the tool name is not
/// part of the surface.
fn step_for_tool(name: &str, args: &Map<String, Value>) -> Result<Option<StepKind>, String> {
    let kind = match name {
        "browser_goto" => StepKind::Goto {
            url: required_str(args, "url")?,
        },
        "browser_snapshot" => StepKind::Snapshot {
            include_a11y: args
                .get("includeA11y")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        },
        "browser_click" => {
            let coord = match (
                args.get("x").and_then(Value::as_f64),
                args.get("y").and_then(Value::as_f64),
            ) {
                (Some(x), Some(y)) => Some(Coord { x, y }),
                _ => None,
            };
            StepKind::Click {
                target: target_from(args),
                coord,
                click_count: args
                    .get("clickCount")
                    .and_then(Value::as_u64)
                    .map(|n| n as u32)
                    .unwrap_or(1),
            }
        }
        "browser_fill" => StepKind::Fill {
            target: required_target(args, "browser_fill")?,
            value: required_str(args, "value")?,
        },
        "browser_type" => StepKind::TypeText {
            target: required_target(args, "browser_type")?,
            text: required_str(args, "text")?,
            submit: args.get("submit").and_then(Value::as_bool).unwrap_or(false),
        },
        "browser_hover" => StepKind::Hover {
            target: required_target(args, "browser_hover")?,
        },
        "browser_select" => {
            let values = args
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| "missing required argument 'values'".to_string())?
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect();
            StepKind::SelectOption {
                target: required_target(args, "browser_select")?,
                values,
            }
        }
        "browser_press_key" => StepKind::PressKey {
            key: required_str(args, "key")?,
            target: target_from(args),
        },
        "browser_screenshot" => StepKind::Screenshot {
            full_page: args
                .get("fullPage")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        "browser_tab_new" => StepKind::TabCreate,
        "browser_tab_close" => StepKind::TabClose {
            tab: tabweaver_core_types::TabId(required_str(args, "tabId")?),
        },
        "browser_mouse_wheel" => StepKind::Mouse {
            action: MouseActionKind::Wheel,
            x: args.get("x").and_then(Value::as_f64).unwrap_or(0.0),
            y: args.get("y").and_then(Value::as_f64).unwrap_or(0.0),
            delta_x: args.get("deltaX").and_then(Value::as_f64),
            delta_y: args.get("deltaY").and_then(Value::as_f64),
        },
        _ => return Ok(None),
    };
    Ok(Some(kind))
}
