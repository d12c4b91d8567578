//! Command adapter: JSON envelopes carried over the WebSocket surface.
//!
//! Only workspace/tab/replay management and `steps.run` live here; all page
//! interaction goes through the step model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use step_engine::{RunOptions, Step, StepSource};
use tabweaver_core_types::{OpError, Scope, TabId, TabToken};
use tabweaver_registry::TabRoutes;

use crate::deps::{AgentDeps, ScopeContext};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub cmd: String,
    #[serde(default)]
    pub tab_token: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl CommandReply {
    fn success(request_id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            tab_token: None,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    fn failure(request_id: Option<String>, error: OpError) -> Self {
        Self {
            ok: false,
            tab_token: None,
            request_id,
            data: None,
            error: Some(error),
        }
    }

    fn with_token(mut self, token: &TabToken) -> Self {
        self.tab_token = Some(token.0.clone());
        self
    }
}

pub struct CommandAdapter {
    deps: Arc<AgentDeps>,
    ctx: Arc<ScopeContext>,
}

impl CommandAdapter {
    pub fn new(deps: Arc<AgentDeps>, ctx: Arc<ScopeContext>) -> Self {
        Self { deps, ctx }
    }

    /// Entry point for raw wire text; invalid JSON is a framing error and
    /// never reaches a handler.
    pub async fn handle_text(&self, raw: &str) -> String {
        let reply = match serde_json::from_str::<CommandEnvelope>(raw) {
            Ok(envelope) => self.handle(envelope).await,
            Err(err) => CommandReply::failure(
                None,
                OpError::internal(format!("invalid command envelope: {err}")),
            ),
        };
        serde_json::to_string(&reply)
            .unwrap_or_else(|_| r#"{"ok":false,"error":{"code":"ERR_INTERNAL","message":"unserializable reply"}}"#.to_string())
    }

    pub async fn handle(&self, envelope: CommandEnvelope) -> CommandReply {
        let request_id = envelope.request_id.clone();
        debug!(cmd = %envelope.cmd, "command received");
        match self.dispatch(&envelope).await {
            Ok(reply) => reply,
            Err(error) => CommandReply::failure(request_id, error),
        }
    }

    async fn dispatch(&self, envelope: &CommandEnvelope) -> Result<CommandReply, OpError> {
        let request_id = envelope.request_id.clone();
        match envelope.cmd.as_str() {
            "workspace.create" => {
                let (workspace, tab) = self
                    .deps
                    .registry
                    .create_workspace()
                    .await
                    .map_err(|err| err.into_op_error())?;
                if self.ctx.active().is_none() {
                    self.ctx.set_active(workspace.clone());
                }
                let (token, _page) = self
                    .deps
                    .registry
                    .tab_binding(&tab)
                    .map_err(|err| err.into_op_error())?;
                Ok(CommandReply::success(
                    request_id,
                    json!({ "workspaceId": workspace, "tabId": tab }),
                )
                .with_token(&token))
            }

            "workspace.list" => {
                let workspaces = self.deps.registry.list_workspaces();
                Ok(CommandReply::success(
                    request_id,
                    json!({ "workspaces": workspaces, "active": self.ctx.active() }),
                ))
            }

            "workspace.activate" => {
                let workspace = arg_workspace(&envelope.args)?;
                if !self.deps.registry.workspace_exists(&workspace) {
                    return Err(OpError::not_found(format!(
                        "workspace '{}' not found",
                        workspace.0
                    )));
                }
                self.ctx.set_active(workspace.clone());
                Ok(CommandReply::success(request_id, json!({ "workspaceId": workspace })))
            }

            "tab.create" => {
                let workspace = self
                    .ctx
                    .resolve_workspace(&self.deps, envelope.scope.as_ref())
                    .await?;
                let tab = self
                    .deps
                    .registry
                    .create_tab(&workspace)
                    .await
                    .map_err(|err| err.into_op_error())?;
                let (token, _page) = self
                    .deps
                    .registry
                    .tab_binding(&tab)
                    .map_err(|err| err.into_op_error())?;
                Ok(CommandReply::success(
                    request_id,
                    json!({ "workspaceId": workspace, "tabId": tab }),
                )
                .with_token(&token))
            }

            "tab.close" => {
                let workspace = self
                    .ctx
                    .resolve_workspace(&self.deps, envelope.scope.as_ref())
                    .await?;
                let tab = arg_tab(&envelope.args)?;
                self.deps
                    .registry
                    .close_tab(&workspace, &tab)
                    .await
                    .map_err(|err| err.into_op_error())?;
                Ok(CommandReply::success(request_id, json!({ "tabId": tab })))
            }

            "tab.activate" => {
                let workspace = self
                    .ctx
                    .resolve_workspace(&self.deps, envelope.scope.as_ref())
                    .await?;
                let tab = arg_tab(&envelope.args)?;
                self.deps
                    .registry
                    .activate_tab(&workspace, &tab)
                    .map_err(|err| err.into_op_error())?;
                Ok(CommandReply::success(request_id, json!({ "tabId": tab })))
            }

            "token.resolve" => {
                let token = envelope
                    .tab_token
                    .clone()
                    .ok_or_else(|| OpError::internal("token.resolve requires tabToken"))?;
                let token = TabToken(token);
                let scope = self
                    .deps
                    .registry
                    .resolve_scope_from_token(&token)
                    .map_err(|err| err.into_op_error())?;
                Ok(CommandReply::success(
                    request_id,
                    json!({ "workspaceId": scope.workspace, "tabId": scope.tab }),
                )
                .with_token(&token))
            }

            "steps.run" => {
                let workspace = self
                    .ctx
                    .resolve_workspace(&self.deps, envelope.scope.as_ref())
                    .await?;
                let raw_steps = envelope
                    .args
                    .get("steps")
                    .cloned()
                    .ok_or_else(|| OpError::internal("steps.run requires a steps array"))?;
                let steps: Vec<Step> = serde_json::from_value(raw_steps)
                    .map_err(|err| OpError::internal(format!("malformed steps: {err}")))?;
                let steps: Vec<Step> = steps
                    .into_iter()
                    .map(|step| match step.meta {
                        Some(_) => step,
                        None => step.with_source(StepSource::Play),
                    })
                    .collect();
                let stop_on_error = envelope
                    .args
                    .get("stopOnError")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let outcome = self
                    .deps
                    .runner
                    .run_steps(&workspace, steps, RunOptions { stop_on_error })
                    .await?;
                let ok = outcome.ok;
                let mut reply = CommandReply::success(
                    request_id,
                    serde_json::to_value(&outcome)
                        .map_err(|err| OpError::internal(err.to_string()))?,
                );
                reply.ok = ok;
                Ok(reply)
            }

            "replay.cancel" => {
                let workspace = self
                    .ctx
                    .resolve_workspace(&self.deps, envelope.scope.as_ref())
                    .await?;
                self.deps.runner.cancel_replay(&workspace);
                Ok(CommandReply::success(request_id, json!({ "workspaceId": workspace })))
            }

            other => Err(OpError::not_implemented(format!(
                "unknown command '{other}'"
            ))),
        }
    }
}

fn arg_workspace(args: &Value) -> Result<tabweaver_core_types::WorkspaceId, OpError> {
    args.get("workspaceId")
        .and_then(Value::as_str)
        .map(|s| tabweaver_core_types::WorkspaceId(s.to_string()))
        .ok_or_else(|| OpError::internal("missing workspaceId argument"))
}

fn arg_tab(args: &Value) -> Result<TabId, OpError> {
    args.get("tabId")
        .and_then(Value::as_str)
        .map(|s| TabId(s.to_string()))
        .ok_or_else(|| OpError::internal("missing tabId argument"))
}
