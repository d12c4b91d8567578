//! Per-step dispatch: target resolution, precondition chain, the engine
//! call, and human pacing. Failures come back as data, never as panics.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

use runtime_bind::PageBinding;
use tabweaver_core_types::{OpError, WorkspaceId};
use tabweaver_registry::Registry;
use trace_tools::{MouseAction, TraceTools};

use crate::human::HumanPolicy;
use crate::step::{Coord, MouseActionKind, Step, StepKind, Target};

/// Longest explicit wait one step may request.
const MAX_WAIT_MS: u64 = 60_000;

pub(crate) struct StepCtx<'a> {
    pub registry: &'a Arc<Registry>,
    pub human: &'a HumanPolicy,
    pub workspace: &'a WorkspaceId,
}

/// Resolve a step target to a node id. Node ids pass through untouched and
/// are validated at adoption time; hints go through the cached snapshot,
/// surfacing not-found/ambiguous verbatim.
async fn resolve_target(tools: &TraceTools, target: &Target) -> Result<String, OpError> {
    match target {
        Target::Node { node_id } => Ok(node_id.clone()),
        Target::Hint { a11y_hint } => {
            if a11y_hint.is_empty() {
                return Err(OpError::internal(
                    "a11y hint requires at least one of role, name or text",
                ));
            }
            tools.resolve_hint_node(a11y_hint).await
        }
    }
}

/// Interactive operations act on elements that may be attached but
/// off-screen or not laid out yet; bring the node into view and wait for
/// visibility before touching it.
async fn prepare_interaction(tools: &TraceTools, node_id: &str) -> Result<(), OpError> {
    tools.scroll_node_into_view(node_id).await?;
    tools.wait_node_visible(node_id).await
}

async fn coordinate_click(
    tools: &TraceTools,
    coord: &Coord,
    click_count: u32,
) -> Result<(), OpError> {
    // The engine only exposes separate down/up primitives at the coordinate
    // level, so a click is synthesized as a pair (doubled for double-click).
    for _ in 0..click_count.max(1) {
        tools
            .mouse(MouseAction::Down {
                x: coord.x,
                y: coord.y,
            })
            .await?;
        tools
            .mouse(MouseAction::Up {
                x: coord.x,
                y: coord.y,
            })
            .await?;
    }
    Ok(())
}

pub(crate) async fn execute_step(
    ctx: &StepCtx<'_>,
    binding: &Arc<PageBinding>,
    step: &Step,
) -> Result<Value, OpError> {
    let tools = &binding.tools;
    match &step.kind {
        StepKind::Goto { url } => {
            let info = tools.navigate(url).await?;
            Ok(json!({ "url": info.url, "title": info.title }))
        }

        StepKind::Snapshot { include_a11y } => {
            let info = tools.page_info().await?;
            let mut data = json!({ "url": info.url, "title": info.title });
            if *include_a11y {
                data["a11y"] = tools.ax_snapshot().await?;
            }
            Ok(data)
        }

        StepKind::Click {
            target,
            coord,
            click_count,
        } => match (target, coord) {
            (Some(_), Some(_)) => Err(OpError::internal(
                "click accepts either a target or coordinates, not both",
            )),
            (None, None) => Err(OpError::internal(
                "click requires a target or coordinates",
            )),
            (Some(target), None) => {
                let node_id = resolve_target(tools, target).await?;
                prepare_interaction(tools, &node_id).await?;
                tools.click_node(&node_id, *click_count).await?;
                ctx.human.pause().await;
                Ok(json!({ "nodeId": node_id }))
            }
            (None, Some(coord)) => {
                coordinate_click(tools, coord, *click_count).await?;
                ctx.human.pause().await;
                Ok(json!({ "x": coord.x, "y": coord.y }))
            }
        },

        StepKind::Fill { target, value } => {
            let node_id = resolve_target(tools, target).await?;
            prepare_interaction(tools, &node_id).await?;
            tools.fill_node(&node_id, value).await?;
            Ok(json!({ "nodeId": node_id }))
        }

        StepKind::TypeText {
            target,
            text,
            submit,
        } => {
            let node_id = resolve_target(tools, target).await?;
            prepare_interaction(tools, &node_id).await?;
            tools.focus_node(&node_id).await?;
            tools.type_node(&node_id, text).await?;
            if *submit {
                tools.press_node_key(&node_id, "Enter").await?;
            }
            ctx.human.pause().await;
            Ok(json!({ "nodeId": node_id }))
        }

        StepKind::Hover { target } => {
            let node_id = resolve_target(tools, target).await?;
            prepare_interaction(tools, &node_id).await?;
            tools.hover_node(&node_id).await?;
            Ok(json!({ "nodeId": node_id }))
        }

        StepKind::SelectOption { target, values } => {
            let node_id = resolve_target(tools, target).await?;
            prepare_interaction(tools, &node_id).await?;
            let selected = tools.select_node_option(&node_id, values).await?;
            Ok(json!({ "nodeId": node_id, "selected": selected }))
        }

        StepKind::Scroll { target, delta_y } => match (target, delta_y) {
            (Some(target), _) => {
                let node_id = resolve_target(tools, target).await?;
                tools.scroll_node_into_view(&node_id).await?;
                Ok(json!({ "nodeId": node_id }))
            }
            (None, Some(delta_y)) => {
                tools
                    .mouse(MouseAction::Wheel {
                        x: 0.0,
                        y: 0.0,
                        delta_x: 0.0,
                        delta_y: *delta_y,
                    })
                    .await?;
                Ok(json!({ "deltaY": delta_y }))
            }
            (None, None) => Err(OpError::internal(
                "scroll requires a target or a deltaY value",
            )),
        },

        StepKind::Drag { source, dest } => {
            let source_id = resolve_target(tools, source).await?;
            let dest_id = resolve_target(tools, dest).await?;
            prepare_interaction(tools, &source_id).await?;
            tools.drag_node(&source_id, &dest_id).await?;
            Ok(json!({ "sourceId": source_id, "destId": dest_id }))
        }

        StepKind::PressKey { key, target } => {
            match target {
                Some(target) => {
                    let node_id = resolve_target(tools, target).await?;
                    prepare_interaction(tools, &node_id).await?;
                    tools.press_node_key(&node_id, key).await?;
                }
                None => tools.press_key(key).await?,
            }
            ctx.human.pause().await;
            Ok(json!({ "key": key }))
        }

        StepKind::Mouse {
            action,
            x,
            y,
            delta_x,
            delta_y,
        } => {
            let action = match action {
                MouseActionKind::Move => MouseAction::Move { x: *x, y: *y },
                MouseActionKind::Down => MouseAction::Down { x: *x, y: *y },
                MouseActionKind::Up => MouseAction::Up { x: *x, y: *y },
                MouseActionKind::Wheel => {
                    let delta_y = delta_y.ok_or_else(|| {
                        OpError::internal("mouse wheel requires a deltaY value")
                    })?;
                    MouseAction::Wheel {
                        x: *x,
                        y: *y,
                        delta_x: delta_x.unwrap_or(0.0),
                        delta_y,
                    }
                }
            };
            tools.mouse(action).await?;
            Ok(json!({}))
        }

        StepKind::Screenshot { full_page } => {
            let bytes = tools.screenshot(*full_page).await?;
            Ok(json!({
                "format": "png",
                "bytes": bytes.len(),
                "base64": BASE64.encode(&bytes),
            }))
        }

        StepKind::TabCreate => {
            let registry = Arc::clone(ctx.registry);
            let workspace = ctx.workspace.clone();
            let tab = tools
                .traced("tab.create", Value::Null, async move {
                    let tab = registry
                        .create_tab(&workspace)
                        .await
                        .map_err(|err| err.into_op_error())?;
                    let summary = json!({ "tabId": &tab });
                    Ok((tab, summary))
                })
                .await?;
            Ok(json!({ "tabId": tab }))
        }

        StepKind::TabSwitch { tab } => {
            let registry = Arc::clone(ctx.registry);
            let workspace = ctx.workspace.clone();
            let tab_id = tab.clone();
            tools
                .traced("tab.switch", json!({ "tabId": tab }), async move {
                    registry
                        .activate_tab(&workspace, &tab_id)
                        .map_err(|err| err.into_op_error())?;
                    Ok(((), json!({ "tabId": tab_id })))
                })
                .await?;
            Ok(json!({ "tabId": tab }))
        }

        StepKind::TabClose { tab } => {
            let registry = Arc::clone(ctx.registry);
            let workspace = ctx.workspace.clone();
            let tab_id = tab.clone();
            tools
                .traced("tab.close", json!({ "tabId": tab }), async move {
                    registry
                        .close_tab(&workspace, &tab_id)
                        .await
                        .map_err(|err| err.into_op_error())?;
                    Ok(((), json!({ "tabId": tab_id })))
                })
                .await?;
            Ok(json!({ "tabId": tab }))
        }

        StepKind::WaitMs { ms } => {
            let clamped = (*ms).min(MAX_WAIT_MS);
            sleep(Duration::from_millis(clamped)).await;
            Ok(json!({ "waitedMs": clamped }))
        }
    }
}
