//! Thin demo server: WebSocket commands, MCP over HTTP POST, and a
//! Prometheus metrics endpoint. All logic lives in the adapter crate; this
//! file only frames bytes.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, info, warn};

use tabweaver_adapters::{CommandAdapter, McpAdapter};

pub struct AppState {
    pub command: CommandAdapter,
    pub mcp: McpAdapter,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .route("/mcp", post(mcp_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "tabweaver agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn ws_handler(
    upgrade: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws_loop(socket, state))
}

async fn ws_loop(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("websocket client connected");
    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!("websocket receive failed: {err}");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                let reply = state.command.handle_text(&text).await;
                if socket.send(Message::Text(reply)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!("websocket client disconnected");
}

async fn mcp_handler(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let reply = state.mcp.handle_text(&body).await;
    ([("content-type", "application/json")], reply)
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!("metrics encode failed: {err}");
    }
    (
        [("content-type", "text/plain; version=0.0.4")],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
