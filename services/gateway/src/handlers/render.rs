use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use render_engine::renderer::ItemRenderer;
use serde_json::{json, Value};
use tracing::{error, info};
use types::ids::NodeId;

use crate::error::AppError;
use crate::state::AppState;

/// Compose the response for a display node.
///
/// Unknown nodes and failed compositions are answered with an error
/// response the display can still show.
pub async fn render_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Response, AppError> {
    if !state.displays.exists(&node_id) {
        let message = format!("Render request for unknown node {node_id} received.");
        return error_response(&state, NodeId::new(node_id), &message);
    }

    let node_id = NodeId::new(node_id);
    match state.compositor(node_id.clone()).content() {
        Ok(content) => Ok(json_response(content, state.minify)),
        Err(e) => error_response(&state, node_id, &e.to_string()),
    }
}

/// Acknowledge a render id reported back by a display.
pub async fn render_id(Path(render_id): Path<String>) -> Json<Value> {
    info!(render_id = %render_id, "Receive request for render id");
    Json(json!({ "code": 204 }))
}

fn error_response(state: &AppState, node_id: NodeId, message: &str) -> Result<Response, AppError> {
    error!(node = %node_id, reason = message, "Rendering node failed");
    let content = state.error_compositor(node_id, message).content()?;
    Ok(json_response(content, state.minify))
}

fn json_response(content: String, minify: bool) -> Response {
    let body = if minify { compact(content) } else { content };
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Strip insignificant whitespace; unparsable content is returned as is.
pub fn compact(content: String) -> String {
    match serde_json::from_str::<Value>(&content) {
        Ok(value) => value.to_string(),
        Err(e) => {
            error!(error = %e, "Failed to minify content");
            content
        }
    }
}
