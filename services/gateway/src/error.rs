use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use render_engine::error::RenderError;
use serde_json::json;
use thiserror::Error;

/// Failures the gateway cannot turn into a display response.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unable to render error response: {0}")]
    Render(#[from] RenderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Render(e) => {
                tracing::error!(error = %e, "Error response could not be rendered");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                    "RENDER_FAILED",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
