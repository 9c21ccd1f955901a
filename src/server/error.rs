//! HTTP-facing error type, rendered in the chat-completion API error shape.

use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::agent::AgentError;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("generation backend error: {0}")]
    Backend(String),
}

impl From<AgentError> for ServeError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Prompt(e) => ServeError::BadRequest(e.to_string()),
            AgentError::Generation(e) => ServeError::Backend(e.to_string()),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ServeError::BadRequest(m) => (StatusCode::BAD_REQUEST, "invalid_request_error", m.clone()),
            // Backend detail stays in the log.
            ServeError::Backend(m) => {
                error!("Generation failed: {}", m);
                (StatusCode::BAD_GATEWAY, "api_error", "generation backend error".to_string())
            }
        };
        let body = json!({
            "error": {
                "message": message,
                "type": kind,
                "param": null,
                "code": null
            }
        });
        (status, Json(body)).into_response()
    }
}
