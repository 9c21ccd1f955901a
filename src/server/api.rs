use crate::agent::CompletionAgent;
use crate::models::chat::{ ChatCompletionResponse, ChatRequest };
use super::error::ServeError;
use std::sync::Arc;
use axum::{ routing::post, Router, extract::State, Json };
use tower_http::cors::{ Any, CorsLayer };
use log::debug;

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<CompletionAgent>,
}

pub fn router(agent: Arc<CompletionAgent>) -> Router {
    let app_state = AppState { agent };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(CHAT_COMPLETIONS_PATH, post(chat_completions_handler))
        .layer(cors)
        .with_state(app_state)
}

async fn chat_completions_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatCompletionResponse>, ServeError> {
    debug!("Chat completion request: model={}, messages={}", req.model, req.messages.len());
    let resp = state.agent.complete(&req).await?;
    Ok(Json(resp))
}
