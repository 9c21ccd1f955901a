pub mod ollama;
pub mod tgi;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::tgi::TgiClient;

pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation backend returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("invalid generator configuration: {0}")]
    Config(String),
}

/// Decoding parameters. Decoding is always greedy.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { max_new_tokens: DEFAULT_MAX_NEW_TOKENS }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Decoded output, special tokens skipped. May include the prompt echo.
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams
    ) -> Result<Generation, GenerationError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let client: Arc<dyn TextGenerator> = match config.llm_type {
        LlmType::Tgi => {
            let specific_client = TgiClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GenerationError::Status { status: status.as_u16(), body })
}

fn with_bearer(req: reqwest::RequestBuilder, api_key: &Option<String>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => req.bearer_auth(key),
        None => req,
    }
}
