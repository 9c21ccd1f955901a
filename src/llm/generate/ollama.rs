use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ error_for_status, with_bearer, Generation, GenerationError, GenerationParams, TextGenerator };
use crate::llm::{ LlmConfig, LlmType };

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "mistral-sql";

/// Ollama client. The adapter is applied on the Ollama side (`ADAPTER` in the
/// Modelfile), so the configured model name already refers to base + adapter.
#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    api_key: Option<String>,
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    /// The prompt is already instruction-wrapped.
    raw: bool,
    options: GenerateOptions,
}

#[derive(Serialize, Debug)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>, api_key: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
            api_key,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        if config.llm_type != LlmType::Ollama {
            return Err(GenerationError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.model.clone(), config.api_key.clone()))
    }

    fn build_request<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.completion_model,
            prompt,
            stream: false,
            raw: true,
            options: GenerateOptions {
                temperature: 0.0,
                num_predict: params.max_new_tokens,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams
    ) -> Result<Generation, GenerationError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = self.build_request(prompt, params);
        debug!("POST {} model={}", url, self.completion_model);

        let req = with_bearer(self.http.post(&url).json(&body), &self.api_key);
        let resp = error_for_status(req.send().await?).await?;
        let data = resp.json::<GenerateResponse>().await?;
        Ok(Generation {
            text: data.response,
            prompt_tokens: data.prompt_eval_count,
            completion_tokens: data.eval_count,
        })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
