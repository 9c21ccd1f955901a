use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ error_for_status, with_bearer, Generation, GenerationError, GenerationParams, TextGenerator };
use crate::llm::{ LlmConfig, LlmType };

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_MODEL: &str = "tgi";

/// Client for a text-generation-inference `/generate` endpoint serving the
/// base model with LoRA adapters loaded.
#[derive(Debug)]
pub struct TgiClient {
    http: HttpClient,
    base_url: String,
    model: String,
    api_key: Option<String>,
    adapter_id: Option<String>,
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters<'a>,
}

#[derive(Serialize, Debug)]
struct GenerateParameters<'a> {
    max_new_tokens: u32,
    do_sample: bool,
    details: bool,
    decoder_input_details: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    adapter_id: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    generated_text: String,
    #[serde(default)]
    details: Option<GenerateDetails>,
}

#[derive(Deserialize, Debug)]
struct GenerateDetails {
    #[serde(default)]
    generated_tokens: u32,
    #[serde(default)]
    prefill: Vec<serde_json::Value>,
}

impl TgiClient {
    pub fn new(
        base_url: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
        adapter_id: Option<String>
    ) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            adapter_id,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        if config.llm_type != LlmType::Tgi {
            return Err(GenerationError::Config("Invalid config type for TgiClient".into()));
        }

        Ok(
            Self::new(
                config.base_url.clone(),
                config.model.clone(),
                config.api_key.clone(),
                config.adapter_id.clone()
            )
        )
    }

    fn build_request<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> GenerateRequest<'a> {
        GenerateRequest {
            inputs: prompt,
            parameters: GenerateParameters {
                max_new_tokens: params.max_new_tokens,
                do_sample: false,
                details: true,
                decoder_input_details: true,
                adapter_id: self.adapter_id.as_deref(),
            },
        }
    }
}

impl GenerateResponse {
    fn into_generation(self) -> Generation {
        let (prompt_tokens, completion_tokens) = match self.details {
            Some(d) => (d.prefill.len() as u32, d.generated_tokens),
            None => (0, 0),
        };
        Generation {
            text: self.generated_text,
            prompt_tokens,
            completion_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for TgiClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams
    ) -> Result<Generation, GenerationError> {
        let url = format!("{}/generate", self.base_url.trim_end_matches('/'));
        let body = self.build_request(prompt, params);
        debug!("POST {} adapter={:?}", url, self.adapter_id);

        let req = with_bearer(self.http.post(&url).json(&body), &self.api_key);
        let resp = error_for_status(req.send().await?).await?;
        let data = resp.json::<GenerateResponse>().await?;
        Ok(data.into_generation())
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
