use crate::config::prompt::{ extract_last_prompt, format_instruction, strip_prompt_echo, PromptError };
use crate::llm::generate::{ GenerationError, GenerationParams, TextGenerator };
use crate::models::chat::{
    AssistantMessage,
    ChatCompletionResponse,
    ChatRequest,
    Choice,
    Usage,
    ROLE_ASSISTANT,
};
use crate::sql::extract_sql_from_response;

use log::{ debug, info };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const COMPLETION_ID_LEN: usize = 24;
const FINGERPRINT_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Turns chat requests into SQL completions using an injected generator.
#[derive(Clone)]
pub struct CompletionAgent {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl CompletionAgent {
    pub fn new(generator: Arc<dyn TextGenerator>, params: GenerationParams) -> Self {
        Self { generator, params }
    }

    pub async fn complete(&self, req: &ChatRequest) -> Result<ChatCompletionResponse, AgentError> {
        let prompt = extract_last_prompt(&req.messages)?;
        let full_prompt = format_instruction(prompt);
        if let Some(t) = req.temperature {
            debug!("Ignoring temperature {} (greedy decoding)", t);
        }

        let generation = self.generator.generate(&full_prompt, &self.params).await?;
        debug!("Decoded: {}", generation.text);

        let reply = strip_prompt_echo(&generation.text, &full_prompt);
        let sql = extract_sql_from_response(&reply);
        info!("Extracted SQL: {}", sql);

        Ok(ChatCompletionResponse {
            id: format!("chatcmpl-{}", random_hex(COMPLETION_ID_LEN)),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: req.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: ROLE_ASSISTANT.to_string(),
                    content: sql,
                    refusal: None,
                    annotations: Vec::new(),
                },
                logprobs: None,
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::new(generation.prompt_tokens, generation.completion_tokens),
            service_tier: "default".to_string(),
            system_fingerprint: format!("fp_{}", random_hex(FINGERPRINT_LEN)),
        })
    }
}

fn random_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}
