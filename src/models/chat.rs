use serde::{ Serialize, Deserialize };
use serde_json::{ Map, Value as JsonValue };

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ROLE_USER
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Accepted for wire compatibility; decoding is always greedy.
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub service_tier: String,
    pub system_fingerprint: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub logprobs: Option<JsonValue>,
    pub finish_reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
    pub refusal: Option<String>,
    pub annotations: Vec<JsonValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub prompt_tokens_details: Map<String, JsonValue>,
    pub completion_tokens_details: Map<String, JsonValue>,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            prompt_tokens_details: Map::new(),
            completion_tokens_details: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_temperature_deserializes() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#
        ).unwrap();
        assert_eq!(req.temperature, None);
        assert_eq!(req.messages, vec![ChatMessage::new("user", "hi")]);
    }

    #[test]
    fn usage_sums_tokens_and_serializes_empty_details() {
        let usage = Usage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);

        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["prompt_tokens_details"], serde_json::json!({}));
        assert_eq!(json["completion_tokens_details"], serde_json::json!({}));
    }
}
