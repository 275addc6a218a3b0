//! Simple (non-streaming) API calls
//!
//! Every supported provider speaks the OpenAI chat-completions format, so a
//! single request shape covers them all.

use serde_json::Value;
use tracing::debug;

use super::core::AiClient;
use super::AiError;
use crate::constants;

/// One system + user exchange
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            max_tokens: constants::ai::ENSEMBLE_MAX_TOKENS,
            temperature: constants::ai::TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn to_body(&self, model: &str) -> Value {
        serde_json::json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": self.user_message}
            ]
        })
    }
}

impl AiClient {
    /// Make a simple non-streaming chat call and return the reply text
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        let body = request.to_body(self.model());

        debug!(
            provider = %self.provider_id(),
            model = self.model(),
            "Sending chat request"
        );

        let http_request = self.build_request(&self.config().api_url());
        let response = http_request.json(&body).send().await?;
        let response = self.handle_error_response(response).await?;

        let json: Value = response.json().await?;
        extract_reply(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response
pub(crate) fn extract_reply(json: &Value) -> Result<String, AiError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| AiError::MalformedResponse("missing choices[0].message.content".into()))
}
