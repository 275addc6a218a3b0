//! Core AI client

use reqwest::{Client, RequestBuilder, Response};

use super::{AiClientConfig, AiError};
use crate::ai::providers::ProviderId;

/// HTTP client bound to one provider, model and API key
pub struct AiClient {
    http: Client,
    config: AiClientConfig,
    api_key: String,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: String) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            http,
            config,
            api_key,
        }
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    pub fn provider_id(&self) -> ProviderId {
        self.config.provider_id
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// POST to `url` with bearer auth
    pub(super) fn build_request(&self, url: &str) -> RequestBuilder {
        self.http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
    }

    /// Turn a non-2xx response into `AiError::Provider`
    ///
    /// Providers answer failures with `{error: {message}}` or `{error, details}`;
    /// the most specific message found is kept.
    pub(super) async fn handle_error_response(
        &self,
        response: Response,
    ) -> Result<Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body).unwrap_or(body);
        tracing::warn!(
            provider = %self.config.provider_id,
            status = status.as_u16(),
            "Provider request failed: {}",
            message
        );

        Err(AiError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())?;

    match value.get("details").and_then(|d| d.as_str()) {
        Some(details) => Some(format!("{message}: {details}")),
        None => Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"rate limited"}}"#).as_deref(),
            Some("rate limited")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"bad key","details":"expired"}"#).as_deref(),
            Some("bad key: expired")
        );
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }
}
