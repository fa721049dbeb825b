// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ProviderAdapter`] over an OpenAI-compatible HTTP API.

use async_trait::async_trait;
use tracing::{debug, warn};

use tollgate_config::model::ProviderConfig;
use tollgate_core::{AdapterType, HealthStatus, PluginAdapter, ProviderAdapter, TollgateError};

use crate::types::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse};

/// Chat completion client.
///
/// No request timeout is set here; the dispatcher bounds every call.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn provider_error(message: impl Into<String>) -> TollgateError {
    TollgateError::Provider {
        message: message.into(),
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        if self.api_key.is_none() {
            return Ok(HealthStatus::Unhealthy("no API key configured".into()));
        }
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, TollgateError> {
        let Some(api_key) = &self.api_key else {
            return Err(provider_error("no API key configured"));
        };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "sending completion request");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TollgateError::Provider {
                message: "request failed".into(),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TollgateError::Provider {
            message: format!("HTTP {status}: failed to read body"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), detail = %detail, "completion request rejected");
            return Err(provider_error(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| TollgateError::Provider {
                message: "malformed completion response".into(),
                source: Some(Box::new(e)),
            })?;
        parsed
            .first_text()
            .ok_or_else(|| provider_error("completion response has no text"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".into()),
            base_url: format!("{}/v1/", server.uri()),
            ..ProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn returns_first_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 1000,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server));
        assert_eq!(provider.complete("hello").await.unwrap(), "Hi!");
    }

    #[tokio::test]
    async fn error_status_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached", "type": "rate_limit"}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server));
        match provider.complete("hello").await.unwrap_err() {
            TollgateError::Provider { message, .. } => {
                assert!(message.contains("429"));
                assert!(message.contains("Rate limit reached"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server));
        assert!(matches!(
            provider.complete("hello").await.unwrap_err(),
            TollgateError::Provider { .. }
        ));
    }

    #[tokio::test]
    async fn empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server));
        match provider.complete("hello").await.unwrap_err() {
            TollgateError::Provider { message, .. } => assert!(message.contains("no text")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&ProviderConfig {
            api_key: None,
            ..config(&server)
        });
        assert!(provider.complete("hello").await.is_err());
        assert!(matches!(
            provider.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
