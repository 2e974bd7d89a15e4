//! OpenAI-compatible chat completion transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use verso_core::WorkError;

use super::model::{CompletionClient, CompletionRequest};

/// Connection settings for a chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCompletionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpCompletionConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// [`CompletionClient`] over HTTP using `reqwest`.
pub struct HttpCompletionClient {
    client: Client,
    config: HttpCompletionConfig,
}

impl HttpCompletionClient {
    pub fn new(config: HttpCompletionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &HttpCompletionConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, WorkError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
        };

        let mut builder = self
            .client
            .post(self.config.completions_url())
            .timeout(self.config.timeout)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WorkError::Upstream(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(WorkError::Upstream(format!(
                "completion endpoint returned {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkError::Malformed(format!("invalid completion response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| WorkError::Malformed("completion has no content".to_string()))?;

        debug!(model = %self.config.model, "Completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "be brief".to_string(),
            user: "{\"brief\": {}}".to_string(),
            temperature: 0.5,
        }
    }

    #[tokio::test]
    async fn test_posts_chat_completion_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("secret"))
            .and(body_partial_json(json!({
                "model": "songwriter-1",
                "temperature": 0.5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(
            HttpCompletionConfig::new(format!("{}/v1/", server.uri()), "songwriter-1")
                .with_api_key("secret"),
        );
        let content = client.complete(request()).await.unwrap();
        assert_eq!(content, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(HttpCompletionConfig::new(server.uri(), "m"));
        let err = client.complete(request()).await.unwrap_err();
        match err {
            WorkError::Upstream(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("slow down"));
            }
            other => panic!("expected upstream failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(HttpCompletionConfig::new(server.uri(), "m"));
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, WorkError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_failure() {
        let client = HttpCompletionClient::new(
            HttpCompletionConfig::new("http://127.0.0.1:9", "m")
                .with_timeout(Duration::from_millis(500)),
        );
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, WorkError::Upstream(_)));
    }
}
