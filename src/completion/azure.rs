/// Azure OpenAI chat completion client.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionRequest, CompletionService, Message};
use crate::config::CompletionConfig;
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct AzureChatClient {
    http_client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl AzureChatClient {
    /// Build a client from config, reading endpoint and key from the
    /// environment variables it names.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, ServiceError> {
        let endpoint = config.resolve_endpoint()?;
        let api_key = config.resolve_api_key()?;
        Self::new(
            &endpoint,
            &config.deployment,
            &config.api_version,
            api_key,
            config.timeout(),
        )
    }

    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("billsift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Transport(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http_client,
            url: chat_url(endpoint, deployment, api_version),
            api_key,
            timeout,
        })
    }
}

fn chat_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
        endpoint.trim_end_matches('/')
    )
}

#[async_trait]
impl CompletionService for AzureChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        debug!(
            "Sending {:?} completion ({} messages)",
            request.kind,
            request.messages.len()
        );
        let body = ChatRequest {
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http_client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_response(&text)
    }
}

fn parse_chat_response(text: &str) -> Result<String, ServiceError> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| ServiceError::Malformed(format!("chat response: {e}")))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::Malformed("no choices in chat response".into()))?
        .message
        .content
        .unwrap_or_default();
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CallKind, Message};

    #[test]
    fn test_chat_url() {
        assert_eq!(
            chat_url("https://res.openai.azure.com/", "gpt-4o-mini", "2024-08-01-preview"),
            "https://res.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-08-01-preview"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            kind: CallKind::Classify,
            messages: vec![Message::system("sys"), Message::user("hi")],
            temperature: 0.0,
            max_tokens: 10,
        };
        let body = ChatRequest {
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 10);
    }

    #[test]
    fn test_parse_chat_response() {
        let text = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Water"}}]}"#;
        assert_eq!(parse_chat_response(text).unwrap(), "Water");

        let filtered = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_chat_response(filtered).unwrap(), "");

        assert!(matches!(
            parse_chat_response(r#"{"choices":[]}"#),
            Err(ServiceError::Malformed(_))
        ));
        assert!(parse_chat_response("not json").is_err());
    }
}
