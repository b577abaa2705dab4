use std::time::Duration;

use async_trait::async_trait;
use crmpilot_core::config::ClassifierConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("completion endpoint returned status {status}")]
    Status { status: u16, body: String },
    #[error("malformed completion body: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat completion client (Groq by default).
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionClient {
    /// Builds a client when a credential is configured; `None` otherwise.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config.credential() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Some(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }))
    }
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let raw = response.text().await.map_err(map_transport_error)?;
        parse_completion(&raw)
    }
}

fn map_transport_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(error.to_string())
    }
}

/// Pulls `choices[0].message.content` out of a completion body.
pub fn parse_completion(raw: &str) -> Result<String, LlmError> {
    let parsed: CompletionResponse =
        serde_json::from_str(raw).map_err(|error| LlmError::Malformed(error.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::Malformed("completion carried no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use crmpilot_core::config::AppConfig;

    use super::{parse_completion, ChatCompletionClient, LlmClient, LlmError};

    #[test]
    fn parses_first_choice_content() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_completion(raw), Ok("hello".to_string()));
    }

    #[test]
    fn empty_choices_are_malformed() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(LlmError::Malformed(_))));
        assert!(matches!(parse_completion("<html>oops</html>"), Err(LlmError::Malformed(_))));
    }

    #[test]
    fn no_client_without_credential() {
        let config = AppConfig::default();
        assert!(matches!(ChatCompletionClient::from_config(&config.classifier), Ok(None)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let mut config = AppConfig::default().classifier;
        config.api_key = Some("gsk-test".to_string().into());
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout_secs = 2;

        let client = match ChatCompletionClient::from_config(&config) {
            Ok(Some(client)) => client,
            other => panic!("expected a client, got {other:?}"),
        };
        let result = client.complete("system", "prompt").await;
        assert!(matches!(result, Err(LlmError::Transport(_)) | Err(LlmError::Timeout)));
    }
}
