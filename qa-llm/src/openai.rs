//! OpenAI chat completions, also used for GitHub Models which speaks the same wire format.

use crate::client::{SYSTEM_INSTRUCTION, error_message, parse_envelope, request_error};
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 8000;
const GITHUB_API_VERSION: &str = "2022-11-28";

pub struct OpenAiClient<'a> {
    http: reqwest::Client,
    api_key: &'a str,
    provider: &'a ProviderConfig,
}

impl<'a> OpenAiClient<'a> {
    pub fn new(http: reqwest::Client, api_key: &'a str, provider: &'a ProviderConfig) -> Self {
        Self {
            http,
            api_key,
            provider,
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.provider.kind))]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let kind = self.provider.kind;
        let req = ChatCompletionRequest::new(kind, &self.provider.model_id, prompt);

        let mut builder = self
            .http
            .post(&self.provider.endpoint)
            .bearer_auth(self.api_key)
            .json(&req);
        if kind == ProviderKind::GitHub {
            builder = builder
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", GITHUB_API_VERSION);
        }

        let response = builder.send().await.map_err(|e| request_error(kind, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| request_error(kind, e))?;
        if !status.is_success() {
            return Err(LlmError::transport(kind, error_message(status, &body)));
        }

        let parsed: ChatCompletionResponse = parse_envelope(kind, &body)?;
        Ok(parsed.into_text())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatCompletionMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(kind: ProviderKind, model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            messages: [
                ChatCompletionMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            // GitHub Models rejects max_tokens for reasoning models.
            max_tokens: (kind == ProviderKind::OpenAi).then_some(MAX_TOKENS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionChoice {
    #[serde(default)]
    message: Option<ChatCompletionChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// `choices[0].message.content`, or empty when the path is missing.
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(kind: ProviderKind, server: &MockServer) -> ProviderConfig {
        let mut cfg = GatewayConfig::default();
        let url = format!("{}/chat/completions", server.uri());
        match kind {
            ProviderKind::GitHub => cfg.endpoints.github = Some(url),
            _ => cfg.endpoints.openai = Some(url),
        }
        cfg.credentials.set(kind, Some("test-key".to_string()));
        cfg.provider(kind)
    }

    #[test]
    fn openai_request_carries_token_cap_but_github_does_not() {
        let openai = serde_json::to_value(ChatCompletionRequest::new(ProviderKind::OpenAi, "gpt-4o-mini", "hi"))
            .expect("serialize");
        assert_eq!(openai["max_tokens"], json!(8000));
        assert_eq!(openai["messages"][0]["role"], json!("system"));
        assert_eq!(openai["messages"][1]["content"], json!("hi"));

        let github = serde_json::to_value(ChatCompletionRequest::new(
            ProviderKind::GitHub,
            "openai/gpt-4o-mini",
            "hi",
        ))
        .expect("serialize");
        assert!(github.get("max_tokens").is_none());
        assert!((github["temperature"].as_f64().expect("temperature") - 0.7).abs() < 1e-6);
    }

    #[test]
    fn missing_choice_path_degrades_to_empty_text() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert_eq!(parsed.into_text(), "");
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).expect("parse");
        assert_eq!(parsed.into_text(), "");
    }

    #[tokio::test]
    async fn openai_success_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini", "max_tokens": 8000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Hello" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(ProviderKind::OpenAi, &server);
        let text = OpenAiClient::new(reqwest::Client::new(), "test-key", &p)
            .generate("say hello")
            .await
            .expect("generate");
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn github_sends_api_version_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("x-github-api-version", "2022-11-28"))
            .and(header("accept", "application/vnd.github+json"))
            .and(body_partial_json(json!({ "model": "openai/gpt-4o-mini" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "from github" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(ProviderKind::GitHub, &server);
        let text = OpenAiClient::new(reqwest::Client::new(), "test-key", &p)
            .generate("hi")
            .await
            .expect("generate");
        assert_eq!(text, "from github");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "You exceeded your current quota", "type": "insufficient_quota" }
            })))
            .mount(&server)
            .await;

        let p = provider(ProviderKind::OpenAi, &server);
        let err = OpenAiClient::new(reqwest::Client::new(), "test-key", &p)
            .generate("hi")
            .await
            .expect_err("must fail");
        let LlmError::Transport { provider, message } = &err else {
            panic!("expected transport error, got {err:?}");
        };
        assert_eq!(*provider, ProviderKind::OpenAi);
        assert!(message.contains("status=429"));
        assert!(message.contains("You exceeded your current quota"));
        assert!(err.is_quota_exhausted());
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let p = provider(ProviderKind::OpenAi, &server);
        let err = OpenAiClient::new(reqwest::Client::new(), "test-key", &p)
            .generate("hi")
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("unexpected response body"));
    }
}
