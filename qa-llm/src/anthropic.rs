use crate::client::{SYSTEM_INSTRUCTION, error_message, parse_envelope, request_error};
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8000;

pub struct AnthropicClient<'a> {
    http: reqwest::Client,
    api_key: &'a str,
    provider: &'a ProviderConfig,
}

impl<'a> AnthropicClient<'a> {
    pub fn new(http: reqwest::Client, api_key: &'a str, provider: &'a ProviderConfig) -> Self {
        Self {
            http,
            api_key,
            provider,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let kind = self.provider.kind;
        let req = AnthropicRequest {
            model: &self.provider.model_id,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_INSTRUCTION,
            messages: [AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.provider.endpoint)
            .header("x-api-key", self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await
            .map_err(|e| request_error(kind, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| request_error(kind, e))?;
        if !status.is_success() {
            return Err(LlmError::transport(kind, error_message(status, &body)));
        }

        let parsed: AnthropicResponse = parse_envelope(kind, &body)?;
        Ok(parsed.into_text())
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [AnthropicMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicResponse {
    /// `content[0].text`, or empty when the path is missing.
    fn into_text(self) -> String {
        self.content
            .into_iter()
            .next()
            .and_then(|b| b.text)
            .unwrap_or_default()
    }
}
