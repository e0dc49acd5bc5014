use crate::anthropic::AnthropicClient;
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;
use crate::types::ProviderKind;
use async_trait::async_trait;
use std::time::Duration;

/// System instruction sent with every prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert QA engineer with extensive experience in test automation and test planning.";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Sends one prompt to one provider and returns the generated text.
///
/// Implementations perform exactly one outbound call per invocation; the
/// gateway owns fallback.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, provider: &ProviderConfig, prompt: &str) -> Result<String>;
}

/// Raw-HTTP backend for all four providers.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
}

impl HttpBackend {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(request_timeout: Option<Duration>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self { http }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    #[tracing::instrument(level = "info", skip_all, fields(provider = %provider.kind, model = %provider.model_id))]
    async fn complete(&self, provider: &ProviderConfig, prompt: &str) -> Result<String> {
        let Some(credential) = provider.credential.as_deref() else {
            return Err(LlmError::NotConfigured {
                provider: provider.kind,
            });
        };
        match provider.kind {
            ProviderKind::Gemini => {
                GeminiClient::new(self.http.clone(), credential, provider)
                    .generate(prompt)
                    .await
            }
            ProviderKind::Claude => {
                AnthropicClient::new(self.http.clone(), credential, provider)
                    .generate(prompt)
                    .await
            }
            ProviderKind::OpenAi | ProviderKind::GitHub => {
                OpenAiClient::new(self.http.clone(), credential, provider)
                    .generate(prompt)
                    .await
            }
        }
    }
}

/// Human-readable failure text: `error.message` from a JSON body when present,
/// otherwise the raw body, prefixed by the HTTP status.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| extract_error_detail(&v))
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        return format!("status={status}");
    }
    format!("status={status} {detail}")
}

fn extract_error_detail(v: &serde_json::Value) -> Option<String> {
    let error = v.get("error")?;
    if let Some(s) = error.as_str() {
        return Some(s.to_string());
    }
    let message = error.get("message").and_then(|m| m.as_str())?;
    match error.get("status").and_then(|s| s.as_str()) {
        // Gemini carries the quota marker in `error.status`.
        Some(code) if !message.contains(code) => Some(format!("{code}: {message}")),
        _ => Some(message.to_string()),
    }
}

pub(crate) fn request_error(kind: ProviderKind, e: reqwest::Error) -> LlmError {
    LlmError::transport(kind, format!("request error: {e}"))
}

pub(crate) fn parse_envelope<T: serde::de::DeserializeOwned>(
    kind: ProviderKind,
    body: &str,
) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        LlmError::transport(kind, format!("unexpected response body ({e}): {}", truncate(body, 200)))
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
