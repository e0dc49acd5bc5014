use crate::client::{SYSTEM_INSTRUCTION, error_message, parse_envelope, request_error};
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};

pub struct GeminiClient<'a> {
    http: reqwest::Client,
    api_key: &'a str,
    provider: &'a ProviderConfig,
}

impl<'a> GeminiClient<'a> {
    pub fn new(http: reqwest::Client, api_key: &'a str, provider: &'a ProviderConfig) -> Self {
        Self {
            http,
            api_key,
            provider,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.provider.endpoint, self.provider.model_id
        )
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let kind = self.provider.kind;
        let req = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| request_error(kind, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| request_error(kind, e))?;
        if !status.is_success() {
            return Err(LlmError::transport(kind, error_message(status, &body)));
        }

        let parsed: GeminiResponse = parse_envelope(kind, &body)?;
        Ok(parsed.into_text())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Text parts of the first candidate, concatenated. Empty when absent.
    fn into_text(self) -> String {
        let Some(content) = self.candidates.into_iter().next().and_then(|c| c.content) else {
            return String::new();
        };
        content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::types::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> ProviderConfig {
        let mut cfg = GatewayConfig::default();
        cfg.endpoints.gemini = Some(server.uri());
        cfg.credentials.set(ProviderKind::Gemini, Some("g-key".to_string()));
        cfg.provider(ProviderKind::Gemini)
    }

    #[tokio::test]
    async fn joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hel" }, { "text": "lo" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server);
        let text = GeminiClient::new(reqwest::Client::new(), "g-key", &p)
            .generate("hi")
            .await
            .expect("generate");
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn quota_exhaustion_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let err = GeminiClient::new(reqwest::Client::new(), "g-key", &p)
            .generate("hi")
            .await
            .expect_err("must fail");
        assert!(err.is_quota_exhausted());
        assert!(err.to_string().starts_with("gemini request failed: status=429"));
    }

    #[test]
    fn blocked_prompt_without_candidates_is_empty() {
        let parsed: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).expect("parse");
        assert_eq!(parsed.into_text(), "");
    }
}
