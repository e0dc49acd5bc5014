use crate::client::{CompletionBackend, HttpBackend};
use crate::config::GatewayConfig;
use crate::error::{LlmError, ProviderFailure, Result};
use crate::types::{GenerationRequest, ProviderKind, ProviderSelector};
use std::sync::Arc;
use std::time::Instant;

/// Routes prompts to one pinned provider or walks them in fallback order.
///
/// Holds no per-call state: configuration is passed to every call, so one
/// gateway can be shared across sessions behind an `Arc`.
#[derive(Clone)]
pub struct AiGateway {
    backend: Arc<dyn CompletionBackend>,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn http(request_timeout: Option<std::time::Duration>) -> Self {
        Self::new(Arc::new(HttpBackend::new(request_timeout)))
    }

    /// Generate text for `request`, using its selector or else the config's.
    pub async fn execute(&self, config: &GatewayConfig, request: &GenerationRequest) -> Result<String> {
        self.generate(config, &request.prompt, request.provider)
            .await
    }

    #[tracing::instrument(level = "info", skip_all, fields(selector = tracing::field::Empty))]
    pub async fn generate(
        &self,
        config: &GatewayConfig,
        prompt: &str,
        selector: Option<ProviderSelector>,
    ) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(LlmError::InvalidInput("prompt must not be empty".to_string()));
        }
        let selector = selector.unwrap_or(config.selector);
        tracing::Span::current().record("selector", selector.as_str());

        match selector {
            ProviderSelector::Pinned(kind) => self.call_pinned(config, kind, prompt).await,
            ProviderSelector::Auto => self.call_with_fallback(config, prompt).await,
        }
    }

    async fn call_pinned(&self, config: &GatewayConfig, kind: ProviderKind, prompt: &str) -> Result<String> {
        let provider = config.provider(kind);
        if !provider.is_configured() {
            return Err(LlmError::NotConfigured { provider: kind });
        }
        let started = Instant::now();
        let result = self.backend.complete(&provider, prompt).await;
        match &result {
            Ok(text) => tracing::info!(
                provider = %kind,
                latency_ms = started.elapsed().as_millis() as u64,
                response_chars = text.len(),
                "pinned provider succeeded"
            ),
            Err(e) => tracing::warn!(
                provider = %kind,
                latency_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "pinned provider failed"
            ),
        }
        result
    }

    async fn call_with_fallback(&self, config: &GatewayConfig, prompt: &str) -> Result<String> {
        let eligible = config.eligible_providers();
        if eligible.is_empty() {
            return Err(LlmError::NoProviderConfigured);
        }

        let mut failures = Vec::with_capacity(eligible.len());
        for kind in eligible {
            let provider = config.provider(kind);
            let started = Instant::now();
            match self.backend.complete(&provider, prompt).await {
                Ok(text) => {
                    tracing::info!(
                        provider = %kind,
                        attempt = failures.len() + 1,
                        latency_ms = started.elapsed().as_millis() as u64,
                        response_chars = text.len(),
                        "provider succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %kind,
                        quota_exhausted = e.is_quota_exhausted(),
                        latency_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "provider failed; trying next provider"
                    );
                    failures.push(ProviderFailure {
                        provider: kind,
                        message: failure_message(e),
                    });
                }
            }
        }

        Err(LlmError::AllProvidersFailed { failures })
    }
}

/// Strip the provider prefix that the aggregate adds back.
fn failure_message(e: LlmError) -> String {
    match e {
        LlmError::Transport { message, .. } => message,
        other => other.to_string(),
    }
}
