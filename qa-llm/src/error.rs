use crate::types::ProviderKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// One failed attempt inside an automatic fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub message: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{provider} is not configured: missing {}", .provider.credential_env())]
    NotConfigured { provider: ProviderKind },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    #[error("all providers failed: {}", join_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },

    #[error(
        "no provider configured; set at least one of GEMINI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY or GITHUB_TOKEN"
    )]
    NoProviderConfigured,
}

impl LlmError {
    pub(crate) fn transport(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    /// True for rate-limit and quota-exhaustion failures (HTTP 429, `RESOURCE_EXHAUSTED`).
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            Self::Transport { message, .. } => is_quota_message(message),
            _ => false,
        }
    }

    /// True when the caller could fix the error by supplying configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured { .. } | Self::NoProviderConfigured)
    }
}

pub(crate) fn is_quota_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    message.contains("429")
        || message.contains("RESOURCE_EXHAUSTED")
        || lower.contains("insufficient_quota")
        || lower.contains("quota exceeded")
        || lower.contains("rate limit")
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_failures_in_order() {
        let err = LlmError::AllProvidersFailed {
            failures: vec![
                ProviderFailure {
                    provider: ProviderKind::Gemini,
                    message: "status=500 boom".to_string(),
                },
                ProviderFailure {
                    provider: ProviderKind::GitHub,
                    message: "status=401 bad token".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "all providers failed: gemini: status=500 boom; github: status=401 bad token"
        );
    }

    #[test]
    fn quota_markers_are_detected() {
        let err = LlmError::transport(
            ProviderKind::Gemini,
            "status=429 Too Many Requests: RESOURCE_EXHAUSTED",
        );
        assert!(err.is_quota_exhausted());
        let err = LlmError::transport(ProviderKind::OpenAi, "status=500 internal");
        assert!(!err.is_quota_exhausted());
        assert!(!LlmError::NoProviderConfigured.is_quota_exhausted());
    }

    #[test]
    fn not_configured_names_the_env_var() {
        let err = LlmError::NotConfigured {
            provider: ProviderKind::Claude,
        };
        assert_eq!(
            err.to_string(),
            "claude is not configured: missing ANTHROPIC_API_KEY"
        );
        assert!(err.is_configuration());
    }
}
