use crate::catalog::{CLAUDE_MODEL, GEMINI_MODEL, OPENAI_MODEL, resolve_github_model};
use crate::types::{ProviderKind, ProviderSelector};
use serde::{Deserialize, Serialize};

pub(crate) const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub(crate) const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub(crate) const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub(crate) const GITHUB_CHAT_COMPLETIONS_URL: &str =
    "https://models.github.ai/inference/chat/completions";

/// One secret per provider. Blank strings count as absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub claude: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
}

/// User-supplied credentials layered over the process defaults for one session.
pub type CredentialOverrides = Credentials;

impl Credentials {
    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        let slot = match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Claude => &self.claude,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::GitHub => &self.github,
        };
        slot.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, kind: ProviderKind, value: Option<String>) {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let slot = match kind {
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Claude => &mut self.claude,
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::GitHub => &mut self.github,
        };
        *slot = value;
    }

    /// Returns a copy where every non-blank value in `overrides` wins.
    pub fn overlay(&self, overrides: &CredentialOverrides) -> Self {
        let mut out = self.clone();
        for kind in ProviderKind::FALLBACK_ORDER {
            if let Some(v) = overrides.get(kind) {
                out.set(kind, Some(v.to_string()));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        ProviderKind::FALLBACK_ORDER
            .iter()
            .all(|kind| self.get(*kind).is_none())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = |kind| if self.get(kind).is_some() { "set" } else { "unset" };
        f.debug_struct("Credentials")
            .field("gemini", &state(ProviderKind::Gemini))
            .field("claude", &state(ProviderKind::Claude))
            .field("openai", &state(ProviderKind::OpenAi))
            .field("github", &state(ProviderKind::GitHub))
            .finish()
    }
}

/// Optional endpoint replacements, used to point providers at a proxy or a local mock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverrides {
    /// Base URL; `/models/{model}:generateContent` is appended.
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub claude: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
}

impl EndpointOverrides {
    fn get(&self, kind: ProviderKind) -> Option<&str> {
        let slot = match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Claude => &self.claude,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::GitHub => &self.github,
        };
        slot.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Everything needed to address one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub credential: Option<String>,
    pub endpoint: String,
    pub model_id: String,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("credential", &self.credential.as_ref().map(|_| "REDACTED"))
            .field("endpoint", &self.endpoint)
            .field("model_id", &self.model_id)
            .finish()
    }
}

/// Per-call gateway configuration. Cheap to clone; never mutated during a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    pub selector: ProviderSelector,
    pub credentials: Credentials,
    pub github_model: Option<String>,
    pub endpoints: EndpointOverrides,
}

impl GatewayConfig {
    pub fn with_selector(mut self, selector: ProviderSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn provider(&self, kind: ProviderKind) -> ProviderConfig {
        let endpoint = self
            .endpoints
            .get(kind)
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                match kind {
                    ProviderKind::Gemini => GEMINI_BASE_URL,
                    ProviderKind::Claude => ANTHROPIC_MESSAGES_URL,
                    ProviderKind::OpenAi => OPENAI_CHAT_COMPLETIONS_URL,
                    ProviderKind::GitHub => GITHUB_CHAT_COMPLETIONS_URL,
                }
                .to_string()
            });
        let model_id = match kind {
            ProviderKind::Gemini => GEMINI_MODEL,
            ProviderKind::Claude => CLAUDE_MODEL,
            ProviderKind::OpenAi => OPENAI_MODEL,
            ProviderKind::GitHub => resolve_github_model(self.github_model.as_deref()),
        };
        ProviderConfig {
            kind,
            credential: self.credentials.get(kind).map(str::to_string),
            endpoint,
            model_id: model_id.to_string(),
        }
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.credentials.get(kind).is_some()
    }

    /// Providers with a credential, in fallback order.
    pub fn eligible_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::FALLBACK_ORDER
            .into_iter()
            .filter(|kind| self.is_configured(*kind))
            .collect()
    }
}
