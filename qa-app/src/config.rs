//! QA Suite configuration loader.

use qa_llm::{Credentials, EndpointOverrides, GatewayConfig, ProviderKind, ProviderSelector};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QaSuiteConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// `auto` or one of `gemini`, `claude`, `openai`, `github`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_module")]
    pub module: String,
}

fn default_provider() -> String {
    "auto".to_string()
}

fn default_module() -> String {
    qa_tools::DEFAULT_MODULE.to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            module: default_module(),
        }
    }
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct KeysConfig {
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub github_token: Option<String>,
    pub github_model: Option<String>,
}

impl std::fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = |v: &Option<String>| if v.is_some() { "REDACTED" } else { "unset" };
        f.debug_struct("KeysConfig")
            .field("gemini_api_key", &state(&self.gemini_api_key))
            .field("anthropic_api_key", &state(&self.anthropic_api_key))
            .field("openai_api_key", &state(&self.openai_api_key))
            .field("github_token", &state(&self.github_token))
            .field("github_model", &self.github_model)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub endpoints: EndpointOverrides,
}

fn default_request_timeout_seconds() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
            endpoints: EndpointOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_in_flight")]
    pub http_max_in_flight: usize,
    /// Sessions untouched for this long are dropped.
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8600".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    300
}

fn default_http_max_in_flight() -> usize {
    64
}

fn default_session_idle_minutes() -> u64 {
    240
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            http_timeout_seconds: default_http_timeout_seconds(),
            http_max_in_flight: default_http_max_in_flight(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

impl QaSuiteConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::load_with_path(path).await?.0)
    }

    /// Load from `path`, `QASUITE_CONFIG`, or `~/.qasuite/config.toml`.
    ///
    /// A missing file yields defaults; env overrides apply either way.
    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, PathBuf)> {
        let path = path
            .or_else(|| {
                std::env::var("QASUITE_CONFIG")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(default_config_path);

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config_path = %path.display(), "config file not found; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok((cfg, path))
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = var("QASUITE_PROVIDER") {
            self.general.provider = v;
        }
        if let Some(v) = var("QASUITE_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = var("GEMINI_API_KEY") {
            self.keys.gemini_api_key = Some(v);
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.keys.anthropic_api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.keys.openai_api_key = Some(v);
        }
        if let Some(v) = var("GITHUB_TOKEN") {
            self.keys.github_token = Some(v);
        }
        if let Some(v) = var("GITHUB_MODEL") {
            self.keys.github_model = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.provider_selector()?;
        self.bind_addr()?;
        if self.llm.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("llm.request_timeout_seconds must be > 0"));
        }
        if self.server.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("server.http_timeout_seconds must be > 0"));
        }
        if self.server.http_max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.http_max_in_flight must be > 0"));
        }
        if self.server.session_idle_minutes == 0 {
            return Err(anyhow::anyhow!("server.session_idle_minutes must be > 0"));
        }
        Ok(())
    }

    pub fn provider_selector(&self) -> anyhow::Result<ProviderSelector> {
        self.general
            .provider
            .parse()
            .map_err(|e| anyhow::anyhow!("general.provider: {e}"))
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind_addr
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("server.bind_addr {:?}: {e}", self.server.bind_addr))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_seconds)
    }

    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::default();
        credentials.set(ProviderKind::Gemini, self.keys.gemini_api_key.clone());
        credentials.set(ProviderKind::Claude, self.keys.anthropic_api_key.clone());
        credentials.set(ProviderKind::OpenAi, self.keys.openai_api_key.clone());
        credentials.set(ProviderKind::GitHub, self.keys.github_token.clone());
        credentials
    }

    /// Process-wide gateway defaults that sessions layer their overrides on.
    pub fn gateway_config(&self) -> anyhow::Result<GatewayConfig> {
        Ok(GatewayConfig {
            selector: self.provider_selector()?,
            credentials: self.credentials(),
            github_model: self
                .keys
                .github_model
                .clone()
                .filter(|v| !v.trim().is_empty()),
            endpoints: self.llm.endpoints.clone(),
        })
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".qasuite").join("config.toml")
}
