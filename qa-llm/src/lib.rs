//! Multi-provider LLM gateway for QA Suite.
//!
//! Pure HTTP clients for Gemini, Claude, OpenAI and GitHub Models, plus an
//! [`AiGateway`] that either pins one provider or walks them in a fixed
//! fallback order.

mod anthropic;
mod catalog;
mod client;
mod config;
mod error;
mod gateway;
mod gemini;
mod openai;
mod types;

pub use catalog::{
    CLAUDE_MODEL, DEFAULT_GITHUB_MODEL, GEMINI_MODEL, GITHUB_MODELS, OPENAI_MODEL,
    resolve_github_model,
};
pub use client::{CompletionBackend, HttpBackend, SYSTEM_INSTRUCTION};
pub use config::{
    CredentialOverrides, Credentials, EndpointOverrides, GatewayConfig, ProviderConfig,
};
pub use error::{LlmError, ProviderFailure, Result};
pub use gateway::AiGateway;
pub use types::{GenerationRequest, ProviderKind, ProviderSelector};
