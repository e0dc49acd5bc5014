pub const GEMINI_MODEL: &str = "gemini-flash-latest";
pub const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GITHUB_MODEL: &str = "openai/gpt-4o-mini";

/// Models the GitHub Models inference endpoint accepts.
pub const GITHUB_MODELS: &[&str] = &[
    "openai/gpt-5",
    "openai/gpt-5-chat",
    "openai/gpt-5-mini",
    "openai/gpt-5-nano",
    "openai/gpt-4.1",
    "openai/gpt-4.1-mini",
    "openai/gpt-4.1-nano",
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
    "openai/o1",
    "openai/o1-mini",
    "openai/o1-preview",
    "openai/o3",
    "openai/o3-mini",
    "openai/o4-mini",
    "openai/text-embedding-3-small",
    "openai/text-embedding-3-large",
    "microsoft/phi-4",
    "microsoft/phi-4-mini-instruct",
    "microsoft/phi-4-mini-reasoning",
    "microsoft/phi-4-multimodal-instruct",
    "microsoft/phi-4-reasoning",
    "microsoft/phi-3-medium-128k-instruct",
    "microsoft/phi-3-mini-128k-instruct",
    "microsoft/mai-ds-r1",
    "ai21/jamba-1.5-large",
    "meta/llama-4-scout-17b-16e-instruct",
    "meta/llama-4-maverick-17b-128e-instruct-fp8",
    "meta/llama-3.3-70b-instruct",
    "meta/llama-3.2-90b-vision-instruct",
    "meta/llama-3.2-11b-vision-instruct",
    "meta/llama-3.1-405b-instruct",
    "meta/llama-3.1-70b-instruct",
    "meta/llama-3.1-8b-instruct",
    "cohere/command-r-plus-08-2024",
    "cohere/command-r-08-2024",
    "cohere/command-a",
    "mistralai/mistral-small-3.1",
    "mistralai/codestral-25.01",
    "mistralai/mistral-medium-3",
    "mistralai/ministral-3b",
    "mistralai/mistral-large",
    "mistralai/mistral-nemo",
    "deepseek/deepseek-v3-0324",
    "deepseek/deepseek-r1-0528",
    "deepseek/deepseek-r1",
    "xai/grok-3",
    "xai/grok-3-mini",
    "google/gemma-2-27b-it",
    "google/gemma-2-9b-it",
];

/// Map a requested GitHub model onto the catalog, case-insensitively.
///
/// Unset, blank, or unknown values resolve to [`DEFAULT_GITHUB_MODEL`].
pub fn resolve_github_model(requested: Option<&str>) -> &'static str {
    let Some(raw) = requested else {
        return DEFAULT_GITHUB_MODEL;
    };
    let trimmed = raw.trim();
    GITHUB_MODELS
        .iter()
        .copied()
        .find(|m| m.eq_ignore_ascii_case(trimmed))
        .unwrap_or_else(|| {
            if !trimmed.is_empty() {
                tracing::warn!(requested = %trimmed, "unknown github model; using default");
            }
            DEFAULT_GITHUB_MODEL
        })
}
