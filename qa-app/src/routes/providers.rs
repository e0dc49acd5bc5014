use crate::routes::{ApiResult, gateway_config_for, session_id};
use crate::server::QaState;
use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json};
use qa_llm::{DEFAULT_GITHUB_MODEL, GITHUB_MODELS, GatewayConfig, ProviderKind};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct ProvidersQuery {
    /// Evaluate with this session's overrides applied.
    #[serde(default)]
    session: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/qa/providers", get(list_providers))
        .route("/api/v1/qa/providers/github-models", get(list_github_models))
}

fn effective_config(state: &QaState, query: &ProvidersQuery) -> ApiResult<GatewayConfig> {
    match query.session.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => gateway_config_for(state, session_id(raw)?),
        None => Ok(state.gateway_config.clone()),
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_providers(
    Extension(state): Extension<Arc<QaState>>,
    Query(query): Query<ProvidersQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let cfg = effective_config(&state, &query)?;
    let providers: Vec<serde_json::Value> = ProviderKind::FALLBACK_ORDER
        .into_iter()
        .map(|kind| {
            let provider = cfg.provider(kind);
            serde_json::json!({
                "name": kind,
                "display_name": kind.display_name(),
                "configured": provider.is_configured(),
                "model": provider.model_id,
                "credential_env": kind.credential_env(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "status": "ok",
        "selector": cfg.selector,
        "fallback_order": ProviderKind::FALLBACK_ORDER,
        "eligible": cfg.eligible_providers(),
        "providers": providers,
    })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_github_models(
    Extension(state): Extension<Arc<QaState>>,
    Query(query): Query<ProvidersQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let cfg = effective_config(&state, &query)?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "default": DEFAULT_GITHUB_MODEL,
        "selected": cfg.provider(ProviderKind::GitHub).model_id,
        "models": GITHUB_MODELS,
    })))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{ScriptedBackend, app_with, create_session, gemini_only, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn lists_providers_in_fallback_order() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let (status, body) = send(&app, "GET", "/api/v1/qa/providers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback_order"], json!(["gemini", "claude", "openai", "github"]));
        assert_eq!(body["eligible"], json!(["gemini"]));
        assert_eq!(body["providers"][0]["configured"], true);
        assert_eq!(body["providers"][1]["configured"], false);
        assert_eq!(body["providers"][1]["credential_env"], "ANTHROPIC_API_KEY");
    }

    #[tokio::test]
    async fn session_overrides_are_reflected() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let id = create_session(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/config"),
            Some(json!({ "keys": { "github": "ghp_x" }, "github_model": "deepseek/deepseek-r1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", &format!("/api/v1/qa/providers?session={id}"), None).await;
        assert_eq!(body["eligible"], json!(["gemini", "github"]));

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/qa/providers/github-models?session={id}"),
            None,
        )
        .await;
        assert_eq!(body["selected"], "deepseek/deepseek-r1");
        assert_eq!(body["default"], "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let (status, body) = send(
            &app,
            "GET",
            "/api/v1/qa/providers?session=6f1c3f5e-8f9a-4c55-9a55-0a4d1e9b7c11",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "not_found");
    }
}
