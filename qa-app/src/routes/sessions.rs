use crate::routes::{ApiError, ApiResult, session_id, with_session};
use crate::server::QaState;
use crate::session::SessionSettings;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json};
use qa_llm::{ProviderKind, ProviderSelector};
use serde::Deserialize;
use std::sync::Arc;

/// Per-provider credential updates; a blank value clears the override.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyUpdates {
    #[serde(default)]
    gemini: Option<String>,
    #[serde(default)]
    claude: Option<String>,
    #[serde(default)]
    openai: Option<String>,
    #[serde(default)]
    github: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateSessionConfigRequest {
    /// `auto`, a provider name, or blank to follow the server default.
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    keys: Option<KeyUpdates>,
    #[serde(default)]
    github_model: Option<String>,
    #[serde(default)]
    module: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/qa/sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/api/v1/qa/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/v1/qa/sessions/{id}/config", post(update_session_config))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_session(
    Extension(state): Extension<Arc<QaState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let session = state.sessions.create();
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "created", "session": session })),
    )
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_sessions(Extension(state): Extension<Arc<QaState>>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({ "status": "ok", "sessions": sessions }))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_session(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let (summary, settings) = with_session(&state, id, |s| (s.summary(), s.settings.clone()))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "session": summary,
        "settings": settings_view(&settings),
    })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn delete_session(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    if !state.sessions.delete(id) {
        return Err(ApiError::not_found(format!("session not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "status": "deleted", "id": id })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn update_session_config(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionConfigRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let provider = match req.provider.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(
            raw.parse::<ProviderSelector>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        )),
    };

    let settings = with_session(&state, id, |s| {
        if let Some(provider) = provider {
            s.settings.provider = provider;
        }
        if let Some(keys) = req.keys {
            apply_key_updates(&mut s.settings, keys);
        }
        if let Some(model) = req.github_model {
            let model = model.trim().to_string();
            s.settings.github_model = (!model.is_empty()).then_some(model);
        }
        if let Some(module) = req.module.as_deref() {
            s.test_cases.set_module(module);
        }
        s.settings.clone()
    })?;
    tracing::info!(
        session_id = %id,
        provider = ?settings.provider,
        overridden = ?settings.overridden_providers(),
        "session config updated"
    );
    Ok(Json(serde_json::json!({
        "status": "ok",
        "settings": settings_view(&settings),
    })))
}

fn apply_key_updates(settings: &mut SessionSettings, keys: KeyUpdates) {
    let updates = [
        (ProviderKind::Gemini, keys.gemini),
        (ProviderKind::Claude, keys.claude),
        (ProviderKind::OpenAi, keys.openai),
        (ProviderKind::GitHub, keys.github),
    ];
    for (kind, value) in updates {
        // Absent leaves the override alone; blank clears it.
        if let Some(value) = value {
            settings.credentials.set(kind, Some(value));
        }
    }
}

fn settings_view(settings: &SessionSettings) -> serde_json::Value {
    serde_json::json!({
        "provider": settings.provider,
        "github_model": settings.github_model,
        "credential_overrides": settings.overridden_providers(),
    })
}
