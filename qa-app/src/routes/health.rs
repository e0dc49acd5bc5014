use crate::server::QaState;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/qa/health", get(get_health))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<QaState>>) -> Json<serde_json::Value> {
    let configured = state.gateway_config.eligible_providers();
    Json(serde_json::json!({
        "status": "ok",
        "ready": true,
        "checked_at": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": state.sessions.len(),
        "checks": {
            "providers": {
                "selector": state.gateway_config.selector,
                "configured": configured,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{ScriptedBackend, app_with, gemini_only, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_reports_configured_providers() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let (status, body) = send(&app, "GET", "/api/v1/qa/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["providers"]["configured"], serde_json::json!(["gemini"]));
        assert_eq!(body["checks"]["providers"]["selector"], "auto");
    }
}
