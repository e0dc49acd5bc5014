use crate::routes::{ApiResult, gateway_config_for, session_id, with_session};
use crate::server::QaState;
use crate::workflows;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json};
use qa_tools::BugReportRequest;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route(
        "/api/v1/qa/sessions/{id}/bug-reports",
        get(list_bug_reports).post(create_bug_report),
    )
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_bug_reports(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let reports = with_session(&state, id, |s| s.bug_reports.clone())?;
    Ok(Json(serde_json::json!({ "status": "ok", "bug_reports": reports })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_bug_report(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<BugReportRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let id = session_id(&id)?;
    let cfg = gateway_config_for(&state, id)?;
    let report = workflows::generate_bug_report(&state.gateway, &cfg, &req).await?;
    with_session(&state, id, |s| s.bug_reports.push(report.clone()))?;
    tracing::info!(session_id = %id, bug_report_id = %report.id, "bug report stored");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "created", "bug_report": report })),
    ))
}
