use crate::routes::{ApiError, ApiResult, download, gateway_config_for, session_id, with_session};
use crate::server::QaState;
use crate::workflows;
use axum::extract::Path;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json};
use qa_tools::{TestPlanRequest, Tester, Timeline, UploadedDocument};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneratePlanRequest {
    #[serde(default)]
    requirements: String,
    #[serde(default)]
    documents: Vec<UploadedDocument>,
    #[serde(default)]
    timeline: Option<Timeline>,
    #[serde(default)]
    testers: Vec<Tester>,
    #[serde(default)]
    custom_instructions: String,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/qa/sessions/{id}/test-plan",
            get(get_test_plan).post(generate_test_plan),
        )
        .route("/api/v1/qa/sessions/{id}/test-plan.md", get(download_test_plan))
}

#[tracing::instrument(level = "info", skip_all)]
async fn generate_test_plan(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<GeneratePlanRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let cfg = gateway_config_for(&state, id)?;
    let (requirements, skipped) =
        qa_tools::combine_requirements(&req.requirements, &req.documents, state.extractor.as_ref());
    let plan_request = TestPlanRequest {
        requirements,
        timeline: req.timeline,
        testers: req.testers,
        custom_instructions: req.custom_instructions,
    };

    let plan = workflows::generate_test_plan(&state.gateway, &cfg, &plan_request).await?;
    with_session(&state, id, |s| {
        s.test_plan_request = Some(plan_request);
        s.test_plan = Some(plan.clone());
    })?;
    tracing::info!(session_id = %id, "test plan stored");
    Ok(Json(serde_json::json!({
        "status": "ok",
        "test_plan": plan,
        "skipped_documents": skipped,
    })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_test_plan(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let (plan, request) =
        with_session(&state, id, |s| (s.test_plan.clone(), s.test_plan_request.clone()))?;
    let plan = plan.ok_or_else(|| ApiError::not_found("no test plan generated yet"))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "test_plan": plan,
        "request": request,
    })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn download_test_plan(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = session_id(&id)?;
    let markdown = with_session(&state, id, |s| s.test_plan.as_ref().map(|p| p.markdown.clone()))?
        .ok_or_else(|| ApiError::not_found("no test plan generated yet"))?;
    Ok(download(
        markdown.into_bytes(),
        "text/markdown; charset=utf-8",
        "test_plan.md",
    ))
}
