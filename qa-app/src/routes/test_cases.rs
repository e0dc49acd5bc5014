use crate::routes::{ApiError, ApiResult, download, gateway_config_for, session_id, with_session};
use crate::server::QaState;
use crate::workflows;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Extension, Json};
use qa_tools::{
    Language, Priority, Severity, TestCaseDraft, TestCaseGenerationRequest, UploadedDocument,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerateTestCasesRequest {
    #[serde(default)]
    requirements: String,
    #[serde(default)]
    documents: Vec<UploadedDocument>,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    language: Language,
}

fn default_count() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdsRequest {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectRequest {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default = "default_selected")]
    selected: bool,
    /// Apply `selected` to every case, ignoring `ids`.
    #[serde(default)]
    all: bool,
}

fn default_selected() -> bool {
    true
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/qa/sessions/{id}/test-cases",
            get(list_test_cases).post(create_test_case),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/{tc_id}",
            put(update_test_case).delete(delete_test_case),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/delete",
            post(delete_test_cases),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/select",
            post(select_test_cases),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/generate",
            post(generate_test_cases),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/export.xlsx",
            get(export_xlsx),
        )
        .route(
            "/api/v1/qa/sessions/{id}/test-cases/export.csv",
            get(export_csv),
        )
        .route("/api/v1/qa/sessions/{id}/test-cases/text", get(export_text))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_test_cases(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let body = with_session(&state, id, |s| {
        let selected: Vec<String> = s.test_cases.selected().into_iter().map(|tc| tc.id).collect();
        serde_json::json!({
            "status": "ok",
            "module": s.test_cases.module(),
            "test_cases": s.test_cases.list(),
            "selected": selected,
        })
    })?;
    Ok(Json(body))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_test_case(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(draft): Json<TestCaseDraft>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let id = session_id(&id)?;
    let created = with_session(&state, id, |s| {
        s.test_cases
            .add_manual(draft, Priority::default(), Severity::default())
            .cloned()
    })??;
    tracing::info!(session_id = %id, test_case_id = %created.id, "test case created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "created", "test_case": created })),
    ))
}

#[tracing::instrument(level = "info", skip_all)]
async fn update_test_case(
    Extension(state): Extension<Arc<QaState>>,
    Path((id, tc_id)): Path<(String, String)>,
    Json(draft): Json<TestCaseDraft>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let updated = with_session(&state, id, |s| s.test_cases.update(&tc_id, draft).cloned())??;
    Ok(Json(serde_json::json!({ "status": "updated", "test_case": updated })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn delete_test_case(
    Extension(state): Extension<Arc<QaState>>,
    Path((id, tc_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let removed = with_session(&state, id, |s| s.test_cases.delete(&[tc_id.clone()]))?;
    if removed == 0 {
        return Err(ApiError::not_found(format!("test case not found: {tc_id}")));
    }
    Ok(Json(serde_json::json!({ "status": "deleted", "id": tc_id })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn delete_test_cases(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let deleted = with_session(&state, id, |s| s.test_cases.delete(&req.ids))?;
    Ok(Json(serde_json::json!({ "status": "ok", "deleted": deleted })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn select_test_cases(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let selected = with_session(&state, id, |s| {
        match (req.all, req.selected) {
            (true, true) => s.test_cases.select_all(),
            (true, false) => s.test_cases.clear_selection(),
            (false, selected) => s.test_cases.set_selected(&req.ids, selected),
        }
        s.test_cases
            .selected()
            .into_iter()
            .map(|tc| tc.id)
            .collect::<Vec<_>>()
    })?;
    Ok(Json(serde_json::json!({ "status": "ok", "selected": selected })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn generate_test_cases(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<GenerateTestCasesRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let cfg = gateway_config_for(&state, id)?;
    let (requirements, skipped) =
        qa_tools::combine_requirements(&req.requirements, &req.documents, state.extractor.as_ref());
    let generation = TestCaseGenerationRequest {
        requirements,
        count: req.count,
        priority: req.priority,
        severity: req.severity,
        language: req.language,
    };

    let cases = workflows::generate_test_cases(&state.gateway, &cfg, &generation).await?;
    let (ids, added) = with_session(&state, id, |s| {
        let ids = s.test_cases.add_generated(cases);
        let added = s.test_cases.find_many(&ids);
        (ids, added)
    })?;
    let added = added?;
    tracing::info!(session_id = %id, generated = ids.len(), "generated test cases stored");
    Ok(Json(serde_json::json!({
        "status": "ok",
        "generated": ids,
        "test_cases": added,
        "skipped_documents": skipped,
    })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn export_xlsx(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = session_id(&id)?;
    let cases = with_session(&state, id, |s| s.test_cases.list().to_vec())?;
    let bytes = qa_tools::test_cases_xlsx(&cases)?;
    Ok(download(
        bytes,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "test_cases.xlsx",
    ))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn export_csv(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = session_id(&id)?;
    let csv = with_session(&state, id, |s| qa_tools::test_cases_csv(s.test_cases.list()))?;
    Ok(download(csv.into_bytes(), "text/csv; charset=utf-8", "test_cases.csv"))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn export_text(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let text = with_session(&state, id, |s| qa_tools::render_test_cases_text(s.test_cases.list()))?;
    Ok(Json(serde_json::json!({ "status": "ok", "text": text })))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{
        ScriptedBackend, app_with, create_session, gemini_only, send, send_raw,
    };
    use axum::http::{StatusCode, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    const REPLY: &str = r#"Here are your cases:
{"test_cases": [
  {"id": "TC_001", "title": "Valid login", "test_steps": ["Open", "Submit"], "expected_results": ["Dashboard"], "priority": "High"},
  {"id": "TC_002", "title": "Locked account", "test_steps": ["Submit"], "expected_results": ["Error"], "severity": "Critical"}
]}"#;

    fn manual(title: &str) -> serde_json::Value {
        json!({
            "title": title,
            "preconditions": "User exists",
            "test_steps": "Open login\nSubmit",
            "expected_results": "Dashboard shown",
        })
    }

    #[tokio::test]
    async fn manual_crud() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let id = create_session(&app).await;
        let base = format!("/api/v1/qa/sessions/{id}/test-cases");

        let (status, body) = send(&app, "POST", &base, Some(manual("Login"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["test_case"]["id"], "TC_ReyadaServices_1");
        assert_eq!(body["test_case"]["test_steps"], json!(["Open login", "Submit"]));
        assert_eq!(body["test_case"]["priority"], "Medium");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("{base}/TC_ReyadaServices_1"),
            Some(json!({
                "title": "Login v2",
                "test_steps": "Open",
                "expected_results": "Ok",
                "priority": "High",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["test_case"]["title"], "Login v2");
        assert_eq!(body["test_case"]["priority"], "High");

        let (status, body) = send(
            &app,
            "POST",
            &base,
            Some(json!({
                "title": "No steps",
                "test_steps": " ",
                "expected_results": "",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("test_steps, expected_results"))
        );

        let (status, _) = send(&app, "DELETE", &format!("{base}/TC_ReyadaServices_1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", &format!("{base}/TC_ReyadaServices_1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_appends_numbered_cases() {
        let backend = ScriptedBackend::with(vec![Ok(REPLY)]);
        let app = app_with(backend.clone(), gemini_only());
        let id = create_session(&app).await;
        let base = format!("/api/v1/qa/sessions/{id}/test-cases");
        send(&app, "POST", &base, Some(manual("Existing"))).await;

        let doc = json!({
            "file_name": "story.md",
            "mime_type": "text/markdown",
            "content_base64": STANDARD.encode("Accounts lock after 3 failures"),
        });
        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/generate"),
            Some(json!({
                "requirements": "Login feature",
                "documents": [doc],
                "count": 2,
                "severity": "Minor",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["generated"],
            json!(["TC_ReyadaServices_G2", "TC_ReyadaServices_G3"])
        );
        assert_eq!(body["test_cases"][0]["priority"], "High");
        assert_eq!(body["test_cases"][0]["severity"], "Minor");
        assert_eq!(body["test_cases"][1]["severity"], "Critical");

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("Login feature"));
        assert!(prompt.contains("--- Content from story.md ---\nAccounts lock after 3 failures"));

        let (_, body) = send(&app, "GET", &base, None).await;
        assert_eq!(body["test_cases"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn generate_maps_provider_failure_to_bad_gateway() {
        let backend = ScriptedBackend::with(vec![Err("status=500 Internal")]);
        let app = app_with(backend, gemini_only());
        let id = create_session(&app).await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/test-cases/generate"),
            Some(json!({ "requirements": "Login" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let error = body["error"].as_str().expect("error text");
        assert!(error.contains("gemini"));
        assert!(error.contains("500 Internal"));
    }

    #[tokio::test]
    async fn generate_without_credentials_is_bad_request() {
        let app = app_with(ScriptedBackend::with(vec![]), qa_llm::GatewayConfig::default());
        let id = create_session(&app).await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/test-cases/generate"),
            Some(json!({ "requirements": "Login" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("no provider configured"))
        );
    }

    #[tokio::test]
    async fn selection_and_bulk_delete() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let id = create_session(&app).await;
        let base = format!("/api/v1/qa/sessions/{id}/test-cases");
        for title in ["A", "B", "C"] {
            send(&app, "POST", &base, Some(manual(title))).await;
        }

        let (_, body) = send(&app, "POST", &format!("{base}/select"), Some(json!({ "all": true }))).await;
        assert_eq!(body["selected"].as_array().map(Vec::len), Some(3));
        let (_, body) = send(
            &app,
            "POST",
            &format!("{base}/select"),
            Some(json!({ "ids": ["TC_ReyadaServices_2"], "selected": false })),
        )
        .await;
        assert_eq!(body["selected"], json!(["TC_ReyadaServices_1", "TC_ReyadaServices_3"]));

        let (_, body) = send(
            &app,
            "POST",
            &format!("{base}/delete"),
            Some(json!({ "ids": ["TC_ReyadaServices_1", "TC_missing"] })),
        )
        .await;
        assert_eq!(body["deleted"], 1);
    }

    #[tokio::test]
    async fn exports_have_download_headers() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let id = create_session(&app).await;
        let base = format!("/api/v1/qa/sessions/{id}/test-cases");
        send(&app, "POST", &base, Some(manual("Login"))).await;

        let response = send_raw(&app, "GET", &format!("{base}/export.xlsx"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"test_cases.xlsx\""
        );

        let response = send_raw(&app, "GET", &format!("{base}/export.csv"), None).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");

        let (_, body) = send(&app, "GET", &format!("{base}/text"), None).await;
        assert!(
            body["text"]
                .as_str()
                .is_some_and(|t| t.starts_with("ID: TC_ReyadaServices_1\nTitle: Login"))
        );
    }
}
