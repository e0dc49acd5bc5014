use crate::routes::{ApiError, ApiResult, download, gateway_config_for, session_id, with_session};
use crate::server::QaState;
use crate::workflows::{self, AutomationMode};
use axum::extract::{Path, Query};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json};
use qa_tools::{AutomationOptions, GeneratedFile};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AutomationRequest {
    /// Empty means the current selection.
    #[serde(default)]
    test_case_ids: Vec<String>,
    #[serde(default)]
    mode: AutomationMode,
    #[serde(default)]
    options: AutomationOptions,
}

#[derive(Debug, Deserialize)]
struct BundleQuery {
    label: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/qa/sessions/{id}/automation",
            get(list_automation).post(generate_automation),
        )
        .route(
            "/api/v1/qa/sessions/{id}/automation/bundle.zip",
            get(download_bundle),
        )
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_automation(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let suites = with_session(&state, id, |s| s.automation.clone())?;
    Ok(Json(serde_json::json!({ "status": "ok", "suites": suites })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn generate_automation(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<AutomationRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let cfg = gateway_config_for(&state, id)?;
    let cases = with_session(&state, id, |s| {
        if req.test_case_ids.is_empty() {
            Ok(s.test_cases.selected())
        } else {
            s.test_cases.find_many(&req.test_case_ids)
        }
    })??;

    let run =
        workflows::generate_automation(&state.gateway, &cfg, &cases, &req.options, req.mode).await?;
    with_session(&state, id, |s| {
        for suite in &run.suites {
            s.automation.retain(|existing| existing.label != suite.label);
            s.automation.push(suite.clone());
        }
    })?;
    tracing::info!(
        session_id = %id,
        suites = run.suites.len(),
        failed = run.failures.len(),
        "automation code stored"
    );
    let status = if run.failures.is_empty() { "ok" } else { "partial" };
    Ok(Json(serde_json::json!({
        "status": status,
        "suites": run.suites,
        "failures": run.failures,
    })))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn download_bundle(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> ApiResult<Response> {
    let id = session_id(&id)?;
    let suites = with_session(&state, id, |s| s.automation.clone())?;
    let suites: Vec<_> = match query.label.as_deref() {
        Some(label) => suites.into_iter().filter(|s| s.label == label).collect(),
        None => suites,
    };
    if suites.iter().all(|s| s.files.is_empty()) {
        return Err(ApiError::not_found("no generated code files"));
    }

    // Several suites may each emit the same helper file, so nest them.
    let nest = suites.len() > 1;
    let files: Vec<GeneratedFile> = suites
        .iter()
        .flat_map(|suite| {
            suite.files.iter().map(move |f| GeneratedFile {
                path: if nest {
                    format!("{}/{}", suite.label, f.path.trim_start_matches('/'))
                } else {
                    f.path.clone()
                },
                content: f.content.clone(),
            })
        })
        .collect();
    let bytes = qa_tools::code_bundle_zip(&files)?;
    Ok(download(bytes, "application/zip", "automation_code.zip"))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{
        ScriptedBackend, app_with, create_session, gemini_only, send, send_raw,
    };
    use axum::body::to_bytes;
    use axum::http::{StatusCode, header};
    use serde_json::json;
    use std::io::{Cursor, Read};

    const CODE: &str = "Here is the suite.\n// FILE: src/test/java/pages/LoginPage.java\nclass LoginPage {}\n// FILE: src/test/java/tests/LoginTest.java\nclass LoginTest {}";

    async fn seeded(app: &axum::Router) -> String {
        let id = create_session(app).await;
        for title in ["Login", "Logout"] {
            send(
                app,
                "POST",
                &format!("/api/v1/qa/sessions/{id}/test-cases"),
                Some(json!({ "title": title, "test_steps": "Go", "expected_results": "Done" })),
            )
            .await;
        }
        id
    }

    #[tokio::test]
    async fn combined_uses_selection_and_bundles_files() {
        let backend = ScriptedBackend::with(vec![Ok(CODE)]);
        let app = app_with(backend.clone(), gemini_only());
        let id = seeded(&app).await;
        send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/test-cases/select"),
            Some(json!({ "ids": ["TC_ReyadaServices_2"] })),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/automation"),
            Some(json!({ "options": { "bdd": true } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suites"][0]["label"], "combined");
        assert_eq!(body["suites"][0]["test_case_ids"], json!(["TC_ReyadaServices_2"]));
        assert_eq!(body["suites"][0]["files"].as_array().map(Vec::len), Some(2));
        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("Logout"));
        assert!(!prompt.contains("Test Case 2"));

        let response = send_raw(
            &app,
            "GET",
            &format!("/api/v1/qa/sessions/{id}/automation/bundle.zip"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("zip");
        let mut content = String::new();
        archive
            .by_name("src/test/java/tests/LoginTest.java")
            .expect("entry")
            .read_to_string(&mut content)
            .expect("read");
        assert_eq!(content, "class LoginTest {}");
    }

    #[tokio::test]
    async fn separate_mode_replaces_suites_by_label() {
        let backend = ScriptedBackend::with(vec![Ok(CODE), Ok(CODE), Ok(CODE)]);
        let app = app_with(backend.clone(), gemini_only());
        let id = seeded(&app).await;
        let uri = format!("/api/v1/qa/sessions/{id}/automation");

        let (_, body) = send(
            &app,
            "POST",
            &uri,
            Some(json!({
                "test_case_ids": ["TC_ReyadaServices_1", "TC_ReyadaServices_2"],
                "mode": "separate",
            })),
        )
        .await;
        assert_eq!(body["suites"].as_array().map(Vec::len), Some(2));
        send(
            &app,
            "POST",
            &uri,
            Some(json!({ "test_case_ids": ["TC_ReyadaServices_1"], "mode": "separate" })),
        )
        .await;
        assert_eq!(backend.prompts().len(), 3);

        let (_, body) = send(&app, "GET", &uri, None).await;
        let labels: Vec<&str> = body["suites"]
            .as_array()
            .expect("suites")
            .iter()
            .filter_map(|s| s["label"].as_str())
            .collect();
        assert_eq!(labels, vec!["TC_ReyadaServices_2", "TC_ReyadaServices_1"]);

        let response = send_raw(&app, "GET", &format!("{uri}/bundle.zip"), None).await;
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("zip");
        assert_eq!(archive.len(), 4);
        assert!(
            archive
                .file_names()
                .any(|n| n == "TC_ReyadaServices_1/src/test/java/pages/LoginPage.java")
        );
    }

    #[tokio::test]
    async fn separate_mode_reports_failed_cases_and_keeps_the_rest() {
        let backend = ScriptedBackend::with(vec![Ok(CODE), Err("status=500 Internal")]);
        let app = app_with(backend, gemini_only());
        let id = seeded(&app).await;
        let uri = format!("/api/v1/qa/sessions/{id}/automation");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(json!({
                "test_case_ids": ["TC_ReyadaServices_1", "TC_ReyadaServices_2"],
                "mode": "separate",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "partial");
        assert_eq!(body["suites"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["suites"][0]["label"], "TC_ReyadaServices_1");
        assert_eq!(body["failures"][0]["test_case_id"], "TC_ReyadaServices_2");
        assert!(
            body["failures"][0]["error"]
                .as_str()
                .is_some_and(|e| e.contains("500 Internal"))
        );

        let (_, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(body["suites"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn nothing_selected_is_rejected() {
        let app = app_with(ScriptedBackend::with(vec![]), gemini_only());
        let id = seeded(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/automation"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/qa/sessions/{id}/automation"),
            Some(json!({ "test_case_ids": ["TC_missing"] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/v1/qa/sessions/{id}/automation/bundle.zip"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
