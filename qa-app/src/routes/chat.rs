use crate::routes::{ApiError, ApiResult, gateway_config_for, session_id, with_session};
use crate::server::QaState;
use crate::workflows;
use axum::extract::Path;
use axum::routing::get;
use axum::{Extension, Json};
use qa_tools::{ChatEntry, QUICK_PROMPTS, UploadedDocument};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    attachment: Option<UploadedDocument>,
    /// Answer as a standalone question, without history.
    #[serde(default)]
    quick: bool,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/qa/sessions/{id}/chat",
            get(get_history).post(send_message).delete(clear_history),
        )
        .route("/api/v1/qa/chat/quick-prompts", get(quick_prompts))
}

async fn quick_prompts() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "prompts": QUICK_PROMPTS }))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_history(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let messages = with_session(&state, id, |s| s.chat.clone())?;
    Ok(Json(serde_json::json!({ "status": "ok", "messages": messages })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn clear_history(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    let cleared = with_session(&state, id, |s| std::mem::take(&mut s.chat).len())?;
    Ok(Json(serde_json::json!({ "status": "cleared", "cleared": cleared })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn send_message(
    Extension(state): Extension<Arc<QaState>>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = session_id(&id)?;
    tracing::debug!(session_id = %id, quick = req.quick, attachment = req.attachment.is_some(), "chat message received");
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let cfg = gateway_config_for(&state, id)?;
    let attachment = match &req.attachment {
        Some(doc) => Some((
            doc.file_name.clone(),
            workflows::read_attachment(doc, state.extractor.as_ref())?,
        )),
        None => None,
    };

    let history = with_session(&state, id, |s| {
        if let Some((name, _)) = &attachment {
            s.chat
                .push(ChatEntry::system(format!("Attached context from file: {name}")));
        }
        s.chat.push(ChatEntry::user(message.clone()));
        s.chat.clone()
    })?;

    let result = if req.quick {
        workflows::quick_answer(&state.gateway, &cfg, &message).await
    } else {
        let attachment = attachment
            .as_ref()
            .map(|(name, content)| (name.as_str(), content.as_str()));
        workflows::chat_reply(&state.gateway, &cfg, &history, attachment).await
    };

    match result {
        Ok(reply) => {
            let entry = ChatEntry::assistant(reply);
            with_session(&state, id, |s| s.chat.push(entry.clone()))?;
            Ok(Json(serde_json::json!({ "status": "ok", "reply": entry })))
        }
        Err(e) => {
            let apology = ChatEntry::assistant(format!("Sorry, I encountered an error: {e}"));
            // The session may have been deleted while the call was in flight.
            let _ = with_session(&state, id, |s| s.chat.push(apology));
            Err(e.into())
        }
    }
}
