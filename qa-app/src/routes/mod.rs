pub mod automation;
pub mod bug_reports;
pub mod chat;
pub mod health;
pub mod providers;
pub mod sessions;
pub mod test_cases;
pub mod test_plan;

use crate::server::QaState;
use crate::session::Session;
use crate::workflows::WorkflowError;
use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use qa_llm::{GatewayConfig, LlmError};
use qa_tools::ToolError;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(providers::router())
        .merge(sessions::router())
        .merge(test_cases::router())
        .merge(automation::router())
        .merge(test_plan::router())
        .merge(bug_reports::router())
        .merge(chat::router())
}

/// Error body shared by every route: `{"status": ..., "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn session_not_found(id: Uuid) -> Self {
        Self::not_found(format!("session not found: {id}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_label = if self.status == StatusCode::NOT_FOUND {
            "not_found"
        } else {
            "error"
        };
        if self.status.is_server_error() {
            tracing::warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (
            self.status,
            Json(serde_json::json!({
                "status": status_label,
                "error": self.message,
            })),
        )
            .into_response()
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        let status = match &e {
            LlmError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_configuration() => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ToolError> for ApiError {
    fn from(e: ToolError) -> Self {
        let status = match &e {
            ToolError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
            ToolError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            // Parse failures here come from provider replies.
            ToolError::Parse(_) => StatusCode::BAD_GATEWAY,
            ToolError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Llm(e) => e.into(),
            WorkflowError::Tool(e) => e.into(),
            WorkflowError::Document(e) => {
                let status = match e {
                    ToolError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    _ => StatusCode::BAD_REQUEST,
                };
                Self::new(status, format!("attachment: {e}"))
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn session_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("invalid session id: {raw}")))
}

/// Gateway settings for one session, snapshotted so no lock is held
/// across the provider call.
pub(crate) fn gateway_config_for(state: &QaState, id: Uuid) -> ApiResult<GatewayConfig> {
    state
        .sessions
        .read(id, |s| s.settings.gateway_config(&state.gateway_config))
        .ok_or_else(|| ApiError::session_not_found(id))
}

pub(crate) fn with_session<T>(
    state: &QaState,
    id: Uuid,
    f: impl FnOnce(&mut Session) -> T,
) -> ApiResult<T> {
    let mut session = state
        .sessions
        .get_mut(id)
        .ok_or_else(|| ApiError::session_not_found(id))?;
    Ok(f(session.value_mut()))
}

pub(crate) fn download(bytes: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
