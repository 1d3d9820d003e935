//! HTTP-facing error kinds (§7): mapped to status codes only at this layer,
//! never inside `vla_core`'s orchestrator or VLM manager.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing or invalid bearer token")]
    AuthError,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("request body too large")]
    BodyTooLarge,
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("a task is already running")]
    Busy,
    #[error("no task is running")]
    NoActiveTask,
    #[error(transparent)]
    Orchestrator(#[from] vla_core::OrchestratorError),
    #[error(transparent)]
    Vlm(#[from] vla_core::VlmError),
    #[error(transparent)]
    Config(#[from] vla_config::SettingsError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    reason: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self {
            GatewayError::AuthError => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            GatewayError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            GatewayError::BodyTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "BODY_TOO_LARGE"),
            GatewayError::Blocked(_) => (StatusCode::CONFLICT, "BLOCKED"),
            GatewayError::Busy => (StatusCode::CONFLICT, "BUSY"),
            GatewayError::NoActiveTask => (StatusCode::CONFLICT, "NO_ACTIVE_TASK"),
            GatewayError::Orchestrator(vla_core::OrchestratorError::NoActiveTask) => {
                (StatusCode::CONFLICT, "NO_ACTIVE_TASK")
            }
            GatewayError::Orchestrator(vla_core::OrchestratorError::Busy) => {
                (StatusCode::CONFLICT, "BUSY")
            }
            GatewayError::Orchestrator(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ORCHESTRATOR_ERROR"),
            GatewayError::Vlm(vla_core::VlmError::Busy) => (StatusCode::CONFLICT, "BUSY"),
            GatewayError::Vlm(vla_core::VlmError::Blocked { .. }) => {
                (StatusCode::CONFLICT, "BLOCKED")
            }
            GatewayError::Vlm(_) => (StatusCode::INTERNAL_SERVER_ERROR, "VLM_ERROR"),
            GatewayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        };
        let body = ErrorBody {
            error: self.to_string(),
            reason: reason.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as Status;

    #[test]
    fn no_active_task_maps_to_conflict_not_500() {
        let err = GatewayError::Orchestrator(vla_core::OrchestratorError::NoActiveTask);
        let response = err.into_response();
        assert_eq!(response.status(), Status::CONFLICT);
    }

    #[test]
    fn auth_error_maps_to_401() {
        let response = GatewayError::AuthError.into_response();
        assert_eq!(response.status(), Status::UNAUTHORIZED);
    }
}
