//! `/health`, `/state`, `/task`, `/steer`, `/stop`, `/pause`, `/resume` (§6).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vla_core::orchestrator::TaskSubmitResult;

use crate::app::AppState;
use crate::error::GatewayError;

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn state(State(state): State<Arc<AppState>>) -> Json<vla_core::AgentSnapshot> {
    Json(state.session.snapshot())
}

#[derive(Deserialize)]
pub struct TaskRequest {
    pub command: String,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<uuid::Uuid>,
}

pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskResponse> {
    Json(task_response(state.orchestrator.submit_task(req.command).await))
}

pub(crate) fn task_response(result: TaskSubmitResult) -> TaskResponse {
    match result {
        TaskSubmitResult::Accepted(task) => TaskResponse {
            status: "accepted".to_string(),
            task_id: Some(task.id),
        },
        TaskSubmitResult::Busy => TaskResponse {
            status: "busy".to_string(),
            task_id: None,
        },
    }
}

#[derive(Deserialize)]
pub struct SteerRequest {
    pub context: String,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn steer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SteerRequest>,
) -> Result<Json<OkResponse>, GatewayError> {
    state.orchestrator.steer(req.context).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    state.orchestrator.stop().await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn pause(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    state.orchestrator.pause().await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn resume(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    state.orchestrator.resume().await?;
    Ok(Json(OkResponse { ok: true }))
}
