//! `/agent/start|stop|restart|status`, `/wake-word/*` (§6).

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use vla_core::VlmReadiness;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::core::OkResponse;
use crate::supervisor;

#[derive(Serialize)]
pub struct AgentStatusResponse {
    pub running: bool,
    pub pid: Option<u32>,
    pub model_id: String,
    pub crash_count: u32,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<AgentStatusResponse> {
    let process = state.vlm.snapshot();
    Json(AgentStatusResponse {
        running: process.pid.is_some(),
        pid: process.pid,
        model_id: process.model_id,
        crash_count: process.crash_count,
    })
}

pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    if state.vlm.is_blocked() {
        return Err(GatewayError::Blocked("circuit breaker is open".to_string()));
    }
    if !supervisor::memory_guard_allows(state.settings.memory_floor_mb) {
        return Err(GatewayError::Blocked("insufficient available memory".to_string()));
    }
    match state.vlm.ensure_ready(&state.default_model_id).await? {
        VlmReadiness::Ready => Ok(Json(OkResponse { ok: true })),
        VlmReadiness::Failed { reason } => Err(GatewayError::Blocked(reason)),
    }
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    state.vlm.shutdown().await;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn restart(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, GatewayError> {
    state.vlm.shutdown().await;
    if state.vlm.is_blocked() {
        return Err(GatewayError::Blocked("circuit breaker is open".to_string()));
    }
    if !supervisor::memory_guard_allows(state.settings.memory_floor_mb) {
        return Err(GatewayError::Blocked("insufficient available memory".to_string()));
    }
    match state.vlm.ensure_ready(&state.default_model_id).await? {
        VlmReadiness::Ready => Ok(Json(OkResponse { ok: true })),
        VlmReadiness::Failed { reason } => Err(GatewayError::Blocked(reason)),
    }
}

pub async fn wake_word_enable(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.wake_word_enabled.store(true, Ordering::Release);
    Json(OkResponse { ok: true })
}

pub async fn wake_word_disable(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.wake_word_enabled.store(false, Ordering::Release);
    Json(OkResponse { ok: true })
}

#[derive(Serialize)]
pub struct WakeWordStatusResponse {
    pub enabled: bool,
}

pub async fn wake_word_status(State(state): State<Arc<AppState>>) -> Json<WakeWordStatusResponse> {
    Json(WakeWordStatusResponse {
        enabled: state.wake_word_enabled.load(Ordering::Acquire),
    })
}
