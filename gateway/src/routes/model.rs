//! `/models`, `/model/active`, `/model/switch` (§6). Model switching is a
//! lifecycle route (tighter rate limit) and is refused while a task is
//! running (scenario: model switch denied while busy).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::core::OkResponse;

#[derive(Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub present: bool,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let models = state
        .settings
        .known_models
        .iter()
        .map(|m| ModelInfo {
            id: m.id.clone(),
            name: m.name.clone(),
            present: Path::new(&m.path).exists(),
        })
        .collect();
    Json(ModelsResponse { models })
}

#[derive(Serialize)]
pub struct ActiveModelResponse {
    pub model_id: String,
}

pub async fn active(State(state): State<Arc<AppState>>) -> Json<ActiveModelResponse> {
    Json(ActiveModelResponse {
        model_id: state.vlm.snapshot().model_id,
    })
}

#[derive(Deserialize)]
pub struct SwitchModelRequest {
    pub model_id: String,
}

pub async fn switch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwitchModelRequest>,
) -> Result<Json<OkResponse>, GatewayError> {
    state
        .vlm
        .switch_model(&req.model_id, state.orchestrator.is_busy())
        .await?;
    Ok(Json(OkResponse { ok: true }))
}
