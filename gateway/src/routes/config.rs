//! `/config` (§6): the subset of `settings.yaml` safe to expose to clients.

use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use vla_config::PublicSettings;

use crate::app::AppState;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<PublicSettings> {
    Json(state.settings.public())
}
