//! `/frame/latest` (§6): the most recent screen capture, falling back to a
//! fresh one if the orchestrator hasn't published a frame yet.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use vla_stream_event::EventPayload;

use crate::app::AppState;
use crate::error::GatewayError;

#[derive(Serialize)]
pub struct FrameResponse {
    pub image_base64: String,
    pub captured_at: DateTime<Utc>,
    pub width_px: u32,
    pub height_px: u32,
}

pub async fn latest(State(state): State<Arc<AppState>>) -> Result<Json<FrameResponse>, GatewayError> {
    if let Some(EventPayload::Frame(payload)) = state.event_bus.snapshot().frame.map(|e| e.payload) {
        return Ok(Json(FrameResponse {
            image_base64: payload.jpeg_base64,
            captured_at: payload.captured_at,
            width_px: payload.width_px,
            height_px: payload.height_px,
        }));
    }

    let mut frame = state
        .actuator
        .capture()
        .await
        .map_err(|e| GatewayError::Blocked(e.to_string()))?;
    Ok(Json(FrameResponse {
        image_base64: frame.base64().to_string(),
        captured_at: frame.captured_at,
        width_px: frame.width_px,
        height_px: frame.height_px,
    }))
}
