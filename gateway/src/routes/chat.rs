//! `/chat/history`, `/chat/send` (chat sends become tasks per the Open
//! Question decision), `/stream/start`, `/stream/stop` (§6).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vla_core::session::ChatMessage;
use vla_stream_event::{Event, EventPayload, FramePayload};

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::core::{task_response, OkResponse, TaskResponse};

#[derive(Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<ChatHistoryResponse> {
    Json(ChatHistoryResponse {
        messages: state.session.chat_history(),
    })
}

#[derive(Deserialize)]
pub struct ChatSendRequest {
    pub message: String,
}

/// `/chat/send` aliases onto `/task` (Open Question decision 1).
pub async fn send(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatSendRequest>,
) -> Json<TaskResponse> {
    Json(task_response(state.orchestrator.submit_task(req.message).await))
}

/// Default interval between continuous frame captures while streaming (§4.5).
const STREAM_INTERVAL: Duration = Duration::from_millis(500);

pub async fn stream_start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OkResponse>, GatewayError> {
    let mut guard = state.streaming.lock().await;
    if guard.is_some() {
        return Ok(Json(OkResponse { ok: true }));
    }
    let event_bus = state.event_bus.clone();
    let actuator = state.actuator.clone();
    *guard = Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STREAM_INTERVAL);
        loop {
            ticker.tick().await;
            if let Ok(mut frame) = actuator.capture().await {
                event_bus.publish(Event::new(EventPayload::Frame(FramePayload {
                    captured_at: frame.captured_at,
                    width_px: frame.width_px,
                    height_px: frame.height_px,
                    jpeg_base64: frame.base64().to_string(),
                })));
            }
        }
    }));
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stream_stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OkResponse>, GatewayError> {
    if let Some(handle) = state.streaming.lock().await.take() {
        handle.abort();
    }
    Ok(Json(OkResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_interval_is_sub_second() {
        assert!(STREAM_INTERVAL < Duration::from_secs(1));
    }
}
