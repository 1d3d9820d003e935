//! Thin REST client for driving an already-running gateway (§6 routes),
//! grounded in the teacher's `RemoteBackend` — a minimal typed wrapper
//! around the wire protocol rather than a generic HTTP pass-through.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub struct GatewayClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::body(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        Self::body(resp).await
    }

    async fn body(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status { status, body: text });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.get("/health").await
    }

    pub async fn state(&self) -> Result<Value, ClientError> {
        self.get("/state").await
    }

    pub async fn submit_task(&self, command: &str) -> Result<Value, ClientError> {
        self.post("/task", json!({ "command": command })).await
    }

    pub async fn steer(&self, context: &str) -> Result<Value, ClientError> {
        self.post("/steer", json!({ "context": context })).await
    }

    pub async fn stop(&self) -> Result<Value, ClientError> {
        self.post("/stop", json!({})).await
    }

    pub async fn pause(&self) -> Result<Value, ClientError> {
        self.post("/pause", json!({})).await
    }

    pub async fn resume(&self) -> Result<Value, ClientError> {
        self.post("/resume", json!({})).await
    }

    pub async fn chat_history(&self) -> Result<Value, ClientError> {
        self.get("/chat/history").await
    }

    pub async fn chat_send(&self, message: &str) -> Result<Value, ClientError> {
        self.post("/chat/send", json!({ "message": message })).await
    }

    pub async fn stream_start(&self) -> Result<Value, ClientError> {
        self.post("/stream/start", json!({})).await
    }

    pub async fn stream_stop(&self) -> Result<Value, ClientError> {
        self.post("/stream/stop", json!({})).await
    }

    pub async fn frame_latest(&self) -> Result<Value, ClientError> {
        self.get("/frame/latest").await
    }

    pub async fn config(&self) -> Result<Value, ClientError> {
        self.get("/config").await
    }

    pub async fn models(&self) -> Result<Value, ClientError> {
        self.get("/models").await
    }

    pub async fn model_active(&self) -> Result<Value, ClientError> {
        self.get("/model/active").await
    }

    pub async fn model_switch(&self, model_id: &str) -> Result<Value, ClientError> {
        self.post("/model/switch", json!({ "model_id": model_id })).await
    }

    pub async fn agent_status(&self) -> Result<Value, ClientError> {
        self.get("/agent/status").await
    }

    pub async fn agent_start(&self) -> Result<Value, ClientError> {
        self.post("/agent/start", json!({})).await
    }

    pub async fn agent_stop(&self) -> Result<Value, ClientError> {
        self.post("/agent/stop", json!({})).await
    }

    pub async fn agent_restart(&self) -> Result<Value, ClientError> {
        self.post("/agent/restart", json!({})).await
    }

    pub async fn wake_word_enable(&self) -> Result<Value, ClientError> {
        self.post("/wake-word/enable", json!({})).await
    }

    pub async fn wake_word_disable(&self) -> Result<Value, ClientError> {
        self.post("/wake-word/disable", json!({})).await
    }

    pub async fn wake_word_status(&self) -> Result<Value, ClientError> {
        self.get("/wake-word/status").await
    }
}
