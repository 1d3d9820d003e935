//! `VlmClient`: abstracts the HTTP-compatible chat endpoint (§1 non-goals —
//! the VLM itself is a black box) so the lifecycle manager and orchestrator
//! do not depend on a concrete HTTP stack in tests.

use crate::error::VlmError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One turn of conversation sent to the VLM. `image_base64` is attached only
/// on the turn that includes a freshly captured screen.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub image_base64: Option<String>,
}

#[async_trait]
pub trait VlmClient: Send + Sync {
    /// GET `/health` on the VLM server; `Ok(true)` when it reports healthy.
    async fn health(&self, base_url: &str) -> Result<bool, VlmError>;

    /// `chat(messages, timeout)` returns the raw completion string (§4.2).
    async fn chat(
        &self,
        base_url: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, VlmError>;
}

/// Production client: talks to a generic HTTP-compatible chat endpoint via `reqwest`.
pub struct HttpVlmClient {
    http: reqwest::Client,
}

impl HttpVlmClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpVlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    content: String,
}

#[async_trait]
impl VlmClient for HttpVlmClient {
    async fn health(&self, base_url: &str) -> Result<bool, VlmError> {
        let url = format!("{base_url}/health");
        match self.http.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) if e.is_connect() => Err(VlmError::Unreachable(e.to_string())),
            Err(e) => Err(VlmError::Http(e)),
        }
    }

    async fn chat(
        &self,
        base_url: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, VlmError> {
        let url = format!("{base_url}/chat");
        let resp = self
            .http
            .post(&url)
            .json(&ChatRequest { messages })
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VlmError::Timeout(timeout)
                } else if e.is_connect() {
                    VlmError::Unreachable(e.to_string())
                } else {
                    VlmError::Http(e)
                }
            })?;

        let body: ChatResponse = resp.json().await.map_err(VlmError::Http)?;
        Ok(body.content)
    }
}

/// Lets `VlmManager<Arc<dyn VlmClient>>` be used as a single concrete type
/// across crate boundaries (gateway, cli) instead of threading a generic
/// parameter through every caller, mirroring the teacher's `Arc<dyn LlmClient>`.
#[async_trait]
impl VlmClient for Arc<dyn VlmClient> {
    async fn health(&self, base_url: &str) -> Result<bool, VlmError> {
        (**self).health(base_url).await
    }

    async fn chat(
        &self,
        base_url: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, VlmError> {
        (**self).chat(base_url, messages, timeout).await
    }
}

/// Scripted responses for unit tests (mirrors the teacher's `MockLlm`).
pub struct MockVlmClient {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, VlmError>>>,
    healthy: std::sync::atomic::AtomicBool,
}

impl MockVlmClient {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(
                responses.into_iter().map(|s| Ok(s.to_string())).collect(),
            ),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn push_error(&self, err: VlmError) {
        self.responses.lock().push_back(Err(err));
    }
}

#[async_trait]
impl VlmClient for MockVlmClient {
    async fn health(&self, _base_url: &str) -> Result<bool, VlmError> {
        Ok(self.healthy.load(std::sync::atomic::Ordering::SeqCst))
    }

    async fn chat(
        &self,
        _base_url: &str,
        _messages: &[ChatMessage],
        _timeout: Duration,
    ) -> Result<String, VlmError> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_queued_responses_in_order() {
        let client = MockVlmClient::new(vec!["first", "second"]);
        let msg = vec![ChatMessage {
            role: "user".into(),
            content: "go".into(),
            image_base64: None,
        }];
        assert_eq!(
            client.chat("http://x", &msg, Duration::from_secs(1)).await.unwrap(),
            "first"
        );
        assert_eq!(
            client.chat("http://x", &msg, Duration::from_secs(1)).await.unwrap(),
            "second"
        );
        assert_eq!(
            client.chat("http://x", &msg, Duration::from_secs(1)).await.unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn mock_client_health_reflects_set_healthy() {
        let client = MockVlmClient::new(vec![]);
        assert!(client.health("http://x").await.unwrap());
        client.set_healthy(false);
        assert!(!client.health("http://x").await.unwrap());
    }
}
