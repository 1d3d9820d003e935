//! C2 VLM Lifecycle Manager: owns the external VLM server as a child
//! process (§4.2). State mutation happens only from the manager's own
//! methods — no process-wide mutable globals (§9 redesign note).

mod backoff;
mod client;

pub use backoff::ExponentialBackoff;
pub use client::{ChatMessage, HttpVlmClient, MockVlmClient, VlmClient};

use crate::error::VlmError;
use crate::model::{CircuitBreaker, VlmProcess, VlmState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{info, instrument, warn};

/// The concrete type callers outside `vla-core` build and pass around, so
/// gateway/cli code never needs to be generic over `VlmClient` itself.
pub type SharedVlmManager = VlmManager<Arc<dyn VlmClient>>;

#[derive(Clone, Debug)]
pub struct VlmManagerConfig {
    pub binary_path: String,
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
    pub probe_interval: Duration,
    pub warmup_deadline: Duration,
    pub idle_window: Duration,
    pub stop_grace: Duration,
    pub consecutive_probe_failures_for_crash: u32,
    pub crash_window: Duration,
    pub crash_trip_threshold: u32,
    pub chat_timeout: Duration,
    pub connect_retries: u32,
    pub connect_retry_backoff: Duration,
}

impl Default for VlmManagerConfig {
    fn default() -> Self {
        Self {
            binary_path: "vlm-server".to_string(),
            args: Vec::new(),
            host: "127.0.0.1".to_string(),
            port: 8008,
            probe_interval: Duration::from_millis(250),
            warmup_deadline: Duration::from_secs(120),
            idle_window: Duration::from_secs(600),
            stop_grace: Duration::from_secs(5),
            consecutive_probe_failures_for_crash: 5,
            crash_window: Duration::from_secs(300),
            crash_trip_threshold: 3,
            chat_timeout: Duration::from_secs(90),
            connect_retries: 3,
            connect_retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum VlmReadiness {
    Ready,
    Failed { reason: String },
}

struct ManagerState {
    process: VlmProcess,
    child: Option<Child>,
    backoff: ExponentialBackoff,
    consecutive_probe_failures: u32,
}

/// Owns the VLM child process and its state machine. Cheaply clonable;
/// internal mutation is serialized through a `parking_lot::Mutex` that is
/// never held across an `.await`.
pub struct VlmManager<C: VlmClient> {
    client: Arc<C>,
    state: Mutex<ManagerState>,
    breaker: Mutex<CircuitBreaker>,
    config: VlmManagerConfig,
}

impl<C: VlmClient> VlmManager<C> {
    pub fn new(client: Arc<C>, config: VlmManagerConfig, model_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            client,
            state: Mutex::new(ManagerState {
                process: VlmProcess::new(model_id, config.port),
                child: None,
                backoff: ExponentialBackoff::default_policy(),
                consecutive_probe_failures: 0,
            }),
            breaker: Mutex::new(CircuitBreaker::new(now, config.crash_window, config.crash_trip_threshold)),
            config,
        }
    }

    pub fn snapshot(&self) -> VlmProcess {
        self.state.lock().process.clone()
    }

    fn base_url(&self) -> String {
        let port = self.state.lock().process.port;
        format!("http://{}:{}", self.config.host, port)
    }

    /// `OFF -> STARTING -> READY | Failed` (§4.2). Spawns the child if `OFF`,
    /// probes `/health`, then performs the warm-up chat call.
    #[instrument(skip(self))]
    pub async fn ensure_ready(&self, model_id: &str) -> Result<VlmReadiness, VlmError> {
        if self.breaker.lock().is_tripped(Instant::now()) {
            return Ok(VlmReadiness::Failed {
                reason: "BLOCKED".to_string(),
            });
        }

        {
            let mut state = self.state.lock();
            match state.process.state {
                VlmState::Ready | VlmState::IdleHold => return Ok(VlmReadiness::Ready),
                VlmState::Off | VlmState::Crashed => {
                    state.process.model_id = model_id.to_string();
                }
                VlmState::Starting | VlmState::Stopping => {
                    // Another caller is already driving the transition; fall through
                    // to the probe loop below rather than respawning.
                }
            }
        }

        if self.state.lock().child.is_none() {
            self.spawn_child()?;
        }

        self.probe_until_healthy().await?;
        self.warm_up().await?;

        {
            let mut state = self.state.lock();
            state.process.state = VlmState::Ready;
            state.process.last_ok_at = Some(chrono::Utc::now());
            state.backoff.reset();
        }
        self.breaker.lock().record_success();
        info!("vlm ready");
        Ok(VlmReadiness::Ready)
    }

    fn spawn_child(&self) -> Result<(), VlmError> {
        let mut state = self.state.lock();
        let child = Command::new(&self.config.binary_path)
            .args(&self.config.args)
            .arg("--port")
            .arg(state.process.port.to_string())
            .kill_on_drop(true)
            .spawn()
            .map_err(VlmError::Spawn)?;
        state.process.pid = child.id();
        state.process.state = VlmState::Starting;
        state.process.started_at = Some(chrono::Utc::now());
        state.child = Some(child);
        Ok(())
    }

    async fn probe_until_healthy(&self) -> Result<(), VlmError> {
        let deadline = Instant::now() + self.config.warmup_deadline;
        loop {
            match self.client.health(&self.base_url()).await {
                Ok(true) => return Ok(()),
                _ if Instant::now() >= deadline => {
                    return Err(VlmError::Timeout(self.config.warmup_deadline));
                }
                _ => tokio::time::sleep(self.config.probe_interval).await,
            }
        }
    }

    async fn warm_up(&self) -> Result<(), VlmError> {
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: "ping".to_string(),
            image_base64: None,
        }];
        self.client
            .chat(&self.base_url(), &messages, self.config.warmup_deadline)
            .await
            .map(|_| ())
    }

    /// `chat(messages, timeout) -> text` (§4.2). Retries on connect errors up
    /// to `connect_retries` with fixed backoff; timeout leaves the process intact.
    #[instrument(skip(self, messages))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, VlmError> {
        {
            let mut state = self.state.lock();
            if state.process.state == VlmState::IdleHold {
                state.process.state = VlmState::Ready;
            }
            state.process.idle_since = None;
        }

        let mut attempt = 0;
        loop {
            match self
                .client
                .chat(&self.base_url(), messages, self.config.chat_timeout)
                .await
            {
                Ok(text) => {
                    self.state.lock().process.last_ok_at = Some(chrono::Utc::now());
                    return Ok(text);
                }
                Err(VlmError::Unreachable(e)) if attempt < self.config.connect_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "vlm connection error, retrying");
                    tokio::time::sleep(self.config.connect_retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `READY -> IDLE_HOLD` after an idle window with no `chat` calls. Called
    /// by the caller's own idle-timer; the manager does not run a background
    /// timer itself (no global singleton, §9).
    pub fn release_if_idle(&self, now: chrono::DateTime<chrono::Utc>) {
        let mut state = self.state.lock();
        if state.process.state != VlmState::Ready {
            return;
        }
        let idle_since = state.process.idle_since.get_or_insert(now);
        if (now - *idle_since).to_std().unwrap_or_default() >= self.config.idle_window {
            state.process.state = VlmState::IdleHold;
        }
    }

    /// `switch_model`: only valid when idle; serialized through `self.state`.
    /// Returns `Busy` if a caller reports the task is running.
    #[instrument(skip(self))]
    pub async fn switch_model(&self, model_id: &str, task_running: bool) -> Result<(), VlmError> {
        if task_running {
            return Err(VlmError::Busy);
        }
        self.shutdown().await;
        self.state.lock().process.model_id = model_id.to_string();
        self.ensure_ready(model_id).await?;
        Ok(())
    }

    /// `READY/IDLE_HOLD -> STOPPING -> OFF`: SIGTERM, escalate to SIGKILL
    /// after `stop_grace` if the child has not exited.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let pid = {
            let mut state = self.state.lock();
            state.process.state = VlmState::Stopping;
            state.process.pid
        };

        let Some(pid) = pid else {
            self.finish_shutdown();
            return;
        };

        send_sigterm(pid);

        let deadline = Instant::now() + self.config.stop_grace;
        loop {
            let exited = {
                let mut state = self.state.lock();
                match state.child.as_mut().map(|c| c.try_wait()) {
                    Some(Ok(Some(_))) => true,
                    Some(Ok(None)) => false,
                    _ => true,
                }
            };
            if exited || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if Instant::now() >= deadline {
            if let Some(pid) = pid {
                send_sigkill(pid);
            }
        }
        self.finish_shutdown();
    }

    fn finish_shutdown(&self) {
        let mut state = self.state.lock();
        state.child = None;
        state.process.pid = None;
        state.process.state = VlmState::Off;
    }

    /// Called by the supervisor's health-probe task when the child has
    /// exited unexpectedly or failed `consecutive_probe_failures_for_crash`
    /// consecutive probes. Records a crash and may trip the circuit breaker.
    pub fn record_crash(&self, reason: &str) {
        let mut state = self.state.lock();
        state.process.state = VlmState::Crashed;
        state.process.crash_count += 1;
        state.child = None;
        state.process.pid = None;
        state.consecutive_probe_failures = 0;
        warn!(reason, "vlm crashed");
        drop(state);
        self.breaker
            .lock()
            .record_failure(Instant::now(), Duration::from_secs(60));
    }

    /// Called periodically by the gateway's health-monitor task (§4.2). Checks
    /// for an unexpected child exit, probes `/health` when READY/IDLE_HOLD,
    /// and retires an idle process via `release_if_idle`. Drives the three
    /// crash-detection paths: unexpected exit, connection-refused, and
    /// `consecutive_probe_failures_for_crash` consecutive failed probes.
    #[instrument(skip(self))]
    pub async fn poll_health(&self) {
        let state_kind = self.state.lock().process.state;
        if !matches!(state_kind, VlmState::Ready | VlmState::IdleHold) {
            return;
        }

        let exited = {
            let mut state = self.state.lock();
            matches!(state.child.as_mut().map(|c| c.try_wait()), Some(Ok(Some(_))))
        };
        if exited {
            self.record_crash("child exited unexpectedly");
            return;
        }

        match self.client.health(&self.base_url()).await {
            Ok(true) => {
                self.state.lock().consecutive_probe_failures = 0;
            }
            Ok(false) | Err(_) => {
                let failures = {
                    let mut state = self.state.lock();
                    state.consecutive_probe_failures += 1;
                    state.consecutive_probe_failures
                };
                if failures >= self.config.consecutive_probe_failures_for_crash {
                    self.record_crash("health probe failed repeatedly");
                    return;
                }
            }
        }

        self.release_if_idle(chrono::Utc::now());
    }

    pub fn next_restart_delay(&self) -> Duration {
        self.state.lock().backoff.next_delay()
    }

    pub fn is_blocked(&self) -> bool {
        self.breaker.lock().is_tripped(Instant::now())
    }
}

fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

fn send_sigkill(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VlmManagerConfig {
        VlmManagerConfig {
            binary_path: "sleep".to_string(),
            args: vec!["30".to_string()],
            probe_interval: Duration::from_millis(5),
            warmup_deadline: Duration::from_millis(200),
            stop_grace: Duration::from_millis(100),
            chat_timeout: Duration::from_secs(1),
            connect_retry_backoff: Duration::from_millis(5),
            ..VlmManagerConfig::default()
        }
    }

    #[tokio::test]
    async fn ensure_ready_transitions_off_to_ready() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        let readiness = manager.ensure_ready("model-a").await.unwrap();
        assert_eq!(readiness, VlmReadiness::Ready);
        assert_eq!(manager.snapshot().state, VlmState::Ready);
    }

    #[tokio::test]
    async fn switch_model_while_busy_returns_busy_error() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        manager.ensure_ready("model-a").await.unwrap();
        let result = manager.switch_model("model-b", true).await;
        assert!(matches!(result, Err(VlmError::Busy)));
        assert_eq!(manager.snapshot().model_id, "model-a");
    }

    #[tokio::test]
    async fn chat_updates_last_ok_at() {
        let client = Arc::new(MockVlmClient::new(vec!["pong", "ok"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        manager.ensure_ready("model-a").await.unwrap();
        assert!(manager.snapshot().last_ok_at.is_some());
        let result = manager
            .chat(&[ChatMessage {
                role: "user".into(),
                content: "hi".into(),
                image_base64: None,
            }])
            .await
            .unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn shutdown_moves_process_to_off() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        manager.ensure_ready("model-a").await.unwrap();
        manager.shutdown().await;
        assert_eq!(manager.snapshot().state, VlmState::Off);
        assert!(manager.snapshot().pid.is_none());
    }

    #[tokio::test]
    async fn record_crash_increments_crash_count_and_may_trip_breaker() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        manager.ensure_ready("model-a").await.unwrap();
        manager.record_crash("child exited");
        manager.record_crash("child exited");
        manager.record_crash("child exited");
        assert_eq!(manager.snapshot().crash_count, 3);
        assert!(manager.is_blocked());
    }

    #[tokio::test]
    async fn poll_health_trips_breaker_after_consecutive_probe_failures() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(
            client.clone(),
            VlmManagerConfig {
                consecutive_probe_failures_for_crash: 2,
                ..test_config()
            },
            "model-a",
        );
        manager.ensure_ready("model-a").await.unwrap();
        client.set_healthy(false);

        manager.poll_health().await;
        assert_eq!(manager.snapshot().state, VlmState::Ready);
        manager.poll_health().await;
        assert_eq!(manager.snapshot().state, VlmState::Crashed);
        assert_eq!(manager.snapshot().crash_count, 1);
    }

    #[tokio::test]
    async fn poll_health_releases_idle_process() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(
            client,
            VlmManagerConfig {
                idle_window: Duration::from_millis(1),
                ..test_config()
            },
            "model-a",
        );
        manager.ensure_ready("model-a").await.unwrap();
        manager.poll_health().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.poll_health().await;
        assert_eq!(manager.snapshot().state, VlmState::IdleHold);
    }

    #[tokio::test]
    async fn blocked_manager_refuses_ensure_ready() {
        let client = Arc::new(MockVlmClient::new(vec!["pong"]));
        let manager = VlmManager::new(client, test_config(), "model-a");
        manager.ensure_ready("model-a").await.unwrap();
        manager.record_crash("x");
        manager.record_crash("x");
        manager.record_crash("x");
        let readiness = manager.ensure_ready("model-a").await.unwrap();
        assert_eq!(
            readiness,
            VlmReadiness::Failed {
                reason: "BLOCKED".to_string()
            }
        );
    }
}
