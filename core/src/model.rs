//! Core data model (data model §3): `Task`, `ScreenFrame`, `VlmProcess`,
//! `AgentSnapshot`, `CircuitBreaker`.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Queued,
    Running,
    Done,
    Aborted,
    Error,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub state: TaskState,
    pub iterations_used: u32,
    pub steer_queue: Vec<String>,
}

impl Task {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            created_at: Utc::now(),
            state: TaskState::Queued,
            iterations_used: 0,
            steer_queue: Vec::new(),
        }
    }
}

/// One captured screenshot, owned by the orchestrator for a single iteration
/// and dropped once a newer frame supersedes it.
#[derive(Clone, Debug)]
pub struct ScreenFrame {
    pub captured_at: DateTime<Utc>,
    pub width_px: u32,
    pub height_px: u32,
    pub jpeg_bytes: Vec<u8>,
    pub base64_cache: Option<String>,
}

impl ScreenFrame {
    /// Base64 encoding of `jpeg_bytes`, computing and caching it if absent.
    pub fn base64(&mut self) -> &str {
        if self.base64_cache.is_none() {
            use base64::Engine;
            self.base64_cache = Some(base64::engine::general_purpose::STANDARD.encode(&self.jpeg_bytes));
        }
        self.base64_cache.as_deref().unwrap()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VlmState {
    Off,
    Starting,
    Ready,
    IdleHold,
    Stopping,
    Crashed,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VlmProcess {
    pub pid: Option<u32>,
    pub state: VlmState,
    pub model_id: String,
    pub mmproj_path: Option<String>,
    pub port: u16,
    pub started_at: Option<DateTime<Utc>>,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub crash_count: u32,
    pub idle_since: Option<DateTime<Utc>>,
}

impl VlmProcess {
    pub fn new(model_id: impl Into<String>, port: u16) -> Self {
        Self {
            pid: None,
            state: VlmState::Off,
            model_id: model_id.into(),
            mmproj_path: None,
            port,
            started_at: None,
            last_ok_at: None,
            crash_count: 0,
            idle_since: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Thinking,
    Executing,
    Verifying,
    Capturing,
    Paused,
    Done,
    Aborted,
    Error,
    Blocked,
}

/// The observer view (data model §3): what `/state` and coalesced `status`
/// events publish.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AgentSnapshot {
    pub status: AgentStatus,
    pub details: Option<String>,
    pub last_thought: Option<String>,
    pub current_action: Option<String>,
    pub vlm_status: VlmState,
    pub voice_state: Option<String>,
    pub voice_level: Option<f32>,
    pub pid: Option<u32>,
}

impl AgentSnapshot {
    pub fn idle() -> Self {
        Self {
            status: AgentStatus::Idle,
            details: None,
            last_thought: None,
            current_action: None,
            vlm_status: VlmState::Off,
            voice_state: None,
            voice_level: None,
            pid: None,
        }
    }
}

/// Protects VLM start and agent lifecycle from thrashing (§3, §4.5, S5).
#[derive(Debug)]
pub struct CircuitBreaker {
    pub failures: u32,
    pub window_started_at: Instant,
    pub tripped_until: Option<Instant>,
    window: Duration,
    trip_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(now: Instant, window: Duration, trip_threshold: u32) -> Self {
        Self {
            failures: 0,
            window_started_at: now,
            tripped_until: None,
            window,
            trip_threshold,
        }
    }

    /// Records a failure (true crash only, per the Open Question decision in
    /// `DESIGN.md`). Rolls the window and may trip the breaker.
    pub fn record_failure(&mut self, now: Instant, trip_for: Duration) {
        if now.duration_since(self.window_started_at) > self.window {
            self.failures = 0;
            self.window_started_at = now;
        }
        self.failures += 1;
        if self.failures >= self.trip_threshold {
            self.tripped_until = Some(now + trip_for);
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.tripped_until = None;
    }

    pub fn is_tripped(&self, now: Instant) -> bool {
        matches!(self.tripped_until, Some(until) if now < until)
    }
}
