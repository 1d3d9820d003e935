//! Error kinds for the orchestration engine (error handling design §7).

use thiserror::Error;

/// Errors from the VLM lifecycle manager and its HTTP client.
#[derive(Debug, Error)]
pub enum VlmError {
    #[error("vlm unreachable: {0}")]
    Unreachable(String),
    #[error("vlm chat call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("vlm process crashed: {0}")]
    Crashed(String),
    #[error("circuit breaker tripped, retry after {retry_after_secs}s")]
    Blocked { retry_after_secs: u64 },
    #[error("model switch rejected: a task is running")]
    Busy,
    #[error("failed to spawn vlm process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("http error talking to vlm: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors surfaced by the control loop (C3/C4).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no well-formed action envelope in vlm output")]
    ParseError,
    #[error("action rejected: {0}")]
    SafetyBlock(String),
    #[error("actuator error: {0}")]
    Actuator(#[from] crate::actuator::ActuatorError),
    #[error("vlm error: {0}")]
    Vlm(#[from] VlmError),
    #[error("max iterations reached")]
    MaxIterations,
    #[error("a task is already running")]
    Busy,
    #[error("no task is running")]
    NoActiveTask,
}

/// Top-level error for whatever boundary needs one catch-all (CLI exit mapping).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Vlm(#[from] VlmError),
}
