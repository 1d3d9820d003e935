//! User-editable `settings.yaml` (persisted-state layout, `<root>/config/settings.yaml`).
//!
//! Values here are the ones an operator is expected to hand-edit: VLM model
//! descriptors, safety thresholds, rate-limit buckets, CORS origins. Secrets
//! (the API key) are never stored here; see `<root>/config/secrets/api_key`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read settings.yaml: {0}")]
    Read(std::io::Error),
    #[error("write settings.yaml: {0}")]
    Write(std::io::Error),
    #[error("parse settings.yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// User-editable settings, loaded from `settings.yaml` with built-in defaults for
/// anything missing. Every field here is safe to expose publicly (see `public()`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Model id the VLM lifecycle manager starts by default.
    pub default_model_id: String,
    /// Confidence below which an action is rejected without execution.
    pub confidence_threshold: f32,
    /// Iteration cap per task.
    pub max_iterations: u32,
    /// Idle window (seconds) before the VLM moves READY -> IDLE_HOLD.
    pub vlm_idle_seconds: u64,
    /// Warm-up deadline (seconds) for the first chat call after STARTING.
    pub vlm_warmup_seconds: u64,
    /// Allowed CORS origins; empty means none (mobile/desktop pass the key explicitly).
    pub cors_allowed_origins: Vec<String>,
    /// General rate-limit bucket: requests per minute.
    pub rate_limit_general_per_min: u32,
    /// Lifecycle-endpoint rate-limit bucket: requests per minute.
    pub rate_limit_lifecycle_per_min: u32,
    /// Models the operator has made available, for `GET /models`.
    pub known_models: Vec<ModelEntry>,
    /// `/agent/start` refuses to spawn below this much available memory (MiB); 0 disables the guard.
    pub memory_floor_mb: u64,
    /// Cadence (minutes) of the heartbeat task (§4.5).
    pub heartbeat_interval_minutes: u64,
}

/// One entry in `known_models` (`GET /models`): `present` is computed at
/// request time by checking `path` on disk, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_model_id: "default".to_string(),
            confidence_threshold: 0.8,
            max_iterations: 20,
            vlm_idle_seconds: 600,
            vlm_warmup_seconds: 120,
            cors_allowed_origins: Vec::new(),
            rate_limit_general_per_min: 120,
            rate_limit_lifecycle_per_min: 10,
            known_models: Vec::new(),
            memory_floor_mb: 0,
            heartbeat_interval_minutes: 30,
        }
    }
}

/// Subset of `Settings` safe to return from `GET /config` (public keys only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicSettings {
    pub default_model_id: String,
    pub confidence_threshold: f32,
    pub max_iterations: u32,
    pub cors_allowed_origins: Vec<String>,
}

impl Settings {
    /// Reads `settings.yaml` at `path`; missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SettingsError::Read(e)),
        }
    }

    /// Writes this settings value to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SettingsError::Write)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(SettingsError::Write)
    }

    /// The subset of fields served by `GET /config`.
    pub fn public(&self) -> PublicSettings {
        PublicSettings {
            default_model_id: self.default_model_id.clone(),
            confidence_threshold: self.confidence_threshold,
            max_iterations: self.max_iterations,
            cors_allowed_origins: self.cors_allowed_origins.clone(),
        }
    }
}
