//! Bridges the user-editable `vla_config::Settings` into the knobs the
//! control loop actually reads, with the defaults from §4.4/§5 filled in
//! for anything `Settings` does not cover.

use std::time::Duration;
use vla_config::Settings;

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub confidence_threshold: f32,
    /// Last K user/assistant turns folded into the prompt (§4.4 step 1).
    pub history_turns: usize,
    pub post_action_delay: Duration,
    pub shutdown_window: Duration,
    pub capture_timeout: Duration,
    pub actuator_timeout: Duration,
    pub chat_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            confidence_threshold: 0.8,
            history_turns: 10,
            post_action_delay: Duration::from_millis(100),
            shutdown_window: Duration::from_secs(2),
            capture_timeout: Duration::from_secs(2),
            actuator_timeout: Duration::from_secs(5),
            chat_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            confidence_threshold: settings.confidence_threshold,
            ..Self::default()
        }
    }
}
