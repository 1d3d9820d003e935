//! Actuator: the boundary to whatever realizes GUI actions on the real
//! desktop (input device drivers, out of scope for this crate — §1).
//!
//! The orchestrator calls `capture` once per iteration and `apply` once per
//! executed action; no other component touches the Actuator (§5 shared
//! resource policy: no concurrent GUI actions).

use crate::model::ScreenFrame;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("apply failed: {0}")]
    ApplyFailed(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// An action already translated from model-space to screen pixels by
/// `normalize::to_pixels`, ready to be realized by the Actuator.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelAction {
    Click { x: u32, y: u32 },
    DoubleClick { x: u32, y: u32 },
    RightClick { x: u32, y: u32 },
    Type { text: String },
    Scroll { amount: i32 },
    Key { keys: Vec<String> },
    Move { x: u32, y: u32 },
    Drag { from: (u32, u32), to: (u32, u32) },
    Wait { duration: Duration },
}

#[async_trait]
pub trait Actuator: Send + Sync {
    /// Captures the current screen. Must be cancellable (§5 suspension points).
    async fn capture(&self) -> Result<ScreenFrame, ActuatorError>;

    /// Realizes one action on the desktop. Must be cancellable.
    async fn apply(&self, action: PixelAction) -> Result<(), ActuatorError>;
}

/// No-op actuator for tests and dry-run mode: captures a blank frame and
/// records applied actions instead of touching any real input device.
pub struct NullActuator {
    width_px: u32,
    height_px: u32,
    applied: parking_lot::Mutex<Vec<PixelAction>>,
}

impl NullActuator {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        Self {
            width_px,
            height_px,
            applied: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn applied_actions(&self) -> Vec<PixelAction> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl Actuator for NullActuator {
    async fn capture(&self) -> Result<ScreenFrame, ActuatorError> {
        Ok(ScreenFrame {
            captured_at: chrono::Utc::now(),
            width_px: self.width_px,
            height_px: self.height_px,
            jpeg_bytes: Vec::new(),
            base64_cache: None,
        })
    }

    async fn apply(&self, action: PixelAction) -> Result<(), ActuatorError> {
        self.applied.lock().push(action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_actuator_records_applied_actions() {
        let actuator = NullActuator::new(1920, 1080);
        let frame = actuator.capture().await.unwrap();
        assert_eq!(frame.width_px, 1920);
        actuator
            .apply(PixelAction::Click { x: 10, y: 1078 })
            .await
            .unwrap();
        assert_eq!(
            actuator.applied_actions(),
            vec![PixelAction::Click { x: 10, y: 1078 }]
        );
    }
}
