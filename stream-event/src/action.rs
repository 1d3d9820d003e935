//! `ActionEnvelope`: the shape a VLM turn parses into (data model §3).
//!
//! This module is data-only; the normalizer in `vla-core` validates and
//! clamps coordinates. The invariants it enforces (pointer actions require
//! `target`, `TYPE` requires `text`, etc.) are checked here via `validate`
//! since they are shape-level, not screen-geometry-level.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Click,
    DoubleClick,
    RightClick,
    Type,
    Scroll,
    Key,
    Move,
    Drag,
    Wait,
    Done,
    Fail,
}

impl ActionType {
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            ActionType::Click
                | ActionType::DoubleClick
                | ActionType::RightClick
                | ActionType::Move
                | ActionType::Drag
        )
    }
}

/// What the VLM returns per step. `target` is model-normalized `[0, 1000]^2`;
/// `vla-core::normalize` maps it to screen pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub target: Option<(u32, u32)>,
    pub text: Option<String>,
    pub amount: Option<i32>,
    pub keys: Option<Vec<String>>,
    pub duration_ms: Option<u64>,
    pub confidence: f32,
    pub rationale: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0:?} requires a target coordinate")]
    MissingTarget(ActionType),
    #[error("TYPE requires text")]
    MissingText,
    #[error("KEY requires a non-empty keys list")]
    MissingKeys,
    #[error("{0:?} requires a rationale")]
    MissingRationale(ActionType),
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),
}

impl ActionEnvelope {
    /// Shape-level validation per the data model invariants. Does not touch
    /// screen coordinates; see `vla-core::normalize` for clamping to pixels.
    pub fn validate(&self) -> Result<(), ActionError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ActionError::ConfidenceOutOfRange(self.confidence));
        }
        if self.action_type.is_pointer() && self.target.is_none() {
            return Err(ActionError::MissingTarget(self.action_type));
        }
        if self.action_type == ActionType::Type && self.text.is_none() {
            return Err(ActionError::MissingText);
        }
        if self.action_type == ActionType::Key
            && self.keys.as_ref().map(|k| k.is_empty()).unwrap_or(true)
        {
            return Err(ActionError::MissingKeys);
        }
        if matches!(self.action_type, ActionType::Done | ActionType::Fail) && self.rationale.is_none()
        {
            return Err(ActionError::MissingRationale(self.action_type));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(action_type: ActionType) -> ActionEnvelope {
        ActionEnvelope {
            action_type,
            target: None,
            text: None,
            amount: None,
            keys: None,
            duration_ms: None,
            confidence: 0.9,
            rationale: None,
        }
    }

    #[test]
    fn click_requires_target() {
        let env = base(ActionType::Click);
        assert_eq!(env.validate(), Err(ActionError::MissingTarget(ActionType::Click)));
    }

    #[test]
    fn click_with_target_is_valid() {
        let mut env = base(ActionType::Click);
        env.target = Some((512, 743));
        assert!(env.validate().is_ok());
    }

    #[test]
    fn type_requires_text() {
        let env = base(ActionType::Type);
        assert_eq!(env.validate(), Err(ActionError::MissingText));
    }

    #[test]
    fn key_requires_nonempty_keys() {
        let mut env = base(ActionType::Key);
        env.keys = Some(vec![]);
        assert_eq!(env.validate(), Err(ActionError::MissingKeys));
    }

    #[test]
    fn done_requires_rationale() {
        let env = base(ActionType::Done);
        assert_eq!(
            env.validate(),
            Err(ActionError::MissingRationale(ActionType::Done))
        );
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let mut env = base(ActionType::Wait);
        env.confidence = 1.5;
        assert_eq!(env.validate(), Err(ActionError::ConfidenceOutOfRange(1.5)));
    }

    #[test]
    fn wait_needs_nothing_extra() {
        let env = base(ActionType::Wait);
        assert!(env.validate().is_ok());
    }

    #[test]
    fn serde_round_trips_with_snake_case_type_tag() {
        let mut env = base(ActionType::Click);
        env.target = Some((10, 20));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"type\":\"CLICK\""));
        let back: ActionEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
