//! Event: `{kind, at, payload}` (data model §3). `kind` is carried alongside
//! `payload` rather than derived from it so subscribers can filter on kind
//! without deserializing the payload.

use crate::action::ActionEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Status,
    Thought,
    Action,
    Frame,
    VoiceState,
    VoicePartial,
    VoiceLevel,
    ChatMessage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    pub details: Option<String>,
    pub vlm_status: Option<String>,
    pub pid: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub envelope: ActionEnvelope,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    pub captured_at: DateTime<Utc>,
    pub width_px: u32,
    pub height_px: u32,
    /// Base64-encoded JPEG bytes (`ScreenFrame::base64_cache`).
    pub jpeg_base64: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    pub state: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoicePartialPayload {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceLevelPayload {
    pub level: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Status(StatusPayload),
    Thought(ThoughtPayload),
    Action(ActionPayload),
    Frame(FramePayload),
    VoiceState(VoiceStatePayload),
    VoicePartial(VoicePartialPayload),
    VoiceLevel(VoiceLevelPayload),
    ChatMessage(ChatMessagePayload),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThoughtPayload {
    pub text: String,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Status(_) => EventKind::Status,
            EventPayload::Thought(_) => EventKind::Thought,
            EventPayload::Action(_) => EventKind::Action,
            EventPayload::Frame(_) => EventKind::Frame,
            EventPayload::VoiceState(_) => EventKind::VoiceState,
            EventPayload::VoicePartial(_) => EventKind::VoicePartial,
            EventPayload::VoiceLevel(_) => EventKind::VoiceLevel,
            EventPayload::ChatMessage(_) => EventKind::ChatMessage,
        }
    }
}

/// One event published on the bus. `kind` always matches `payload.kind()`;
/// construct via `Event::new` rather than the fields directly to preserve that.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            kind: payload.kind(),
            at: Utc::now(),
            payload,
        }
    }

    /// Coalesced kinds overwrite the current value rather than append to history
    /// (event bus §4.1): `status`, `voice_state`, `voice_level`, `frame`.
    pub fn is_coalesced(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Status | EventKind::VoiceState | EventKind::VoiceLevel | EventKind::Frame
        )
    }
}
