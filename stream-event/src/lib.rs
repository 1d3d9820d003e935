//! Wire-level event types published on the agent event bus.
//!
//! This crate defines the wire shape only (`Event`, its `kind`, and payloads);
//! it has no dependency on the orchestrator or gateway. `vla-core` publishes
//! these events and `vla-gateway` forwards them to subscribers unchanged.

mod action;
mod event;

pub use action::{ActionEnvelope, ActionError, ActionType};
pub use event::{
    ActionPayload, ChatMessagePayload, ChatRole, Event, EventKind, EventPayload, FramePayload,
    StatusPayload, VoiceLevelPayload, VoicePartialPayload, VoiceStatePayload,
};
