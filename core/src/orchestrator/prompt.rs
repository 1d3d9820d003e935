//! Builds the per-iteration prompt from system persona, heartbeat context,
//! short conversation history, steer hints and the current command (§4.4 step 1).

use crate::session::{ChatMessage, ChatRole};

const SYSTEM_PERSONA: &str = "You are a vision-language desktop agent. Given a screenshot and a \
command, reply with exactly one fenced ```action block describing the next step.";

/// One turn handed to the VLM's chat call, kept separate from `session::ChatMessage`
/// so the wire format can diverge from what the VLM actually receives (e.g. the
/// image attaches only to the final user turn).
#[derive(Clone, Debug)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

pub struct PromptBuilder<'a> {
    pub command: &'a str,
    pub history: &'a [ChatMessage],
    pub history_turns: usize,
    pub steer_hints: &'a [String],
    pub heartbeat_context: Option<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    pub fn build(&self) -> Vec<PromptMessage> {
        let mut messages = vec![PromptMessage {
            role: "system".to_string(),
            content: SYSTEM_PERSONA.to_string(),
        }];

        if let Some(ctx) = self.heartbeat_context {
            messages.push(PromptMessage {
                role: "system".to_string(),
                content: ctx.to_string(),
            });
        }

        let recent = self
            .history
            .iter()
            .rev()
            .take(self.history_turns)
            .collect::<Vec<_>>();
        for turn in recent.into_iter().rev() {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => "system",
            };
            messages.push(PromptMessage {
                role: role.to_string(),
                content: turn.text.clone(),
            });
        }

        let mut user_content = self.command.to_string();
        if !self.steer_hints.is_empty() {
            user_content.push_str("\n\nSteering guidance since last step:\n");
            user_content.push_str(&self.steer_hints.join("\n"));
        }
        messages.push(PromptMessage {
            role: "user".to_string(),
            content: user_content,
        });

        messages
    }
}
