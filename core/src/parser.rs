//! Parses the VLM's free-form output into an `ActionEnvelope` (§4.3).
//!
//! The pinned canonical serialization (Open Question decision, see
//! `DESIGN.md`) is a fenced ` ```action ` block of `key: value` lines:
//!
//! ```text
//! ```action
//! type: CLICK
//! target: 512, 743
//! confidence: 0.92
//! rationale: the Start button is in the bottom-left corner
//! ```
//! ```
//!
//! If multiple fenced `action` blocks are present, the last well-formed one
//! wins; if none parse, `ParseError` is returned to the orchestrator.

use std::collections::HashMap;
use thiserror::Error;
use vla_stream_event::{ActionEnvelope, ActionType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no well-formed action block found")]
    NoWellFormedBlock,
}

/// Scans `raw_text` for fenced ` ```action ` blocks; the last well-formed one wins.
pub fn parse(raw_text: &str) -> Result<ActionEnvelope, ParseError> {
    let mut last_ok = None;
    for block in extract_action_blocks(raw_text) {
        if let Ok(env) = parse_block(&block) {
            last_ok = Some(env);
        }
    }
    last_ok.ok_or(ParseError::NoWellFormedBlock)
}

fn extract_action_blocks(raw_text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = raw_text;
    while let Some(start) = rest.find("```action") {
        let after_open = &rest[start + "```action".len()..];
        let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);
        if let Some(end) = after_open.find("```") {
            blocks.push(after_open[..end].to_string());
            rest = &after_open[end + "```".len()..];
        } else {
            break;
        }
    }
    blocks
}

fn parse_fields(block: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    fields
}

fn parse_action_type(raw: &str) -> Option<ActionType> {
    match raw.trim().to_uppercase().as_str() {
        "CLICK" => Some(ActionType::Click),
        "DOUBLE_CLICK" => Some(ActionType::DoubleClick),
        "RIGHT_CLICK" => Some(ActionType::RightClick),
        "TYPE" => Some(ActionType::Type),
        "SCROLL" => Some(ActionType::Scroll),
        "KEY" => Some(ActionType::Key),
        "MOVE" => Some(ActionType::Move),
        "DRAG" => Some(ActionType::Drag),
        "WAIT" => Some(ActionType::Wait),
        "DONE" => Some(ActionType::Done),
        "FAIL" => Some(ActionType::Fail),
        _ => None,
    }
}

fn parse_target(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split(',').map(|p| p.trim().parse::<u32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    Some((x, y))
}

fn parse_block(block: &str) -> Result<ActionEnvelope, ParseError> {
    let fields = parse_fields(block);

    let action_type = fields
        .get("type")
        .and_then(|v| parse_action_type(v))
        .ok_or(ParseError::NoWellFormedBlock)?;

    let confidence = fields
        .get("confidence")
        .and_then(|v| v.parse::<f32>().ok())
        .ok_or(ParseError::NoWellFormedBlock)?;

    let target = fields.get("target").and_then(|v| parse_target(v));
    let text = fields.get("text").cloned();
    let amount = fields.get("amount").and_then(|v| v.parse::<i32>().ok());
    let keys = fields.get("keys").map(|v| {
        v.split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
    });
    let duration_ms = fields.get("duration_ms").and_then(|v| v.parse::<u64>().ok());
    let rationale = fields.get("rationale").cloned();

    let env = ActionEnvelope {
        action_type,
        target,
        text,
        amount,
        keys,
        duration_ms,
        confidence,
        rationale,
    };

    env.validate().map_err(|_| ParseError::NoWellFormedBlock)?;
    Ok(env)
}

/// Serializes an `ActionEnvelope` as the canonical fenced block, for tests
/// and for documenting the prompt format to the VLM.
pub fn serialize(env: &ActionEnvelope) -> String {
    let type_str = match env.action_type {
        ActionType::Click => "CLICK",
        ActionType::DoubleClick => "DOUBLE_CLICK",
        ActionType::RightClick => "RIGHT_CLICK",
        ActionType::Type => "TYPE",
        ActionType::Scroll => "SCROLL",
        ActionType::Key => "KEY",
        ActionType::Move => "MOVE",
        ActionType::Drag => "DRAG",
        ActionType::Wait => "WAIT",
        ActionType::Done => "DONE",
        ActionType::Fail => "FAIL",
    };

    let mut lines = vec![format!("type: {}", type_str)];
    if let Some((x, y)) = env.target {
        lines.push(format!("target: {}, {}", x, y));
    }
    if let Some(text) = &env.text {
        lines.push(format!("text: {}", text));
    }
    if let Some(amount) = env.amount {
        lines.push(format!("amount: {}", amount));
    }
    if let Some(keys) = &env.keys {
        lines.push(format!("keys: {}", keys.join(", ")));
    }
    if let Some(duration_ms) = env.duration_ms {
        lines.push(format!("duration_ms: {}", duration_ms));
    }
    lines.push(format!("confidence: {}", env.confidence));
    if let Some(rationale) = &env.rationale {
        lines.push(format!("rationale: {}", rationale));
    }

    format!("```action\n{}\n```", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_envelope() -> ActionEnvelope {
        ActionEnvelope {
            action_type: ActionType::Click,
            target: Some((512, 743)),
            text: None,
            amount: None,
            keys: None,
            duration_ms: None,
            confidence: 0.92,
            rationale: Some("the Start button is in the bottom-left corner".to_string()),
        }
    }

    #[test]
    fn parses_canonical_block() {
        let raw = serialize(&click_envelope());
        let env = parse(&raw).unwrap();
        assert_eq!(env, click_envelope());
    }

    #[test]
    fn parse_is_inverse_of_serialize_for_canonical_envelopes() {
        let envelopes = vec![
            click_envelope(),
            ActionEnvelope {
                action_type: ActionType::Type,
                target: None,
                text: Some("hello world".into()),
                amount: None,
                keys: None,
                duration_ms: None,
                confidence: 0.7,
                rationale: None,
            },
            ActionEnvelope {
                action_type: ActionType::Key,
                target: None,
                text: None,
                amount: None,
                keys: Some(vec!["ctrl".into(), "c".into()]),
                duration_ms: None,
                confidence: 1.0,
                rationale: None,
            },
            ActionEnvelope {
                action_type: ActionType::Wait,
                target: None,
                text: None,
                amount: None,
                keys: None,
                duration_ms: Some(500),
                confidence: 1.0,
                rationale: None,
            },
            ActionEnvelope {
                action_type: ActionType::Done,
                target: None,
                text: None,
                amount: None,
                keys: None,
                duration_ms: None,
                confidence: 1.0,
                rationale: Some("task complete".into()),
            },
        ];
        for env in envelopes {
            let raw = serialize(&env);
            assert_eq!(parse(&raw).unwrap(), env);
        }
    }

    #[test]
    fn two_envelopes_in_one_response_last_wins() {
        let first = click_envelope();
        let mut second = click_envelope();
        second.target = Some((10, 20));
        let raw = format!(
            "thinking out loud\n{}\nactually, let me reconsider\n{}",
            serialize(&first),
            serialize(&second)
        );
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.target, Some((10, 20)));
    }

    #[test]
    fn empty_string_is_a_parse_error() {
        assert_eq!(parse(""), Err(ParseError::NoWellFormedBlock));
    }

    #[test]
    fn free_form_text_with_no_block_is_a_parse_error() {
        assert_eq!(
            parse("I think I should click the Start button next."),
            Err(ParseError::NoWellFormedBlock)
        );
    }

    #[test]
    fn malformed_block_followed_by_well_formed_block_uses_the_latter() {
        let raw = format!(
            "```action\ntype: CLICK\nconfidence: 2.0\n```\n{}",
            serialize(&click_envelope())
        );
        assert_eq!(parse(&raw).unwrap(), click_envelope());
    }
}
