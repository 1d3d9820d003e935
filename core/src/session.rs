//! C6 Session & Chat State: short per-task conversation history plus the
//! coalesced observer snapshot (§4.6). Reads are non-blocking clones; writes
//! happen only from the orchestrator's context or on chat ingress.

use crate::model::AgentSnapshot;
use parking_lot::RwLock;
use std::collections::VecDeque;

const DEFAULT_CHAT_HISTORY_CAPACITY: usize = 50;
const DEFAULT_ACTIVITY_LOG_CAPACITY: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug)]
pub struct ActivityEntry {
    pub text: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

struct Inner {
    chat_history: VecDeque<ChatMessage>,
    activity_log: VecDeque<ActivityEntry>,
    snapshot: AgentSnapshot,
}

/// Holds the last N chat messages and the coalesced `AgentSnapshot` (§4.6).
pub struct SessionState {
    inner: RwLock<Inner>,
    chat_capacity: usize,
    activity_capacity: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHAT_HISTORY_CAPACITY, DEFAULT_ACTIVITY_LOG_CAPACITY)
    }

    pub fn with_capacity(chat_capacity: usize, activity_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                chat_history: VecDeque::new(),
                activity_log: VecDeque::new(),
                snapshot: AgentSnapshot::idle(),
            }),
            chat_capacity,
            activity_capacity,
        }
    }

    pub fn push_chat(&self, role: ChatRole, text: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.chat_history.push_back(ChatMessage {
            role,
            text: text.into(),
            at: chrono::Utc::now(),
        });
        while inner.chat_history.len() > self.chat_capacity {
            inner.chat_history.pop_front();
        }
    }

    pub fn push_activity(&self, text: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.activity_log.push_back(ActivityEntry {
            text: text.into(),
            at: chrono::Utc::now(),
        });
        while inner.activity_log.len() > self.activity_capacity {
            inner.activity_log.pop_front();
        }
    }

    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.inner.read().chat_history.iter().cloned().collect()
    }

    /// The last `activity_capacity` thought/action entries (§4.6).
    pub fn activity_log(&self) -> Vec<ActivityEntry> {
        self.inner.read().activity_log.iter().cloned().collect()
    }

    pub fn clear_chat(&self) {
        self.inner.write().chat_history.clear();
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        self.inner.read().snapshot.clone()
    }

    pub fn set_snapshot(&self, snapshot: AgentSnapshot) {
        self.inner.write().snapshot = snapshot;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_history_bounded_by_capacity() {
        let session = SessionState::with_capacity(2, 30);
        session.push_chat(ChatRole::User, "one");
        session.push_chat(ChatRole::Assistant, "two");
        session.push_chat(ChatRole::User, "three");
        let history = session.chat_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "two");
        assert_eq!(history[1].text, "three");
    }

    #[test]
    fn clear_chat_empties_history() {
        let session = SessionState::new();
        session.push_chat(ChatRole::User, "hello");
        session.clear_chat();
        assert!(session.chat_history().is_empty());
    }

    #[test]
    fn snapshot_round_trips() {
        let session = SessionState::new();
        let mut snap = AgentSnapshot::idle();
        snap.last_thought = Some("checking the taskbar".to_string());
        session.set_snapshot(snap);
        assert_eq!(
            session.snapshot().last_thought.as_deref(),
            Some("checking the taskbar")
        );
    }
}
