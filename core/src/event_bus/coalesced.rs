//! Current-value cell for coalesced event kinds, plus bounded history for
//! `thought`/`action`/`chat_message` (§4.1).

use parking_lot::Mutex;
use std::collections::VecDeque;
use vla_stream_event::{Event, EventKind};

const DEFAULT_HISTORY_CAPACITY: usize = 200;

#[derive(Clone, Debug, Default)]
pub struct CoalescedSnapshot {
    pub status: Option<Event>,
    pub voice_state: Option<Event>,
    pub voice_level: Option<Event>,
    pub frame: Option<Event>,
    pub thoughts: Vec<Event>,
    pub actions: Vec<Event>,
    pub chat_messages: Vec<Event>,
}

struct State {
    status: Option<Event>,
    voice_state: Option<Event>,
    voice_level: Option<Event>,
    frame: Option<Event>,
    thoughts: VecDeque<Event>,
    actions: VecDeque<Event>,
    chat_messages: VecDeque<Event>,
}

pub struct Coalesced {
    state: Mutex<State>,
    history_capacity: usize,
}

impl Coalesced {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                status: None,
                voice_state: None,
                voice_level: None,
                frame: None,
                thoughts: VecDeque::new(),
                actions: VecDeque::new(),
                chat_messages: VecDeque::new(),
            }),
            history_capacity,
        }
    }

    /// Overwrites the current value for a coalesced kind.
    pub fn set(&self, event: Event) {
        let mut state = self.state.lock();
        match event.kind {
            EventKind::Status => state.status = Some(event),
            EventKind::VoiceState => state.voice_state = Some(event),
            EventKind::VoiceLevel => state.voice_level = Some(event),
            EventKind::Frame => state.frame = Some(event),
            _ => {}
        }
    }

    /// Appends to a bounded history queue, evicting the oldest entry past capacity.
    pub fn push_history(&self, event: Event) {
        let mut state = self.state.lock();
        let capacity = self.history_capacity;
        let queue = match event.kind {
            EventKind::Thought => &mut state.thoughts,
            EventKind::Action => &mut state.actions,
            EventKind::ChatMessage => &mut state.chat_messages,
            _ => return,
        };
        queue.push_back(event);
        while queue.len() > capacity {
            queue.pop_front();
        }
    }

    pub fn snapshot(&self) -> CoalescedSnapshot {
        let state = self.state.lock();
        CoalescedSnapshot {
            status: state.status.clone(),
            voice_state: state.voice_state.clone(),
            voice_level: state.voice_level.clone(),
            frame: state.frame.clone(),
            thoughts: state.thoughts.iter().cloned().collect(),
            actions: state.actions.iter().cloned().collect(),
            chat_messages: state.chat_messages.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vla_stream_event::{EventPayload, StatusPayload, ThoughtPayload};

    fn status(s: &str) -> Event {
        Event::new(EventPayload::Status(StatusPayload {
            status: s.to_string(),
            details: None,
            vlm_status: None,
            pid: None,
        }))
    }

    fn thought(text: &str) -> Event {
        Event::new(EventPayload::Thought(ThoughtPayload {
            text: text.to_string(),
        }))
    }

    #[test]
    fn status_overwrites_current_value() {
        let c = Coalesced::new();
        c.set(status("THINKING"));
        c.set(status("EXECUTING"));
        let snap = c.snapshot();
        match snap.status.unwrap().payload {
            EventPayload::Status(p) => assert_eq!(p.status, "EXECUTING"),
            _ => panic!("expected status payload"),
        }
    }

    #[test]
    fn thought_history_is_bounded() {
        let c = Coalesced::with_history_capacity(3);
        for i in 0..5 {
            c.push_history(thought(&i.to_string()));
        }
        let snap = c.snapshot();
        assert_eq!(snap.thoughts.len(), 3);
        match &snap.thoughts[0].payload {
            EventPayload::Thought(p) => assert_eq!(p.text, "2"),
            _ => panic!("expected thought payload"),
        }
    }
}
