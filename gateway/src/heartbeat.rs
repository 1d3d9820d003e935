//! Heartbeat (§4.5): a periodic, active-hours-gated task that can synthesize
//! `chat_message` events. Emits nothing when no action is warranted, which
//! today is always — there is no content yet for the heartbeat to author.

use chrono::Timelike;
use std::time::Duration;
use tokio::task::JoinHandle;
use vla_core::EventBus;

/// Heartbeat only runs during these local hours; outside the window each
/// tick is a no-op.
const ACTIVE_HOURS: std::ops::Range<u32> = 7..23;

pub struct Heartbeat {
    event_bus: EventBus,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(event_bus: EventBus, interval_minutes: u64) -> Self {
        Self {
            event_bus,
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }

    fn tick(&self) {
        if !ACTIVE_HOURS.contains(&chrono::Utc::now().hour()) {
            return;
        }
        // Nothing yet warrants a synthesized chat_message; a future decision
        // step (e.g. idle-too-long nudge) would publish via self.event_bus
        // here instead of a no-op.
        let _ = &self.event_bus;
    }
}

pub fn spawn_heartbeat(event_bus: EventBus, interval_minutes: u64) -> JoinHandle<()> {
    Heartbeat::new(event_bus, interval_minutes).spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vla_core::EventBus;

    #[tokio::test]
    async fn spawn_runs_without_panicking() {
        let bus = EventBus::new();
        let handle = spawn_heartbeat(bus, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;
    }

    #[test]
    fn active_hours_excludes_late_night() {
        assert!(!ACTIVE_HOURS.contains(&3));
        assert!(ACTIVE_HOURS.contains(&12));
    }
}
