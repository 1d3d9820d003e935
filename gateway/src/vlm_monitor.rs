//! VLM health monitor (§4.2): a periodic background task that drives the
//! crash-detection and idle-release paths the VLM manager itself only
//! exposes as methods, never runs on its own (no global timer, §9).

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use vla_core::SharedVlmManager;

pub fn spawn_vlm_monitor(vlm: Arc<SharedVlmManager>, probe_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(probe_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            vlm.poll_health().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vla_core::vlm::VlmManagerConfig;
    use vla_core::{MockVlmClient, VlmClient, VlmManager};

    #[tokio::test]
    async fn spawn_runs_without_panicking() {
        let client: Arc<dyn VlmClient> = Arc::new(MockVlmClient::new(vec!["pong"]));
        let vlm = Arc::new(VlmManager::new(Arc::new(client), VlmManagerConfig::default(), "model-a"));
        let handle = spawn_vlm_monitor(vlm, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        let _ = handle.await;
    }
}
