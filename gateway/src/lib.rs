//! HTTP/WebSocket gateway (C5, §4.5): binds the REST + socket surface,
//! wires up auth, rate limiting, CORS, and owns the VLM manager and
//! orchestrator for the process lifetime.
//!
//! **Public API**: [`run_gateway`], [`run_gateway_on_listener`].

mod app;
mod auth;
mod error;
mod heartbeat;
mod rate_limit;
mod routes;
mod socket;
mod supervisor;
mod vlm_monitor;

pub use app::{AppState, MAX_BODY_BYTES};
pub use error::GatewayError;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use vla_config::Settings;
use vla_core::{
    Actuator, EventBus, HttpVlmClient, Orchestrator, OrchestratorConfig, SessionState,
    SharedVlmManager, VlmClient, VlmManager,
};
use vla_core::vlm::VlmManagerConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8765";

fn vlm_manager_config(settings: &Settings) -> VlmManagerConfig {
    VlmManagerConfig {
        idle_window: Duration::from_secs(settings.vlm_idle_seconds),
        warmup_deadline: Duration::from_secs(settings.vlm_warmup_seconds),
        ..VlmManagerConfig::default()
    }
}

/// Runs the gateway on an existing listener. Used by tests (bind to
/// 127.0.0.1:0, then pass the listener) to avoid port collisions.
pub async fn run_gateway_on_listener(
    listener: TcpListener,
    root: PathBuf,
    actuator: Arc<dyn Actuator>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!(%addr, "gateway listening");

    let settings = Settings::load(&settings_path(&root))?;
    let api_key = auth::load_or_create(&auth::default_secret_path(&root))?;

    let event_bus = EventBus::new();
    let session = Arc::new(SessionState::new());

    let vlm_config = vlm_manager_config(&settings);
    let probe_interval = vlm_config.probe_interval;
    let vlm_client: Arc<dyn VlmClient> = Arc::new(HttpVlmClient::new());
    let vlm: Arc<SharedVlmManager> = Arc::new(VlmManager::new(
        Arc::new(vlm_client),
        vlm_config,
        settings.default_model_id.clone(),
    ));

    let orchestrator_config = OrchestratorConfig::from(&settings);
    let (orchestrator, orchestrator_handle) = Orchestrator::new(
        orchestrator_config,
        event_bus.clone(),
        session.clone(),
        vlm.clone(),
        actuator.clone(),
    );
    tokio::spawn(orchestrator.run());

    let heartbeat_handle = heartbeat::spawn_heartbeat(event_bus.clone(), settings.heartbeat_interval_minutes);
    let vlm_monitor_handle = vlm_monitor::spawn_vlm_monitor(vlm.clone(), probe_interval);

    let state = Arc::new(AppState::new(
        event_bus,
        session,
        orchestrator_handle,
        vlm,
        actuator,
        settings,
        root,
        api_key,
    ));

    let app = app::router(state);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await;
    heartbeat_handle.abort();
    vlm_monitor_handle.abort();
    result?;
    Ok(())
}

/// Runs the gateway. Listens on `addr` (default `127.0.0.1:8765`), rooted at
/// `root` for `config/settings.yaml` and `config/secrets/api_key`.
pub async fn run_gateway(
    addr: Option<&str>,
    root: PathBuf,
    actuator: Arc<dyn Actuator>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_BIND_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_gateway_on_listener(listener, root, actuator).await
}

fn settings_path(root: &Path) -> PathBuf {
    root.join("config").join("settings.yaml")
}
