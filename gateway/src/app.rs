//! Gateway application state and router assembly, mirroring the teacher's
//! `app.rs`/`router` shape: one `AppState` handed to every handler via
//! `axum::extract::State`, built once in `run_gateway`.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use vla_config::Settings;
use vla_core::{Actuator, EventBus, OrchestratorHandle, SessionState, SharedVlmManager};

use crate::auth;
use crate::rate_limit::{self, RateLimiters};
use crate::routes;

/// Request body cap (§4.5): 1 MiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub event_bus: EventBus,
    pub session: Arc<SessionState>,
    pub orchestrator: OrchestratorHandle,
    pub vlm: Arc<SharedVlmManager>,
    pub actuator: Arc<dyn Actuator>,
    pub settings: Settings,
    pub root: PathBuf,
    pub api_key: String,
    pub rate_limiters: RateLimiters,
    pub wake_word_enabled: AtomicBool,
    pub streaming: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    pub default_model_id: String,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_bus: EventBus,
        session: Arc<SessionState>,
        orchestrator: OrchestratorHandle,
        vlm: Arc<SharedVlmManager>,
        actuator: Arc<dyn Actuator>,
        settings: Settings,
        root: PathBuf,
        api_key: String,
    ) -> Self {
        let rate_limiters = RateLimiters::new(
            settings.rate_limit_general_per_min,
            settings.rate_limit_lifecycle_per_min,
        );
        let default_model_id = settings.default_model_id.clone();
        Self {
            event_bus,
            session,
            orchestrator,
            vlm,
            actuator,
            settings,
            root,
            api_key,
            rate_limiters,
            wake_word_enabled: AtomicBool::new(false),
            streaming: AsyncMutex::new(None),
            default_model_id,
        }
    }
}

/// Builds the full router: `/health` unauthenticated, everything else behind
/// the bearer-token layer, lifecycle routes additionally behind the tighter
/// rate-limit tier (§4.5).
pub fn router(state: Arc<AppState>) -> Router {
    let lifecycle = Router::new()
        .route("/model/switch", post(routes::model::switch))
        .route("/agent/start", post(routes::agent::start))
        .route("/agent/stop", post(routes::agent::stop))
        .route("/agent/restart", post(routes::agent::restart))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::lifecycle_rate_limit,
        ));

    let general = Router::new()
        .route("/state", get(routes::core::state))
        .route("/task", post(routes::core::submit_task))
        .route("/steer", post(routes::core::steer))
        .route("/stop", post(routes::core::stop))
        .route("/pause", post(routes::core::pause))
        .route("/resume", post(routes::core::resume))
        .route("/chat/history", get(routes::chat::history))
        .route("/chat/send", post(routes::chat::send))
        .route("/stream/start", post(routes::chat::stream_start))
        .route("/stream/stop", post(routes::chat::stream_stop))
        .route("/frame/latest", get(routes::frame::latest))
        .route("/config", get(routes::config::get_config))
        .route("/models", get(routes::model::list))
        .route("/model/active", get(routes::model::active))
        .route("/wake-word/enable", post(routes::agent::wake_word_enable))
        .route("/wake-word/disable", post(routes::agent::wake_word_disable))
        .route("/wake-word/status", get(routes::agent::wake_word_status))
        .route("/agent/status", get(routes::agent::status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::general_rate_limit,
        ));

    let authenticated = general
        .merge(lifecycle)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer_token));

    let cors = cors_layer(&state.settings.cors_allowed_origins);

    Router::new()
        .route("/health", get(routes::core::health))
        .merge(authenticated)
        .route("/ws", get(crate::socket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
}
