//! Per-tier, per-client rate limiting (§4.5) via `governor`. Two quotas:
//! `general` for read/observe routes and `lifecycle` for task/agent/model
//! mutations, each keyed by the caller's source address so one busy client
//! cannot exhaust another's quota.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::app::AppState;

type KeyedLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

pub struct RateLimiters {
    general: KeyedLimiter,
    lifecycle: KeyedLimiter,
}

impl RateLimiters {
    pub fn new(general_per_min: u32, lifecycle_per_min: u32) -> Self {
        Self {
            general: RateLimiter::keyed(per_minute_quota(general_per_min)),
            lifecycle: RateLimiter::keyed(per_minute_quota(lifecycle_per_min)),
        }
    }

    fn check_general(&self, key: &str) -> bool {
        self.general.check_key(&key.to_string()).is_ok()
    }

    fn check_lifecycle(&self, key: &str) -> bool {
        self.lifecycle.check_key(&key.to_string()).is_ok()
    }
}

fn per_minute_quota(per_min: u32) -> Quota {
    let nonzero = NonZeroU32::new(per_min.max(1)).expect("max(1) is never zero");
    Quota::per_minute(nonzero)
}

/// The per-caller key: the connecting socket address, or a constant when the
/// server is not run behind `into_make_service_with_connect_info` (tests that
/// build a bare `Router` without connect info share one bucket).
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let key = client_key(&request);
    if state.rate_limiters.check_general(&key) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

pub async fn lifecycle_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let key = client_key(&request);
    if state.rate_limiters.check_lifecycle(&key) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausting_the_quota_rejects_further_requests_for_that_key() {
        let limiters = RateLimiters::new(1, 1);
        assert!(limiters.check_general("1.2.3.4"));
        assert!(!limiters.check_general("1.2.3.4"));
    }

    #[test]
    fn separate_keys_get_independent_buckets() {
        let limiters = RateLimiters::new(1, 1);
        assert!(limiters.check_general("1.2.3.4"));
        assert!(limiters.check_general("5.6.7.8"));
    }
}
