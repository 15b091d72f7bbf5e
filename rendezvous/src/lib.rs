// rendezvous/src/lib.rs
// The untrusted bulletin board: invite redemption, presence announce/list,
// and the signaling relay, all backed by in-process expiring state. Nothing
// in this crate ever sees a password, a derived key, or CRDT bytes — it
// only ever handles room/peer identifiers and opaque SDP/ICE strings.

pub mod config;
pub mod error;
pub mod handlers;
pub mod invite;
pub mod presence;
pub mod ratelimit;
pub mod relay;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Router, extract::State};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::RendezvousConfig;
pub use error::RendezvousError;

use invite::InviteStore;
use presence::PresenceStore;
use ratelimit::RateLimiter;
use relay::RelayRegistry;

/// Everything a handler needs, cheap to clone (everything behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub invites: Arc<InviteStore>,
    pub presence: Arc<PresenceStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub relay: Arc<RelayRegistry>,
    pub config: Arc<RendezvousConfig>,
}

impl AppState {
    pub fn new(config: RendezvousConfig) -> Self {
        let config = Arc::new(config);
        Self {
            invites: Arc::new(InviteStore::new(tokio::time::Duration::from_secs(
                config.share_code_ttl_secs,
            ))),
            presence: Arc::new(PresenceStore::new(tokio::time::Duration::from_secs(
                config.peer_ttl_secs,
            ))),
            rate_limiter: Arc::new(RateLimiter::new(
                config.max_requests_per_ip_per_minute,
                tokio::time::Duration::from_secs(config.rate_limit_window_secs),
            )),
            relay: Arc::new(RelayRegistry::new(config.max_relay_connections_per_ip)),
            config,
        }
    }
}

/// Build the full router: the rate-limited REST surface plus the signaling
/// relay upgrade (counted against simultaneous-connection limits instead,
/// per spec §4.2).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let rest = Router::new()
        .route("/invite", post(handlers::create_invite))
        .route("/join/:code", post(handlers::join))
        .route("/room/:room_id/announce", post(handlers::announce))
        .route("/room/:room_id/peers", get(handlers::list_peers))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_layer));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(rest)
        .route("/room/:room_id/signal", get(handlers::signal))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-IP request budget, applied to every REST route except `/health` and
/// the relay upgrade (spec §4.2: "Every HTTP request is gated" means every
/// request that can have a side effect; the relay is metered separately by
/// simultaneous connections, not per frame).
async fn rate_limit_layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    if state.rate_limiter.check(addr.ip()).await {
        next.run(request).await
    } else {
        RendezvousError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(RendezvousConfig::for_tests())
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
