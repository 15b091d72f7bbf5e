// session/src/config.rs
// Per Design Notes §9 ("Global singletons"): this is a plain value the
// embedding application constructs and owns, not a lazy static. Multiple
// rooms simply hold their own `SessionConfig` (and their own
// `RendezvousClient`, `RoomSession`) side by side.

use std::time::Duration;

/// Configuration for one `RoomSession`. Defaults mirror
/// `room_protocol::config` exactly, per spec §6's Configuration table.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the rendezvous server, e.g. `https://rendezvous.example.com`.
    pub rendezvous_base_url: String,

    pub announce_interval: Duration,
    pub poll_interval: Duration,
    pub request_deadline: Duration,
    pub negotiation_budget: Duration,
    pub auth_response_budget: Duration,

    /// Floor/cap of the relay reconnect backoff (Open Question (b)
    /// resolution: jittered exponential, not the source's fixed 5s).
    pub reconnect_backoff_floor: Duration,
    pub reconnect_backoff_cap: Duration,

    /// Consecutive `RateLimited` responses before announce/poll timers
    /// pause for one backoff interval (Open Question (c) resolution).
    pub rate_limit_pause_threshold: u32,

    /// STUN/TURN URLs handed to the transport negotiator. Opaque to the
    /// session manager itself — see `session::transport`.
    pub ice_servers: Vec<String>,
}

impl SessionConfig {
    pub fn new(rendezvous_base_url: impl Into<String>) -> Self {
        use room_protocol::config as defaults;
        Self {
            rendezvous_base_url: rendezvous_base_url.into(),
            announce_interval: Duration::from_secs(defaults::DEFAULT_ANNOUNCE_INTERVAL_SECS),
            poll_interval: Duration::from_secs(defaults::DEFAULT_POLL_INTERVAL_SECS),
            request_deadline: Duration::from_millis(defaults::DEFAULT_REQUEST_DEADLINE_MS),
            negotiation_budget: Duration::from_millis(defaults::DEFAULT_NEGOTIATION_BUDGET_MS),
            auth_response_budget: Duration::from_millis(defaults::DEFAULT_AUTH_RESPONSE_BUDGET_MS),
            reconnect_backoff_floor: Duration::from_millis(defaults::DEFAULT_RECONNECT_BACKOFF_FLOOR_MS),
            reconnect_backoff_cap: Duration::from_millis(defaults::DEFAULT_RECONNECT_BACKOFF_CAP_MS),
            rate_limit_pause_threshold: defaults::DEFAULT_RATE_LIMIT_PAUSE_THRESHOLD,
            ice_servers: Vec::new(),
        }
    }
}
