// rendezvous/src/config.rs
// Every tunable the binary exposes, with defaults mirroring
// `room_protocol::config` so the server and the session manager never
// disagree about what "default" means.

use clap::Parser;

/// Runtime configuration for the rendezvous server. Constructed from CLI
/// flags (with environment variable fallback) by `src/bin/server.rs`;
/// library callers (tests, embedders) can also build one directly.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "room-rendezvous",
    about = "Untrusted bulletin-board server for room invites, presence, and signaling",
    version
)]
pub struct RendezvousConfig {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(long, env = "ROOM_RENDEZVOUS_BIND", default_value = "0.0.0.0:8787")]
    pub bind_addr: String,

    /// Share code time-to-live, in seconds.
    #[arg(long, env = "ROOM_SHARE_CODE_TTL_SECS", default_value_t = room_protocol::config::DEFAULT_SHARE_CODE_TTL_SECS)]
    pub share_code_ttl_secs: u64,

    /// Presence record time-to-live, in seconds.
    #[arg(long, env = "ROOM_PEER_TTL_SECS", default_value_t = room_protocol::config::DEFAULT_PEER_TTL_SECS)]
    pub peer_ttl_secs: u64,

    /// Per-IP request budget enforced on the REST surface.
    #[arg(long, env = "ROOM_MAX_REQUESTS_PER_IP_PER_MINUTE", default_value_t = room_protocol::config::DEFAULT_MAX_REQUESTS_PER_IP_PER_MINUTE)]
    pub max_requests_per_ip_per_minute: u32,

    /// Rolling window the per-IP request budget is measured over, in
    /// seconds.
    #[arg(long, env = "ROOM_RATE_LIMIT_WINDOW_SECS", default_value_t = room_protocol::config::DEFAULT_RATE_LIMIT_WINDOW_SECS)]
    pub rate_limit_window_secs: u64,

    /// Maximum simultaneous relay (signaling) connections from one IP.
    /// Implementation-defined per spec §4.2; not a per-request budget.
    #[arg(long, env = "ROOM_MAX_RELAY_CONNECTIONS_PER_IP", default_value_t = 20)]
    pub max_relay_connections_per_ip: u32,

    /// Log format: "pretty" for local development, "json" for production
    /// log aggregation.
    #[arg(long, env = "ROOM_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RendezvousConfig {
    /// A config suitable for unit/integration tests: short TTLs are still
    /// the real defaults (tests drive the clock with `tokio::time::advance`
    /// rather than needing shorter windows), but binds to an ephemeral port
    /// and never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            share_code_ttl_secs: room_protocol::config::DEFAULT_SHARE_CODE_TTL_SECS,
            peer_ttl_secs: room_protocol::config::DEFAULT_PEER_TTL_SECS,
            max_requests_per_ip_per_minute: room_protocol::config::DEFAULT_MAX_REQUESTS_PER_IP_PER_MINUTE,
            rate_limit_window_secs: room_protocol::config::DEFAULT_RATE_LIMIT_WINDOW_SECS,
            max_relay_connections_per_ip: 20,
            log_format: "pretty".into(),
        }
    }
}
