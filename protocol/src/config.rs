//! Every tunable named in the spec's Configuration table lives here as a
//! constant default. `room-rendezvous` and `room-session` both build their
//! own config structs (CLI-driven for the server, constructed by the
//! embedding app for the session) but fall back to these when a value
//! isn't supplied, so the two components never drift apart on defaults.

/// Default PBKDF2-HMAC-SHA256 iteration count. Mirrors
/// `room_crypto::PBKDF2_ITERATIONS`; kept here too so config plumbing
/// doesn't need to depend on the crypto crate just to print a default.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Share code time-to-live, in seconds.
pub const DEFAULT_SHARE_CODE_TTL_SECS: u64 = 300;

/// Presence record time-to-live, in seconds.
pub const DEFAULT_PEER_TTL_SECS: u64 = 120;

/// Presence re-announcement interval, in seconds.
pub const DEFAULT_ANNOUNCE_INTERVAL_SECS: u64 = 60;

/// Presence poll interval, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Deadline for a single outbound HTTP request to the rendezvous server, in
/// milliseconds.
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 10_000;

/// Total budget from first offer to `Authenticated`, in milliseconds.
pub const DEFAULT_NEGOTIATION_BUDGET_MS: u64 = 30_000;

/// Deadline for an outstanding `auth-response` after sending
/// `auth-challenge`, in milliseconds.
pub const DEFAULT_AUTH_RESPONSE_BUDGET_MS: u64 = 5_000;

/// Per-IP request budget enforced by the rendezvous server.
pub const DEFAULT_MAX_REQUESTS_PER_IP_PER_MINUTE: u32 = 100;

/// Rolling window the per-IP request budget is measured over, in seconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Floor of the relay reconnect backoff, in milliseconds (Open Question (b)
/// resolution — see DESIGN.md).
pub const DEFAULT_RECONNECT_BACKOFF_FLOOR_MS: u64 = 5_000;

/// Ceiling of the relay reconnect backoff, in milliseconds.
pub const DEFAULT_RECONNECT_BACKOFF_CAP_MS: u64 = 60_000;

/// Consecutive `RateLimited` responses before the session pauses its
/// announce/poll timers for one backoff interval (Open Question (c)).
pub const DEFAULT_RATE_LIMIT_PAUSE_THRESHOLD: u32 = 5;
