// session/src/status.rs
// The user-visible surface (spec §7): a status enum plus an event stream
// the embedding application subscribes to. Detail beyond this belongs in
// structured `tracing` logs, not in the application-facing API.

use room_protocol::ids::PeerId;

/// Top-level session status. Mirrors the `Idle/Connecting/Syncing/Error`
/// state machine in spec §4.3 one-to-one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Syncing,
    Error { message: String },
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Syncing => "syncing",
            SessionStatus::Error { .. } => "error",
        }
    }
}

/// Notifications the session emits on its event channel. The application
/// is expected to drain these rather than poll `status()` (though both are
/// available — `status()` answers "what state are we in right now", the
/// event stream answers "what just happened").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    /// A non-fatal rate-limit backoff is in effect; announce/poll timers
    /// are paused until it lifts (Open Question (c) resolution).
    RateLimitPaused,
    RateLimitResumed,
}
