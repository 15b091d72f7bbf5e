// session/src/error.rs
// The session-side error taxonomy from spec §7. Only `Fatal` ever surfaces
// to the embedding application as a session-wide error (`SessionStatus::
// Error`); everything else is handled inside the session (backoff,
// per-transport eviction) per the propagation policy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed identifier or missing required field at a session API
    /// boundary (e.g. an empty password).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The rendezvous server reported the resource doesn't exist (unknown
    /// share code, unknown room).
    #[error("not found: {0}")]
    NotFound(String),

    /// The rendezvous server's per-IP budget is exhausted. Non-fatal; the
    /// caller backs off and retries.
    #[error("rate limited")]
    RateLimited,

    /// A storage or network hiccup. Retried with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// PBKDF2 failure, AEAD tag mismatch, or HMAC verify mismatch at the
    /// handshake boundary. Reported to the user as "incorrect password"
    /// without distinguishing the underlying cause.
    #[error("incorrect password")]
    CryptoFailure,

    /// An unexpected frame, an unmatched challenge, or a CRDT frame before
    /// authentication. Fatal to the transport it occurred on; never
    /// retried on that same transport.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Misconfiguration or corrupted local state. Fatal to the whole
    /// session — the user must re-enter the password and call `start`
    /// again.
    #[error("fatal session error: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Whether this error should tear down the whole session (`Fatal`
    /// only) as opposed to being handled locally (transport eviction,
    /// backoff-and-retry).
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Fatal(_))
    }
}
