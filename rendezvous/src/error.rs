// rendezvous/src/error.rs
// Every handler returns `Result<T, RendezvousError>`. The `IntoResponse`
// impl below is the one place the error taxonomy gets mapped onto HTTP
// status codes, so a handler never has to remember which code a failure
// mode deserves.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use room_protocol::http::ErrorResponse;

#[derive(Debug, Error)]
pub enum RendezvousError {
    /// Malformed request: bad room id, bad share code shape, missing field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The room, invite, or peer referenced does not exist or has expired.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller has exceeded its request budget.
    #[error("rate limited")]
    RateLimited,

    /// A transient failure the caller should retry with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The WebSocket peer violated the signaling protocol (unknown frame,
    /// frame addressed to a peer not in the room, frame before
    /// registration). Fatal to the connection, not necessarily to the room.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl RendezvousError {
    fn status(&self) -> StatusCode {
        match self {
            RendezvousError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RendezvousError::NotFound(_) => StatusCode::NOT_FOUND,
            RendezvousError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RendezvousError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            RendezvousError::ProtocolViolation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RendezvousError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, %status, "request failed");
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
