//! Frames carried over the peer-to-peer datagram channel, once transport
//! negotiation has produced an open, ordered, reliable channel between two
//! peers. Everything here is JSON; binary payloads (challenges, responses,
//! CRDT bytes) are base64-encoded inline.
//!
//! Any frame other than the ones below, or any `Crdt*` frame received
//! before the transport is `Authenticated`, is a protocol violation and
//! terminates the transport (see `room-session`'s auth state machine).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportFrame {
    #[serde(rename = "auth-challenge")]
    AuthChallenge { challenge: String },

    #[serde(rename = "auth-response")]
    AuthResponse { challenge: String, response: String },

    #[serde(rename = "auth-success")]
    AuthSuccess,

    #[serde(rename = "yjs-sync-request")]
    SyncRequest,

    #[serde(rename = "yjs-sync-response")]
    SyncResponse { update: String },

    #[serde(rename = "yjs-update")]
    Update { update: String },
}

impl TransportFrame {
    /// Any auth-phase frame. Used by the auth state machine to decide
    /// whether an incoming frame belongs to the handshake or the CRDT
    /// exchange that must follow it.
    pub fn is_auth_frame(&self) -> bool {
        matches!(
            self,
            TransportFrame::AuthChallenge { .. }
                | TransportFrame::AuthResponse { .. }
                | TransportFrame::AuthSuccess
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_challenge_round_trips() {
        let frame = TransportFrame::AuthChallenge { challenge: "YWJj".into() };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"auth-challenge\""));
        let back: TransportFrame = serde_json::from_str(&json).unwrap();
        assert!(back.is_auth_frame());
    }

    #[test]
    fn crdt_frames_are_not_auth_frames() {
        assert!(!TransportFrame::SyncRequest.is_auth_frame());
        assert!(!TransportFrame::Update { update: "x".into() }.is_auth_frame());
    }

    #[test]
    fn unknown_type_tag_fails_to_parse() {
        let json = r#"{"type":"not-a-real-frame"}"#;
        let result: Result<TransportFrame, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
