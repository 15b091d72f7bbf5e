// session/src/auth.rs
// The mutual-authentication state machine from spec §4.3, run once per
// transport after the datagram channel reaches `Open`. Pure state over
// `TransportFrame`s — it doesn't touch the transport itself, so it's
// tested without any I/O and driven by `session::session`'s per-transport
// task, which does own the transport.
//
// A transport is `Authenticated` only once both bits are set: we've
// verified the peer's signature on our own challenge (`outbound`), and the
// peer has told us it accepted our response to theirs (`inbound`, via
// `auth-success`). Per Design Notes §9, `auth-success` is not a bare trust
// signal — the peer only sends it after locally verifying our HMAC under
// the shared `AuthKey`, so an attacker without the password cannot produce
// one. We rely on that rather than independently re-deriving the reverse
// check, which would require knowing the peer's private state.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use room_crypto::{sign, verify, DerivedKey};
use room_protocol::transport::TransportFrame;

use crate::error::SessionError;

pub struct AuthHandshake {
    auth_key: DerivedKey,
    c_out: [u8; 32],
    /// The peer's challenge, once we've answered it. Set the first time the
    /// `AuthChallenge` arm signs one; guards against both replying twice and
    /// — the attack spec.md:49 rules out — signing `c_out` reflected back at
    /// us inside a crafted `AuthChallenge` frame, which would otherwise hand
    /// an attacker a genuine self-signature to replay as our own response.
    c_in: Option<[u8; 32]>,
    outbound_authenticated: bool,
    inbound_authenticated: bool,
}

impl AuthHandshake {
    /// Start a handshake. Returns the handshake object plus the
    /// `auth-challenge` frame the caller must send immediately — every
    /// peer sends its own challenge on `ChannelOpen` regardless of
    /// offerer/answerer role (spec §4.3: "on tie, both sides send").
    pub fn start(auth_key: DerivedKey) -> (Self, TransportFrame) {
        let c_out = room_crypto::new_challenge();
        let challenge_frame = TransportFrame::AuthChallenge { challenge: BASE64.encode(c_out) };
        (
            Self {
                auth_key,
                c_out,
                c_in: None,
                outbound_authenticated: false,
                inbound_authenticated: false,
            },
            challenge_frame,
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.outbound_authenticated && self.inbound_authenticated
    }

    /// Handle one inbound frame. Returns the frames to send in response
    /// (zero, one). Any frame other than the three auth frames, or any
    /// frame that violates the handshake (unmatched challenge, bad
    /// signature), is a `ProtocolViolation` — fatal to this transport.
    pub fn handle(&mut self, frame: &TransportFrame) -> Result<Vec<TransportFrame>, SessionError> {
        match frame {
            TransportFrame::AuthChallenge { challenge } => {
                let c_in = decode_challenge(challenge)?;
                if c_in == self.c_out {
                    return Err(SessionError::ProtocolViolation(
                        "refusing to sign our own outbound challenge reflected back at us".into(),
                    ));
                }
                if self.c_in.is_some() {
                    return Err(SessionError::ProtocolViolation(
                        "peer sent more than one auth-challenge".into(),
                    ));
                }
                self.c_in = Some(c_in);
                let response = sign(&c_in, &self.auth_key);
                Ok(vec![TransportFrame::AuthResponse {
                    challenge: BASE64.encode(c_in),
                    response: BASE64.encode(response),
                }])
            }
            TransportFrame::AuthResponse { challenge, response } => {
                let claimed_out = decode_challenge(challenge)?;
                let response_bytes = BASE64
                    .decode(response)
                    .map_err(|_| SessionError::ProtocolViolation("malformed auth-response".into()))?;

                if claimed_out != self.c_out || !verify(&self.c_out, &response_bytes, &self.auth_key) {
                    return Err(SessionError::ProtocolViolation(
                        "auth-response did not match outstanding challenge".into(),
                    ));
                }
                self.outbound_authenticated = true;
                Ok(vec![TransportFrame::AuthSuccess])
            }
            TransportFrame::AuthSuccess => {
                self.inbound_authenticated = true;
                Ok(vec![])
            }
            other => Err(SessionError::ProtocolViolation(format!(
                "unexpected frame before authentication: {other:?}"
            ))),
        }
    }
}

fn decode_challenge(encoded: &str) -> Result<[u8; 32], SessionError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| SessionError::ProtocolViolation("malformed challenge encoding".into()))?;
    bytes
        .try_into()
        .map_err(|_| SessionError::ProtocolViolation("challenge was not 32 bytes".into()))
}
