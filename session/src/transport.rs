// session/src/transport.rs
// The ordered, reliable datagram channel between two peers once WebRTC
// establishment has completed (spec §1, §6). The actual ICE/DTLS/SCTP
// state machine is a named external collaborator this crate drives, not
// one it implements — `PeerTransport` is the seam.
//
// Production note: a real implementation backs `PeerTransport` with a
// WebRTC data channel (e.g. the `webrtc` crate's `RTCDataChannel`,
// configured ordered+reliable per spec §5), with SDP offer/answer and ICE
// candidates carried over the `SignalingChannel` passed into
// `TransportNegotiator::negotiate`. `InMemoryNegotiator` below is the
// fully-worked fake this repository ships instead: it pairs two
// in-process `negotiate` calls directly, with no real network path, and
// is what the test suite and `demo-peer` binary run against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};

use room_protocol::ids::{PeerId, RoomId};
use room_protocol::transport::TransportFrame;

use crate::error::SessionError;

/// State of one remote peer's transport record, per spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Negotiating,
    Open,
    Closed,
}

/// The open channel abstraction. Implementations only need to move
/// `TransportFrame`s; everything above this (auth, CRDT exchange) is
/// transport-agnostic.
#[async_trait]
pub trait PeerTransport: Send {
    async fn send(&mut self, frame: TransportFrame) -> Result<(), SessionError>;

    /// Returns `None` once the channel is closed (by either side or by
    /// error) — callers must stop reading after the first `None`.
    async fn recv(&mut self) -> Option<TransportFrame>;

    async fn close(&mut self);
}

/// Opaque frames a `TransportNegotiator` may need to relay to its peer
/// during negotiation (SDP offers/answers, ICE candidates) before a
/// `PeerTransport` exists to carry anything over. A production negotiator
/// uses this; `InMemoryNegotiator` does not need it at all.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn send_to(&self, to: PeerId, payload: serde_json::Value) -> Result<(), SessionError>;
}

pub struct NegotiationContext {
    pub room_id: RoomId,
    pub local_peer_id: PeerId,
    pub remote_peer_id: PeerId,
    /// Per spec §9's glare-avoidance note: the lower `PeerId` initiates.
    pub is_offerer: bool,
    pub signaling: Arc<dyn SignalingChannel>,
    /// Signaling frames the relay forwarded from `remote_peer_id`, routed
    /// here by the session driver for the duration of negotiation. Unused
    /// by `InMemoryNegotiator`; a production negotiator reads SDP
    /// answers/ICE candidates off this.
    pub inbox: mpsc::UnboundedReceiver<serde_json::Value>,
}

/// Drives WebRTC establishment (or a fake standing in for it) and hands
/// back an open transport. The caller applies the negotiation-budget
/// deadline (spec §5) with `tokio::time::timeout`; a negotiator
/// implementation does not need to enforce its own deadline.
#[async_trait]
pub trait TransportNegotiator: Send + Sync {
    async fn negotiate(&self, ctx: NegotiationContext) -> Result<Box<dyn PeerTransport>, SessionError>;
}

type Link = (mpsc::UnboundedSender<TransportFrame>, mpsc::UnboundedReceiver<TransportFrame>);

/// A `PeerTransport` backed by a pair of in-process channels. No real
/// networking — this is the in-memory fake named in the production note
/// above.
pub struct InMemoryTransport {
    tx: mpsc::UnboundedSender<TransportFrame>,
    rx: mpsc::UnboundedReceiver<TransportFrame>,
}

#[async_trait]
impl PeerTransport for InMemoryTransport {
    async fn send(&mut self, frame: TransportFrame) -> Result<(), SessionError> {
        self.tx
            .send(frame)
            .map_err(|_| SessionError::Transient("in-memory transport peer gone".into()))
    }

    async fn recv(&mut self) -> Option<TransportFrame> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Pairs up two in-process `negotiate` calls for the same unordered peer
/// pair within a room. The first caller blocks on a oneshot until the
/// second arrives; the second caller wires both ends immediately. Neither
/// caller's `is_offerer` flag affects pairing — it's passed through for a
/// production negotiator to use for SDP glare avoidance, but the in-memory
/// fake doesn't need it.
#[derive(Default)]
pub struct InMemoryNegotiator {
    pending: Mutex<HashMap<(RoomId, PeerId, PeerId), oneshot::Sender<Link>>>,
}

impl InMemoryNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(room_id: RoomId, a: PeerId, b: PeerId) -> (RoomId, PeerId, PeerId) {
        if a.to_string() <= b.to_string() {
            (room_id, a, b)
        } else {
            (room_id, b, a)
        }
    }
}

#[async_trait]
impl TransportNegotiator for InMemoryNegotiator {
    async fn negotiate(&self, ctx: NegotiationContext) -> Result<Box<dyn PeerTransport>, SessionError> {
        let key = Self::key(ctx.room_id, ctx.local_peer_id, ctx.remote_peer_id);
        let mut pending = self.pending.lock().await;

        if let Some(waiting) = pending.remove(&key) {
            // We're the second arrival: build both directions and hand the
            // first caller its end.
            let (tx_to_first, rx_from_second) = mpsc::unbounded_channel();
            let (tx_to_second, rx_from_first) = mpsc::unbounded_channel();
            let _ = waiting.send((tx_to_first, rx_from_first));
            return Ok(Box::new(InMemoryTransport { tx: tx_to_second, rx: rx_from_second }));
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(key, tx);
        drop(pending);

        let (send, recv) = rx
            .await
            .map_err(|_| SessionError::Transient("negotiation peer never arrived".into()))?;
        Ok(Box::new(InMemoryTransport { tx: send, rx: recv }))
    }
}
