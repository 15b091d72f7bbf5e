// rendezvous/src/relay.rs
// The signaling relay: `GET /room/<uuid>/signal` upgrades to a WebSocket
// and becomes a per-room broadcast/unicast hub. Per spec §4.2 and §5, a
// room is the unit of serialization — this module holds one peer map per
// room and every register/route/unregister against it happens under that
// room's lock, so messages from different senders in the same room are
// never reordered relative to how the relay observed them.
//
// State machine per connection: `Accepted -> Registered(peer_id) -> Open
// -> Closed`. The relay never originates a frame other than `peers`,
// `peer-joined`, `peer-left` (`ServerFrame` in `room_protocol::relay`) —
// everything else is a client frame forwarded verbatim with `from` merged
// in.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::response::IntoResponse;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use room_protocol::ids::{PeerId, RoomId};
use room_protocol::relay::{attach_sender, ServerFrame};

use crate::error::RendezvousError;
use crate::AppState;

type FrameTx = mpsc::UnboundedSender<Value>;

#[derive(Default)]
struct RoomRelay {
    peers: HashMap<PeerId, FrameTx>,
}

/// Tracks every room's peer set and enforces a per-IP simultaneous
/// connection ceiling (the relay is metered by connection count, not by
/// request, per spec §4.2).
pub struct RelayRegistry {
    rooms: Mutex<HashMap<RoomId, RoomRelay>>,
    connections_per_ip: Mutex<HashMap<IpAddr, u32>>,
    max_per_ip: u32,
}

impl RelayRegistry {
    pub fn new(max_per_ip: u32) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            connections_per_ip: Mutex::new(HashMap::new()),
            max_per_ip,
        }
    }

    async fn try_reserve(&self, ip: IpAddr) -> bool {
        let mut guard = self.connections_per_ip.lock().await;
        let count = guard.entry(ip).or_insert(0);
        if *count >= self.max_per_ip {
            return false;
        }
        *count += 1;
        true
    }

    async fn release(&self, ip: IpAddr) {
        let mut guard = self.connections_per_ip.lock().await;
        if let Some(count) = guard.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                guard.remove(&ip);
            }
        }
    }

    /// Register a freshly-connected peer. Returns the peer ids already
    /// present (for the `peers` frame) and broadcasts `peer-joined` to
    /// them, all under one lock acquisition so no third peer can join or
    /// leave mid-announcement.
    async fn register(&self, room_id: RoomId, peer_id: PeerId, tx: FrameTx) -> Vec<PeerId> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id).or_default();
        let existing: Vec<PeerId> = room.peers.keys().copied().collect();

        let joined = ServerFrame::PeerJoined { peer_id };
        broadcast(room, serde_json::to_value(&joined).expect("serializable"));

        room.peers.insert(peer_id, tx);
        existing
    }

    async fn unregister(&self, room_id: RoomId, peer_id: PeerId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get_mut(&room_id) {
            room.peers.remove(&peer_id);
            let left = ServerFrame::PeerLeft { peer_id };
            broadcast(room, serde_json::to_value(&left).expect("serializable"));
            if room.peers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Route `frame` to `to` within `room_id`. Frames addressed to a peer
    /// the relay doesn't know about are silently dropped, matching the
    /// "malformed frames are silently dropped" rule for unroutable `to`.
    async fn route(&self, room_id: RoomId, to: PeerId, frame: Value) {
        let rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(&room_id) {
            if let Some(tx) = room.peers.get(&to) {
                let _ = tx.send(frame);
            }
        }
    }
}

fn broadcast(room: &RoomRelay, frame: Value) {
    for tx in room.peers.values() {
        let _ = tx.send(frame.clone());
    }
}

/// `GET /room/<uuid>/signal` — upgrade to the relay WebSocket.
pub async fn handle_signal(
    Path(room_id): Path<RoomId>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !state.relay.try_reserve(addr.ip()).await {
        return RendezvousError::RateLimited.into_response();
    }
    ws.on_upgrade(move |socket| drive_connection(socket, room_id, state, addr.ip()))
}

/// Drives one relay connection from `Accepted` through `Closed`.
async fn drive_connection(mut socket: WebSocket, room_id: RoomId, state: AppState, ip: IpAddr) {
    let peer_id = PeerId::generate();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    // Registered: announce existing peers to the joiner and the joiner to
    // everyone else, then send the `peers` frame.
    let existing = state.relay.register(room_id, peer_id, tx).await;
    let peers_frame = ServerFrame::Peers { peers: existing, you: peer_id };
    if send_frame(&mut socket, &peers_frame_value(&peers_frame)).await.is_err() {
        state.relay.unregister(room_id, peer_id).await;
        state.relay.release(ip).await;
        return;
    }

    tracing::debug!(%room_id, %peer_id, "relay connection registered");

    // Open: relay frames in both directions until the socket closes.
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_frame(&state, room_id, peer_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry no routing information; ignore.
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Closed.
    state.relay.unregister(room_id, peer_id).await;
    state.relay.release(ip).await;
    tracing::debug!(%room_id, %peer_id, "relay connection closed");
}

async fn handle_inbound_frame(state: &AppState, room_id: RoomId, from: PeerId, text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return; // malformed JSON: silently dropped, per spec §4.2.
    };
    let Some(to_str) = value.get("to").and_then(Value::as_str) else {
        return; // no `to` field: silently dropped.
    };
    let Ok(to) = to_str.parse::<PeerId>() else {
        return;
    };

    let mut payload = value;
    if let Value::Object(ref mut map) = payload {
        map.remove("to");
    }
    let routed = attach_sender(from, payload);
    state.relay.route(room_id, to, routed).await;
}

fn peers_frame_value(frame: &ServerFrame) -> Value {
    serde_json::to_value(frame).expect("ServerFrame always serializes")
}

async fn send_frame(socket: &mut WebSocket, frame: &Value) -> Result<(), axum::Error> {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_returns_existing_peers_and_broadcasts_join() {
        let registry = RelayRegistry::new(10);
        let room = RoomId::generate();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let peer_a = PeerId::generate();
        let existing_for_a = registry.register(room, peer_a, tx_a).await;
        assert!(existing_for_a.is_empty());

        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let peer_b = PeerId::generate();
        let existing_for_b = registry.register(room, peer_b, tx_b).await;
        assert_eq!(existing_for_b, vec![peer_a]);

        let joined = rx_a.recv().await.unwrap();
        assert_eq!(joined["type"], "peer-joined");
        assert_eq!(joined["peerId"], peer_b.to_string());
    }

    #[tokio::test]
    async fn unregister_broadcasts_peer_left() {
        let registry = RelayRegistry::new(10);
        let room = RoomId::generate();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let peer_a = PeerId::generate();
        registry.register(room, peer_a, tx_a).await;

        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let peer_b = PeerId::generate();
        registry.register(room, peer_b, tx_b).await;
        let _ = rx_a.recv().await; // drain peer-joined

        registry.unregister(room, peer_b).await;
        let left = rx_a.recv().await.unwrap();
        assert_eq!(left["type"], "peer-left");
        assert_eq!(left["peerId"], peer_b.to_string());
    }

    #[tokio::test]
    async fn route_delivers_only_to_addressed_peer() {
        let registry = RelayRegistry::new(10);
        let room = RoomId::generate();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let peer_a = PeerId::generate();
        registry.register(room, peer_a, tx_a).await;

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let peer_b = PeerId::generate();
        registry.register(room, peer_b, tx_b).await;
        let _ = rx_a.recv().await; // drain peer-joined

        let frame = attach_sender(peer_b, serde_json::json!({"type": "auth-challenge"}));
        registry.route(room, peer_a, frame).await;

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received["from"], peer_b.to_string());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn route_to_unknown_peer_is_dropped_silently() {
        let registry = RelayRegistry::new(10);
        let room = RoomId::generate();
        registry.route(room, PeerId::generate(), serde_json::json!({})).await;
        // No panic, no observable effect — success is the absence of a crash.
    }

    #[tokio::test]
    async fn connection_reservation_respects_ip_ceiling() {
        let registry = RelayRegistry::new(1);
        let ip = IpAddr::from([127, 0, 0, 1]);
        assert!(registry.try_reserve(ip).await);
        assert!(!registry.try_reserve(ip).await);
        registry.release(ip).await;
        assert!(registry.try_reserve(ip).await);
    }
}
