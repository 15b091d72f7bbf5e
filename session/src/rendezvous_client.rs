// session/src/rendezvous_client.rs
// The peer side of the HTTP surface and signaling relay in spec §6. Every
// call respects `SessionConfig::request_deadline`; failures are mapped
// onto the spec §7 taxonomy so the rest of the session manager never
// touches an HTTP status code directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use room_protocol::http::{
    AnnounceRequest, AnnounceResponse, CreateInviteRequest, CreateInviteResponse, ErrorResponse,
    JoinResponse, ListPeersResponse, PeerEntry,
};
use room_protocol::ids::{PeerId, RoomId};

use crate::error::SessionError;
use crate::transport::SignalingChannel;

pub struct RendezvousClient {
    http: reqwest::Client,
    base_url: String,
}

impl RendezvousClient {
    pub fn new(base_url: impl Into<String>, request_deadline: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_deadline)
            .build()
            .expect("reqwest client builds with a finite timeout");
        Self { http, base_url: base_url.into() }
    }

    pub async fn create_invite(&self, room_id: RoomId) -> Result<(String, u64), SessionError> {
        let response = self
            .http
            .post(format!("{}/invite", self.base_url))
            .json(&CreateInviteRequest { room_id })
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: CreateInviteResponse = parse_response(response).await?;
        Ok((body.code, body.expires_in))
    }

    pub async fn join(&self, code: &str) -> Result<RoomId, SessionError> {
        let response = self
            .http
            .post(format!("{}/join/{code}", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: JoinResponse = parse_response(response).await?;
        Ok(body.room_id)
    }

    pub async fn announce(
        &self,
        room_id: RoomId,
        peer_id: PeerId,
        sdp_offer: Option<String>,
        ice_candidates: Option<Vec<String>>,
    ) -> Result<u64, SessionError> {
        let response = self
            .http
            .post(format!("{}/room/{room_id}/announce", self.base_url))
            .json(&AnnounceRequest { peer_id, sdp_offer, ice_candidates })
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: AnnounceResponse = parse_response(response).await?;
        Ok(body.expires_in)
    }

    pub async fn list_peers(&self, room_id: RoomId) -> Result<Vec<PeerEntry>, SessionError> {
        let response = self
            .http
            .get(format!("{}/room/{room_id}/peers", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: ListPeersResponse = parse_response(response).await?;
        Ok(body.peers)
    }

    /// Upgrade to the signaling relay for `room_id`. Returns a sender
    /// handle (cheaply cloneable, usable as a `SignalingChannel`) and a
    /// reader the caller drives in its own read loop.
    pub async fn connect_relay(&self, room_id: RoomId) -> Result<(RelaySender, RelayReader), SessionError> {
        let ws_url = self
            .base_url
            .replacen("http", "ws", 1)
            .to_string();
        let url = format!("{ws_url}/room/{room_id}/signal");
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SessionError::Transient(format!("relay connect failed: {e}")))?;
        let (sink, source) = stream.split();
        let sender = RelaySender { sink: Arc::new(Mutex::new(sink)) };
        let reader = RelayReader { source, self_peer_id: None };
        Ok((sender, reader))
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, SessionError> {
    let status = response.status();
    if status.is_success() {
        response.json::<T>().await.map_err(|e| SessionError::Transient(e.to_string()))
    } else {
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| status.to_string());
        Err(map_status_error(status, message))
    }
}

fn map_status_error(status: StatusCode, message: String) -> SessionError {
    match status {
        StatusCode::BAD_REQUEST => SessionError::InvalidArgument(message),
        StatusCode::NOT_FOUND => SessionError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => SessionError::RateLimited,
        _ => SessionError::Transient(message),
    }
}

fn map_transport_error(error: reqwest::Error) -> SessionError {
    SessionError::Transient(error.to_string())
}

/// Events the relay can deliver, typed from the raw JSON frames in
/// `room_protocol::relay`.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Peers { peers: Vec<PeerId>, you: PeerId },
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    /// A frame forwarded from another peer, opaque to the relay client —
    /// the session manager decodes it as a `TransportFrame` or a
    /// negotiation message depending on context.
    Forwarded { from: PeerId, payload: Value },
}

/// The write half of a relay connection. Cheaply cloneable; shared between
/// the session's discovery loop (announcing/routing) and transport
/// negotiators that need to relay signaling messages.
#[derive(Clone)]
pub struct RelaySender {
    sink: Arc<Mutex<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>>>,
}

impl RelaySender {
    pub async fn send_frame(&self, to: PeerId, mut payload: Value) -> Result<(), SessionError> {
        if let Value::Object(ref mut map) = payload {
            map.insert("to".to_string(), Value::String(to.to_string()));
        }
        let text = payload.to_string();
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| SessionError::Transient(format!("relay send failed: {e}")))
    }
}

#[async_trait]
impl SignalingChannel for RelaySender {
    async fn send_to(&self, to: PeerId, payload: Value) -> Result<(), SessionError> {
        self.send_frame(to, payload).await
    }
}

/// The read half. Not cloneable — exactly one task drives it, matching the
/// "single logical task" model in spec §5.
pub struct RelayReader {
    source: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    self_peer_id: Option<PeerId>,
}

impl RelayReader {
    pub fn self_peer_id(&self) -> Option<PeerId> {
        self.self_peer_id
    }

    /// Read the next relay event, or `None` once the connection is
    /// closed. Frames that aren't valid JSON, or that lack a recognizable
    /// shape, are silently dropped (matching the relay's own "malformed
    /// frames are dropped" rule) rather than surfaced as an error — a
    /// stray frame on this channel is not this session's fault.
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        loop {
            let message = self.source.next().await?;
            let Ok(message) = message else { return None };
            let WsMessage::Text(text) = message else { continue };
            let Ok(value) = serde_json::from_str::<Value>(&text) else { continue };

            match value.get("type").and_then(Value::as_str) {
                Some("peers") => {
                    let you: PeerId = match value.get("you").and_then(Value::as_str).and_then(|s| s.parse().ok()) {
                        Some(id) => id,
                        None => continue,
                    };
                    self.self_peer_id = Some(you);
                    let peers = value
                        .get("peers")
                        .and_then(Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| v.as_str()?.parse().ok()).collect())
                        .unwrap_or_default();
                    return Some(RelayEvent::Peers { peers, you });
                }
                Some("peer-joined") => {
                    if let Some(id) = parse_peer_field(&value, "peerId") {
                        return Some(RelayEvent::PeerJoined(id));
                    }
                }
                Some("peer-left") => {
                    if let Some(id) = parse_peer_field(&value, "peerId") {
                        return Some(RelayEvent::PeerLeft(id));
                    }
                }
                _ => {
                    if let Some(from) = parse_peer_field(&value, "from") {
                        return Some(RelayEvent::Forwarded { from, payload: value });
                    }
                    // No `from` and not a recognized server frame: drop.
                }
            }
        }
    }
}

fn parse_peer_field(value: &Value, field: &str) -> Option<PeerId> {
    value.get(field).and_then(Value::as_str).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert!(matches!(
            map_status_error(StatusCode::BAD_REQUEST, "x".into()),
            SessionError::InvalidArgument(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::NOT_FOUND, "x".into()),
            SessionError::NotFound(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, "x".into()),
            SessionError::RateLimited
        ));
        assert!(matches!(
            map_status_error(StatusCode::SERVICE_UNAVAILABLE, "x".into()),
            SessionError::Transient(_)
        ));
    }
}
