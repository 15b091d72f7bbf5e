//! Signaling relay frames exchanged over the `/room/<uuid>/signal`
//! WebSocket upgrade. The relay only ever originates `peers`,
//! `peer-joined`, and `peer-left` as typed frames below — a relayed
//! client frame is never one of these. It is the sender's own frame,
//! verbatim, with a `from` field merged in; see [`attach_sender`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::PeerId;

/// Frames the server originates on its own behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "peers")]
    Peers { peers: Vec<PeerId>, you: PeerId },
    #[serde(rename = "peer-joined")]
    PeerJoined { #[serde(rename = "peerId")] peer_id: PeerId },
    #[serde(rename = "peer-left")]
    PeerLeft { #[serde(rename = "peerId")] peer_id: PeerId },
}

/// A frame sent by a client to the relay. `to` determines routing; every
/// other field (including `type`, if the sender set one) is opaque to the
/// server and passed through unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub to: PeerId,
    #[serde(flatten)]
    pub payload: Value,
}

/// Build the frame the recipient actually receives for a relayed message:
/// the sender's original payload, with `from` merged in at the top level.
/// Never routed through [`ServerFrame`] — the relay does not interpret or
/// re-tag a client's frame, only forwards it with provenance attached.
pub fn attach_sender(from: PeerId, mut payload: Value) -> Value {
    if let Value::Object(ref mut map) = payload {
        map.insert("from".to_string(), Value::String(from.to_string()));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_round_trips() {
        let peer = PeerId::generate();
        let json = serde_json::json!({ "to": peer.to_string(), "sdp": "v=0..." });
        let frame: ClientFrame = serde_json::from_value(json).unwrap();
        assert_eq!(frame.to, peer);
        assert_eq!(frame.payload["sdp"], "v=0...");
    }

    #[test]
    fn client_frame_without_to_fails_to_parse() {
        let json = serde_json::json!({ "sdp": "v=0..." });
        let result: Result<ClientFrame, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn peers_frame_serializes_with_tag() {
        let peer = PeerId::generate();
        let frame = ServerFrame::Peers { peers: vec![peer], you: peer };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "peers");
        assert_eq!(json["you"], peer.to_string());
    }

    #[test]
    fn attach_sender_merges_from_without_disturbing_payload() {
        let sender = PeerId::generate();
        let payload = serde_json::json!({ "type": "auth-challenge", "challenge": "YWJj" });
        let out = attach_sender(sender, payload);
        assert_eq!(out["type"], "auth-challenge");
        assert_eq!(out["challenge"], "YWJj");
        assert_eq!(out["from"], sender.to_string());
    }
}
