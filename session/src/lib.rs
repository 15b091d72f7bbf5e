// session/src/lib.rs
// Peer-side session manager: rendezvous interaction, transport lifecycle,
// mutual authentication, and CRDT update exchange (spec §4.3, §5).

mod auth;
mod config;
mod crdt;
mod error;
mod rendezvous_client;
mod session;
mod status;
mod transport;

pub use config::SessionConfig;
pub use crdt::{CrdtChange, CrdtDocument, InMemorySetDocument};
pub use error::SessionError;
pub use rendezvous_client::{RelayEvent, RendezvousClient};
pub use session::RoomSession;
pub use status::{SessionEvent, SessionStatus};
pub use transport::{
    InMemoryNegotiator, InMemoryTransport, NegotiationContext, PeerTransport, SignalingChannel,
    TransportNegotiator, TransportState,
};

pub use room_protocol::ids::{PeerId, RoomId, ShareCode};
