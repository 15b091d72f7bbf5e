// protocol/src/lib.rs
// Shared identifiers, wire formats, and configuration defaults used by both
// the rendezvous server and the session manager. No networking, no crypto
// policy decisions beyond sharecode formatting — just the shapes both
// sides need to agree on.

pub mod config;
pub mod http;
pub mod ids;
pub mod relay;
pub mod transport;

pub use ids::{PeerId, RoomId, ShareCode};
