// rendezvous/src/presence.rs
// Presence records: `room/<RoomId>/peer/<PeerId>`, refreshed by `announce`,
// auto-expiring after `peer_ttl_s` of silence.

use tokio::time::Duration;

use room_protocol::http::PeerEntry;
use room_protocol::ids::{PeerId, RoomId};

use crate::store::ExpiringStore;

#[derive(Debug, Clone)]
struct PresenceRecord {
    room_id: RoomId,
    peer_id: PeerId,
    sdp_offer: Option<String>,
    ice_candidates: Option<Vec<String>>,
    last_seen_ms: u64,
}

pub struct PresenceStore {
    entries: ExpiringStore<(RoomId, PeerId), PresenceRecord>,
    ttl: Duration,
}

impl PresenceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: ExpiringStore::new(),
            ttl,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Overwrite the presence record for `(room_id, peer_id)`, resetting
    /// its TTL. Idempotent: repeated announces from the same peer just
    /// refresh `last_seen_ms`.
    pub async fn announce(
        &self,
        room_id: RoomId,
        peer_id: PeerId,
        sdp_offer: Option<String>,
        ice_candidates: Option<Vec<String>>,
        now_ms: u64,
    ) {
        self.entries
            .insert(
                (room_id, peer_id),
                PresenceRecord {
                    room_id,
                    peer_id,
                    sdp_offer,
                    ice_candidates,
                    last_seen_ms: now_ms,
                },
                self.ttl,
            )
            .await;
    }

    /// Live presence records for `room_id`. Expired records never appear,
    /// independent of whether a background sweep has run.
    pub async fn list(&self, room_id: RoomId) -> Vec<PeerEntry> {
        self.entries
            .values_live()
            .await
            .into_iter()
            .filter(|r| r.room_id == room_id)
            .map(|r| PeerEntry {
                peer_id: r.peer_id,
                sdp_offer: r.sdp_offer,
                ice_candidates: r.ice_candidates,
                last_seen: r.last_seen_ms,
            })
            .collect()
    }

    pub async fn sweep_expired(&self) {
        self.entries.sweep_expired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn announce_then_list_returns_the_peer() {
        let store = PresenceStore::new(Duration::from_secs(120));
        let room = RoomId::generate();
        let peer = PeerId::generate();

        store.announce(room, peer, Some("offer".into()), None, 1_000).await;

        let peers = store.list(room).await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, peer);
        assert_eq!(peers[0].sdp_offer.as_deref(), Some("offer"));
    }

    #[tokio::test(start_paused = true)]
    async fn list_is_scoped_to_one_room() {
        let store = PresenceStore::new(Duration::from_secs(120));
        let room_a = RoomId::generate();
        let room_b = RoomId::generate();
        let peer = PeerId::generate();

        store.announce(room_a, peer, None, None, 0).await;

        assert_eq!(store.list(room_a).await.len(), 1);
        assert!(store.list(room_b).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn re_announce_is_idempotent_and_refreshes_ttl() {
        let store = PresenceStore::new(Duration::from_secs(120));
        let room = RoomId::generate();
        let peer = PeerId::generate();

        store.announce(room, peer, None, None, 0).await;
        tokio::time::advance(Duration::from_secs(100)).await;
        store.announce(room, peer, None, None, 100_000).await;
        tokio::time::advance(Duration::from_secs(100)).await;

        let peers = store.list(room).await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].last_seen, 100_000);
    }

    #[tokio::test(start_paused = true)]
    async fn disappears_after_ttl_plus_slack() {
        let store = PresenceStore::new(Duration::from_secs(120));
        let room = RoomId::generate();
        let peer = PeerId::generate();

        store.announce(room, peer, None, None, 0).await;
        tokio::time::advance(Duration::from_secs(121)).await;

        assert!(store.list(room).await.is_empty());
    }
}
