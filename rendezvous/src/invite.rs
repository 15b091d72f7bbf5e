// rendezvous/src/invite.rs
// The invite store: share code -> room id, single redemption, 300s TTL.

use tokio::time::Duration;

use room_protocol::ids::{RoomId, ShareCode};

use crate::error::RendezvousError;
use crate::store::ExpiringStore;

#[derive(Debug, Clone)]
struct InviteRecord {
    room_id: RoomId,
}

pub struct InviteStore {
    entries: ExpiringStore<String, InviteRecord>,
    ttl: Duration,
}

impl InviteStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: ExpiringStore::new(),
            ttl,
        }
    }

    /// Generate a fresh share code bound to `room_id`. Regenerates on the
    /// rare collision with an unexpired code rather than failing the
    /// caller — collisions are a store detail, not a client-visible error.
    pub async fn create(&self, room_id: RoomId) -> ShareCode {
        loop {
            let code = ShareCode::generate();
            let inserted = self
                .entries
                .insert_if_absent(code.as_str().to_string(), InviteRecord { room_id }, self.ttl)
                .await;
            if inserted {
                return code;
            }
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Atomic read-and-delete. At most one concurrent caller for the same
    /// code observes `Ok`; every other caller (concurrent or subsequent)
    /// observes `NotFound`.
    pub async fn redeem(&self, input: &str) -> Result<RoomId, RendezvousError> {
        let code = ShareCode::parse(input)
            .ok_or_else(|| RendezvousError::InvalidArgument("malformed share code".into()))?;
        self.entries
            .take(&code.as_str().to_string())
            .await
            .map(|record| record.room_id)
            .ok_or_else(|| RendezvousError::NotFound("unknown or expired share code".into()))
    }
}
