// rendezvous/src/handlers.rs
// REST handlers for the bulletin-board surface (spec §6). Every handler is
// a short critical section against the expiring stores in `AppState` —
// there is no cross-handler ordering requirement beyond the atomic
// read-then-delete `InviteStore::redeem` already provides.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use room_protocol::http::{
    AnnounceRequest, AnnounceResponse, CreateInviteRequest, CreateInviteResponse, HealthResponse,
    JoinResponse, ListPeersResponse,
};
use room_protocol::ids::RoomId;

use crate::error::RendezvousError;
use crate::relay::handle_signal;
use crate::AppState;

// Re-exported so `lib.rs`'s router table reads naturally (`handlers::signal`).
pub use handle_signal as signal;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// `POST /invite` — mint a fresh share code bound to `room_id`.
pub async fn create_invite(
    State(state): State<AppState>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<Json<CreateInviteResponse>, RendezvousError> {
    let code = state.invites.create(req.room_id).await;
    Ok(Json(CreateInviteResponse {
        code: code.to_string(),
        expires_in: state.invites.ttl_secs(),
    }))
}

/// `POST /join/<code>` — redeem a share code, at most once.
pub async fn join(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<JoinResponse>, RendezvousError> {
    let room_id = state.invites.redeem(&code).await?;
    Ok(Json(JoinResponse {
        room_id,
        message: "joined".to_string(),
    }))
}

/// `POST /room/<uuid>/announce` — refresh or create a presence record.
pub async fn announce(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(req): Json<AnnounceRequest>,
) -> Result<Json<AnnounceResponse>, RendezvousError> {
    state
        .presence
        .announce(room_id, req.peer_id, req.sdp_offer, req.ice_candidates, now_ms())
        .await;
    Ok(Json(AnnounceResponse {
        success: true,
        expires_in: state.presence.ttl_secs(),
    }))
}

/// `GET /room/<uuid>/peers` — list live presence records.
pub async fn list_peers(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<ListPeersResponse>, RendezvousError> {
    let peers = state.presence.list(room_id).await;
    Ok(Json(ListPeersResponse {
        room_id,
        count: peers.len(),
        peers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RendezvousConfig;

    fn test_state() -> AppState {
        AppState::new(RendezvousConfig::for_tests())
    }

    #[tokio::test]
    async fn invite_then_join_round_trips_room_id() {
        let state = test_state();
        let room_id = RoomId::generate();

        let invite = create_invite(
            State(state.clone()),
            Json(CreateInviteRequest { room_id }),
        )
        .await
        .unwrap();

        let joined = join(State(state), Path(invite.code.clone())).await.unwrap();
        assert_eq!(joined.room_id, room_id);
    }

    #[tokio::test]
    async fn second_join_with_same_code_fails() {
        let state = test_state();
        let room_id = RoomId::generate();
        let invite = create_invite(State(state.clone()), Json(CreateInviteRequest { room_id }))
            .await
            .unwrap();

        assert!(join(State(state.clone()), Path(invite.code.clone())).await.is_ok());
        let second = join(State(state), Path(invite.code.clone())).await;
        assert!(matches!(second, Err(RendezvousError::NotFound(_))));
    }

    #[tokio::test]
    async fn announce_then_list_peers_shows_the_peer() {
        let state = test_state();
        let room_id = RoomId::generate();
        let peer_id = room_protocol::ids::PeerId::generate();

        announce(
            State(state.clone()),
            Path(room_id),
            Json(AnnounceRequest { peer_id, sdp_offer: None, ice_candidates: None }),
        )
        .await
        .unwrap();

        let listed = list_peers(State(state), Path(room_id)).await.unwrap();
        assert_eq!(listed.count, 1);
        assert_eq!(listed.peers[0].peer_id, peer_id);
    }
}
