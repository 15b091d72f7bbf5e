// rendezvous/tests/http_flow.rs
// Exercises the rendezvous server through its real `Router`, over the REST
// surface's actual JSON wire format, rather than calling handlers directly
// (that's what the `#[cfg(test)]` modules alongside the handlers already
// cover). These correspond to spec §8 scenarios 1 (invite and join), 2
// (code expiry), and 6 (rate limit).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use room_rendezvous::{build_router, AppState, RendezvousConfig};

fn test_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), 51000)
}

fn get(path: &str) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(path).body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(test_addr()));
    req
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(test_addr()));
    req
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(start_paused = true)]
async fn invite_join_announce_and_list_round_trip() {
    let app = build_router(AppState::new(RendezvousConfig::for_tests()));

    let room_id = uuid::Uuid::new_v4().to_string();
    let invite_response = app
        .clone()
        .oneshot(post_json("/invite", json!({ "roomId": room_id })))
        .await
        .unwrap();
    assert_eq!(invite_response.status(), StatusCode::OK);
    let invite = json_body(invite_response).await;
    let code = invite["code"].as_str().unwrap().to_string();

    let join_response = app.clone().oneshot(post_json(&format!("/join/{code}"), json!({}))).await.unwrap();
    assert_eq!(join_response.status(), StatusCode::OK);
    let joined = json_body(join_response).await;
    assert_eq!(joined["roomId"], room_id);

    // A second redemption of the same code fails: at-most-once.
    let second_join = app.clone().oneshot(post_json(&format!("/join/{code}"), json!({}))).await.unwrap();
    assert_eq!(second_join.status(), StatusCode::NOT_FOUND);

    let peer_id = uuid::Uuid::new_v4().to_string();
    let announce_response = app
        .clone()
        .oneshot(post_json(
            &format!("/room/{room_id}/announce"),
            json!({ "peerId": peer_id }),
        ))
        .await
        .unwrap();
    assert_eq!(announce_response.status(), StatusCode::OK);

    let peers_response = app.clone().oneshot(get(&format!("/room/{room_id}/peers"))).await.unwrap();
    assert_eq!(peers_response.status(), StatusCode::OK);
    let peers = json_body(peers_response).await;
    assert_eq!(peers["count"], 1);
    assert_eq!(peers["peers"][0]["peerId"], peer_id);
}

#[tokio::test(start_paused = true)]
async fn share_code_expires_after_its_ttl() {
    let app = build_router(AppState::new(RendezvousConfig::for_tests()));
    let room_id = uuid::Uuid::new_v4().to_string();

    let invite = json_body(
        app.clone()
            .oneshot(post_json("/invite", json!({ "roomId": room_id })))
            .await
            .unwrap(),
    )
    .await;
    let code = invite["code"].as_str().unwrap().to_string();

    tokio::time::advance(std::time::Duration::from_secs(
        room_protocol::config::DEFAULT_SHARE_CODE_TTL_SECS + 1,
    ))
    .await;

    let join_response = app.oneshot(post_json(&format!("/join/{code}"), json!({}))).await.unwrap();
    assert_eq!(join_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn exceeding_the_per_ip_budget_yields_429() {
    let mut config = RendezvousConfig::for_tests();
    config.max_requests_per_ip_per_minute = 3;
    let app = build_router(AppState::new(config));
    let room_id = uuid::Uuid::new_v4().to_string();

    for _ in 0..3 {
        let response = app.clone().oneshot(get(&format!("/room/{room_id}/peers"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let fourth = app.clone().oneshot(get(&format!("/room/{room_id}/peers"))).await.unwrap();
    assert_eq!(fourth.status(), StatusCode::TOO_MANY_REQUESTS);

    // /health is exempt from the per-IP budget.
    let health = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
