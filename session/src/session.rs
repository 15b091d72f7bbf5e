// session/src/session.rs
// The top-level `RoomSession` state machine from spec §4.3/§5: one
// authoritative driver task owns the relay connection, the announce/poll
// timers, and the table of per-peer transports; each transport gets its own
// task that only reports back (`DriverEvent`) rather than being reached into
// from outside, matching the "single logical task with bounded concurrent
// helpers" framing in spec §5.
//
// Design note (not in the base spec, resolved here): the relay allocates its
// own server-side `PeerId` per connection (spec §4.2) while `announce`
// accepts a client-supplied one (spec §6). Rather than carry two identifier
// spaces with no wire mechanism to reconcile them, this session adopts the
// relay's assigned id as its own for the lifetime of that relay connection,
// including the identifier it announces presence under. A relay reconnect
// after a drop (Open Question (b)) picks up a new id; already-authenticated
// transports are unaffected since they're keyed by the id learned at
// negotiation time, not by the live relay connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, warn};

use room_crypto::{derive_key, Purpose};
use room_protocol::ids::{PeerId, RoomId};
use room_protocol::transport::TransportFrame;

use crate::auth::AuthHandshake;
use crate::config::SessionConfig;
use crate::crdt::{CrdtChange, CrdtDocument};
use crate::error::SessionError;
use crate::rendezvous_client::{RelayEvent, RelayReader, RelaySender, RendezvousClient};
use crate::status::{SessionEvent, SessionStatus};
use crate::transport::{NegotiationContext, PeerTransport, TransportNegotiator};

enum ControlMsg {
    Stop,
    ApplyLocalChange(Vec<u8>),
}

enum DriverEvent {
    TransportAuthenticated(PeerId),
    TransportClosed(PeerId),
}

/// Handle to a running (or not-yet-started) room session. Cloneable; the
/// driver itself lives in a spawned task reached only through the control
/// channel, matching spec §5's "no shared mutable state reached into from
/// outside the owning task" framing.
#[derive(Clone)]
pub struct RoomSession {
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl RoomSession {
    /// Start a session for `room_id`, authenticating transports with
    /// `password` and merging CRDT traffic into `document`. Returns the
    /// handle plus the event channel the embedding application drains.
    pub fn start(
        config: SessionConfig,
        room_id: RoomId,
        password: Vec<u8>,
        document: Box<dyn CrdtDocument>,
        negotiator: Arc<dyn TransportNegotiator>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            config,
            room_id,
            password,
            document: Arc::new(Mutex::new(document)),
            negotiator,
            control_rx,
            status_tx,
            events_tx,
        };
        tokio::spawn(driver.run());

        (Self { control_tx, status_rx }, events_rx)
    }

    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Apply a local mutation and fan it out to every authenticated peer.
    /// Fire-and-forget: delivery is best-effort per spec §5, and there is no
    /// synchronous acknowledgement from the driver task.
    pub fn apply_local_change(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.control_tx
            .send(ControlMsg::ApplyLocalChange(bytes))
            .map_err(|_| SessionError::Fatal("session driver has already stopped".into()))
    }

    /// Stop the session. Existing transports are closed; the relay
    /// connection is dropped. Idempotent with an already-stopped session.
    pub fn stop(&self) {
        let _ = self.control_tx.send(ControlMsg::Stop);
    }
}

struct Driver {
    config: SessionConfig,
    room_id: RoomId,
    password: Vec<u8>,
    document: Arc<Mutex<Box<dyn CrdtDocument>>>,
    negotiator: Arc<dyn TransportNegotiator>,
    control_rx: mpsc::UnboundedReceiver<ControlMsg>,
    status_tx: watch::Sender<SessionStatus>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

struct TransportRecord {
    authenticated: bool,
}

impl Driver {
    fn set_status(&self, status: SessionStatus) {
        let _ = self.events_tx.send(SessionEvent::StatusChanged(status.clone()));
        let _ = self.status_tx.send(status);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    async fn run(mut self) {
        self.set_status(SessionStatus::Connecting);

        // PBKDF2 at 100k iterations costs on the order of 100ms; offloaded to
        // a blocking thread per spec §5's suspension-point note so it never
        // stalls the driver's event loop.
        let password = self.password.clone();
        let salt = self.room_id.as_hyphenated();
        let auth_key = match tokio::task::spawn_blocking(move || derive_key(&password, &salt, Purpose::Auth)).await {
            Ok(Ok(key)) => key,
            Ok(Err(_)) | Err(_) => {
                self.set_status(SessionStatus::Error { message: "failed to derive auth key".into() });
                return;
            }
        };

        let rendezvous = RendezvousClient::new(self.config.rendezvous_base_url.clone(), self.config.request_deadline);

        let (mut relay_sender, mut relay_reader) = match self.connect_relay(&rendezvous).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_status(SessionStatus::Error { message: format!("relay connect failed: {e}") });
                return;
            }
        };

        let (peers, self_peer_id) = match Self::await_peers_frame(&mut relay_reader).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_status(SessionStatus::Error { message: format!("relay handshake failed: {e}") });
                return;
            }
        };

        if let Err(e) = Self::announce_with_retries(&rendezvous, self.room_id, self_peer_id).await {
            self.set_status(SessionStatus::Error { message: format!("initial announce failed: {e}") });
            return;
        }

        self.set_status(SessionStatus::Syncing);
        info!(room = %self.room_id, peer = %self_peer_id, "session syncing");

        let mut transports: HashMap<PeerId, TransportRecord> = HashMap::new();
        let mut signaling_inboxes: HashMap<PeerId, mpsc::UnboundedSender<serde_json::Value>> = HashMap::new();
        let (driver_events_tx, mut driver_events_rx) = mpsc::unbounded_channel::<(PeerId, DriverEvent)>();
        let (changes_tx, _) = broadcast::channel::<CrdtChange>(256);

        for peer in peers.into_iter().filter(|id| *id != self_peer_id) {
            self.spawn_transport_if_needed(
                peer, self_peer_id, &auth_key, &negotiator_ctx_signaling(&relay_sender),
                &mut transports, &mut signaling_inboxes, &driver_events_tx, &changes_tx,
            );
        }

        let mut self_peer_id = self_peer_id;
        let mut consecutive_rate_limited: u32 = 0;
        let mut paused_until: Option<Instant> = None;

        let mut announce_ticker = interval(self.config.announce_interval);
        announce_ticker.tick().await; // consume the immediate first tick; we just announced above
        let mut poll_ticker = interval(self.config.poll_interval);
        poll_ticker.tick().await;

        'driver: loop {
            tokio::select! {
                control = self.control_rx.recv() => {
                    match control {
                        Some(ControlMsg::Stop) | None => break 'driver,
                        Some(ControlMsg::ApplyLocalChange(bytes)) => {
                            self.document.lock().await.merge(&bytes, None);
                            let _ = changes_tx.send(CrdtChange { bytes, origin: None });
                        }
                    }
                }

                event = relay_reader.next_event() => {
                    match event {
                        Some(RelayEvent::PeerJoined(id)) if id != self_peer_id => {
                            self.spawn_transport_if_needed(
                                id, self_peer_id, &auth_key, &negotiator_ctx_signaling(&relay_sender),
                                &mut transports, &mut signaling_inboxes, &driver_events_tx, &changes_tx,
                            );
                        }
                        Some(RelayEvent::PeerJoined(_)) => {}
                        Some(RelayEvent::PeerLeft(id)) => {
                            debug!(peer = %id, "peer left presence, transport (if any) continues independently");
                        }
                        Some(RelayEvent::Peers { .. }) => {
                            // Only sent once, at connect time; ignore repeats.
                        }
                        Some(RelayEvent::Forwarded { from, payload }) => {
                            if let Some(inbox) = signaling_inboxes.get(&from) {
                                let _ = inbox.send(payload);
                            }
                        }
                        None => {
                            warn!("relay connection dropped, reconnecting");
                            match self.reconnect_relay(&rendezvous).await {
                                Some((sender, reader, you)) => {
                                    relay_sender = sender;
                                    relay_reader = reader;
                                    self_peer_id = you;
                                }
                                None => break 'driver, // Stop arrived during backoff.
                            }
                        }
                    }
                }

                Some((peer_id, driver_event)) = driver_events_rx.recv() => {
                    match driver_event {
                        DriverEvent::TransportAuthenticated(_) => {
                            transports.entry(peer_id).or_insert(TransportRecord { authenticated: false }).authenticated = true;
                            signaling_inboxes.remove(&peer_id);
                            self.emit(SessionEvent::PeerConnected(peer_id));
                        }
                        DriverEvent::TransportClosed(_) => {
                            transports.remove(&peer_id);
                            signaling_inboxes.remove(&peer_id);
                            self.emit(SessionEvent::PeerDisconnected(peer_id));
                        }
                    }
                }

                _ = announce_ticker.tick() => {
                    if Self::is_paused(&paused_until) {
                        continue;
                    }
                    match rendezvous.announce(self.room_id, self_peer_id, None, None).await {
                        Ok(_) => consecutive_rate_limited = 0,
                        Err(SessionError::RateLimited) => {
                            consecutive_rate_limited += 1;
                            self.maybe_pause(&mut consecutive_rate_limited, &mut paused_until);
                        }
                        Err(e) => warn!(error = %e, "announce failed, will retry next tick"),
                    }
                }

                _ = poll_ticker.tick() => {
                    if Self::is_paused(&paused_until) {
                        continue;
                    }
                    match rendezvous.list_peers(self.room_id).await {
                        Ok(peers) => {
                            consecutive_rate_limited = 0;
                            for entry in peers {
                                if entry.peer_id == self_peer_id || transports.contains_key(&entry.peer_id) {
                                    continue;
                                }
                                self.spawn_transport_if_needed(
                                    entry.peer_id, self_peer_id, &auth_key, &negotiator_ctx_signaling(&relay_sender),
                                    &mut transports, &mut signaling_inboxes, &driver_events_tx, &changes_tx,
                                );
                            }
                        }
                        Err(SessionError::RateLimited) => {
                            consecutive_rate_limited += 1;
                            self.maybe_pause(&mut consecutive_rate_limited, &mut paused_until);
                        }
                        Err(e) => warn!(error = %e, "poll failed, will retry next tick"),
                    }
                }
            }
        }

        self.set_status(SessionStatus::Idle);
        info!(room = %self.room_id, "session stopped");
    }

    fn is_paused(paused_until: &Option<Instant>) -> bool {
        matches!(paused_until, Some(until) if Instant::now() < *until)
    }

    fn maybe_pause(&self, consecutive: &mut u32, paused_until: &mut Option<Instant>) {
        if *consecutive >= self.config.rate_limit_pause_threshold && paused_until.is_none() {
            *paused_until = Some(Instant::now() + self.config.reconnect_backoff_floor);
            self.emit(SessionEvent::RateLimitPaused);
            *consecutive = 0;
        } else if paused_until.is_some() && !Self::is_paused(paused_until) {
            *paused_until = None;
            self.emit(SessionEvent::RateLimitResumed);
        }
    }

    async fn connect_relay(&self, rendezvous: &RendezvousClient) -> Result<(RelaySender, RelayReader), SessionError> {
        rendezvous.connect_relay(self.room_id).await
    }

    async fn await_peers_frame(reader: &mut RelayReader) -> Result<(Vec<PeerId>, PeerId), SessionError> {
        match reader.next_event().await {
            Some(RelayEvent::Peers { peers, you }) => Ok((peers, you)),
            Some(_) => Err(SessionError::ProtocolViolation("relay did not open with a peers frame".into())),
            None => Err(SessionError::Transient("relay closed before handshake".into())),
        }
    }

    async fn announce_with_retries(rendezvous: &RendezvousClient, room_id: RoomId, peer_id: PeerId) -> Result<(), SessionError> {
        let mut last_err = None;
        for attempt in 0..3 {
            match rendezvous.announce(room_id, peer_id, None, None).await {
                Ok(_) => return Ok(()),
                Err(e @ SessionError::RateLimited) | Err(e @ SessionError::Transient(_)) => {
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| SessionError::Fatal("announce retries exhausted".into())))
    }

    /// Reconnect the relay with jittered exponential backoff (Open Question
    /// (b) resolution: floor/cap from config, not a fixed interval). Stops
    /// early and returns `None` if `Stop` arrives while waiting.
    async fn reconnect_relay(&mut self, rendezvous: &RendezvousClient) -> Option<(RelaySender, RelayReader, PeerId)> {
        let mut attempt: u32 = 0;
        loop {
            let backoff = self.next_backoff(attempt);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                control = self.control_rx.recv() => {
                    if matches!(control, Some(ControlMsg::Stop) | None) {
                        return None;
                    }
                    // An ApplyLocalChange arriving mid-reconnect is dropped
                    // from fan-out (no transports to send to anyway) but
                    // still merged so it isn't lost once we resume.
                    if let Some(ControlMsg::ApplyLocalChange(bytes)) = control {
                        self.document.lock().await.merge(&bytes, None);
                    }
                }
            }

            match self.connect_relay(rendezvous).await {
                Ok((sender, mut reader)) => match Self::await_peers_frame(&mut reader).await {
                    Ok((_, you)) => return Some((sender, reader, you)),
                    Err(_) => attempt += 1,
                },
                Err(_) => attempt += 1,
            }
        }
    }

    fn next_backoff(&self, attempt: u32) -> Duration {
        let floor = self.config.reconnect_backoff_floor.as_millis() as u64;
        let cap = self.config.reconnect_backoff_cap.as_millis() as u64;
        let exp = floor.saturating_mul(1u64 << attempt.min(6)).min(cap);
        let jitter = rand::thread_rng().gen_range(0..=(exp / 5).max(1));
        Duration::from_millis(exp.saturating_sub(exp / 10).saturating_add(jitter))
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_transport_if_needed(
        &self,
        remote_peer_id: PeerId,
        local_peer_id: PeerId,
        auth_key: &room_crypto::DerivedKey,
        signaling: &Arc<dyn crate::transport::SignalingChannel>,
        transports: &mut HashMap<PeerId, TransportRecord>,
        signaling_inboxes: &mut HashMap<PeerId, mpsc::UnboundedSender<serde_json::Value>>,
        driver_events_tx: &mpsc::UnboundedSender<(PeerId, DriverEvent)>,
        changes_tx: &broadcast::Sender<CrdtChange>,
    ) {
        if transports.contains_key(&remote_peer_id) {
            return;
        }
        transports.insert(remote_peer_id, TransportRecord { authenticated: false });

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        signaling_inboxes.insert(remote_peer_id, inbox_tx);

        let ctx = NegotiationContext {
            room_id: self.room_id,
            local_peer_id,
            remote_peer_id,
            is_offerer: local_peer_id.to_string() < remote_peer_id.to_string(),
            signaling: signaling.clone(),
            inbox: inbox_rx,
        };

        let negotiator = self.negotiator.clone();
        let negotiation_budget = self.config.negotiation_budget;
        let auth_response_budget = self.config.auth_response_budget;
        let auth_key = auth_key.clone();
        let document = self.document.clone();
        let changes_rx = changes_tx.subscribe();
        let driver_events_tx = driver_events_tx.clone();

        tokio::spawn(async move {
            let transport = match timeout(negotiation_budget, negotiator.negotiate(ctx)).await {
                Ok(Ok(t)) => t,
                Ok(Err(e)) => {
                    warn!(peer = %remote_peer_id, error = %e, "transport negotiation failed");
                    let _ = driver_events_tx.send((remote_peer_id, DriverEvent::TransportClosed(remote_peer_id)));
                    return;
                }
                Err(_) => {
                    warn!(peer = %remote_peer_id, "transport negotiation timed out");
                    let _ = driver_events_tx.send((remote_peer_id, DriverEvent::TransportClosed(remote_peer_id)));
                    return;
                }
            };

            run_transport(
                remote_peer_id,
                transport,
                auth_key,
                auth_response_budget,
                document,
                changes_rx,
                driver_events_tx,
            )
            .await;
        });
    }
}

/// Wraps the relay's write half as a `SignalingChannel` trait object for
/// `NegotiationContext`. `RelaySender` is cheap to clone (an `Arc<Mutex<_>>`
/// underneath), so this allocation is just the vtable-carrying `Arc` the
/// trait object needs, not a new connection.
fn negotiator_ctx_signaling(sender: &RelaySender) -> Arc<dyn crate::transport::SignalingChannel> {
    Arc::new(sender.clone())
}

/// Drives one peer's transport end to end: the auth handshake, then the
/// CRDT exchange, until the transport closes or a protocol violation occurs.
/// Runs entirely in its own task; the only way it talks back to the driver
/// is `driver_events_tx`.
async fn run_transport(
    peer_id: PeerId,
    mut transport: Box<dyn PeerTransport>,
    auth_key: room_crypto::DerivedKey,
    auth_response_budget: Duration,
    document: Arc<Mutex<Box<dyn CrdtDocument>>>,
    mut changes_rx: broadcast::Receiver<CrdtChange>,
    driver_events_tx: mpsc::UnboundedSender<(PeerId, DriverEvent)>,
) {
    let (mut handshake, challenge_frame) = AuthHandshake::start(auth_key);
    if transport.send(challenge_frame).await.is_err() {
        let _ = driver_events_tx.send((peer_id, DriverEvent::TransportClosed(peer_id)));
        return;
    }

    let auth_result = timeout(auth_response_budget, async {
        while !handshake.is_authenticated() {
            let frame = transport.recv().await.ok_or(SessionError::Transient("transport closed during auth".into()))?;
            for reply in handshake.handle(&frame)? {
                transport.send(reply).await?;
            }
        }
        Ok::<(), SessionError>(())
    })
    .await;

    match auth_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(peer = %peer_id, error = %e, "transport authentication failed");
            transport.close().await;
            let _ = driver_events_tx.send((peer_id, DriverEvent::TransportClosed(peer_id)));
            return;
        }
        Err(_) => {
            warn!(peer = %peer_id, "auth-response deadline expired");
            transport.close().await;
            let _ = driver_events_tx.send((peer_id, DriverEvent::TransportClosed(peer_id)));
            return;
        }
    }

    let _ = driver_events_tx.send((peer_id, DriverEvent::TransportAuthenticated(peer_id)));

    if transport.send(TransportFrame::SyncRequest).await.is_err() {
        let _ = driver_events_tx.send((peer_id, DriverEvent::TransportClosed(peer_id)));
        return;
    }

    loop {
        tokio::select! {
            frame = transport.recv() => {
                match frame {
                    None => break,
                    Some(TransportFrame::SyncRequest) => {
                        let snapshot = document.lock().await.snapshot();
                        if transport.send(TransportFrame::SyncResponse { update: BASE64.encode(snapshot) }).await.is_err() {
                            break;
                        }
                    }
                    Some(TransportFrame::SyncResponse { update }) | Some(TransportFrame::Update { update }) => {
                        if let Ok(bytes) = BASE64.decode(update) {
                            document.lock().await.merge(&bytes, Some(peer_id));
                        }
                    }
                    Some(other) if other.is_auth_frame() => {
                        debug!(peer = %peer_id, "ignoring late auth frame after authentication");
                    }
                    Some(_) => {
                        warn!(peer = %peer_id, "unexpected frame after authentication, closing transport");
                        break;
                    }
                }
            }

            change = changes_rx.recv() => {
                match change {
                    Ok(change) if change.origin != Some(peer_id) => {
                        if transport.send(TransportFrame::Update { update: BASE64.encode(change.bytes) }).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {} // echo back to its own origin, skip
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(peer = %peer_id, skipped, "transport fell behind local change stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    transport.close().await;
    let _ = driver_events_tx.send((peer_id, DriverEvent::TransportClosed(peer_id)));
}
