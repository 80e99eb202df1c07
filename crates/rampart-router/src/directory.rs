//! The game directory: who is online, and what their messages mean.
//!
//! The directory owns the [`PlayerRegistry`] and is the only component
//! that interprets application envelopes. It never sees a connection
//! directly. Inbound envelopes arrive with the originating connection ID
//! as routing metadata, and every reply goes back through the gateway:
//!
//! | Inbound             | Outcome                                                 |
//! |---------------------|---------------------------------------------------------|
//! | `player_join`       | `Admitted` → gateway binds and writes the response      |
//! | `chat`              | best-effort fan-out of `chat_response` to every player  |
//! | `battle_request`    | ticketed `Resolve` to the combat worker                 |
//! | combat result       | all-or-nothing fan-out of `battle_result` to both sides |
//! | anything invalid    | `error` envelope to the originating connection          |
//!
//! Persistence goes through a store worker (see `store_worker`), so a slow
//! [`PlayerStore`] delays resumes and writes but never routing.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rampart_protocol::{
    AdmitRequest, AdmitResponse, ChatBroadcast, ChatRequest, Codec, CombatOutcome,
    CombatRequest, ErrorBody, GameEnvelope, MessageKind, PlayerId, ProtocolError,
    Request,
};
use rampart_session::{PlayerRegistry, PlayerSession, PlayerStore, SessionError};
use rampart_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::combat::Combatant;
use crate::mailbox::{ComponentHandle, MailboxMessage, Peer, mailbox};
use crate::store_worker::{StoreJob, spawn_store_worker};
use crate::{
    CombatMsg, DropReason, FanoutMode, GatewayMsg, PeerAddress, Role, Route,
    RouteError, RouteStats, RouterConfig,
};

/// Messages the directory understands.
#[derive(Debug)]
pub enum DirectoryMsg {
    Peer(PeerAddress),

    /// An envelope from a client. `origin` and `player` are routing
    /// metadata attached by the gateway; `player` is `None` until the
    /// connection is bound.
    Inbound {
        origin: ConnectionId,
        player: Option<PlayerId>,
        envelope: GameEnvelope,
    },

    /// An outcome from the combat worker.
    CombatResolved {
        ticket: u64,
        correlation: String,
        outcome: CombatOutcome,
    },

    /// The store's answer to a resume lookup. `stored` is `None` when
    /// nothing was stored or the store failed.
    Restored {
        origin: ConnectionId,
        correlation: String,
        request: AdmitRequest,
        stored: Option<PlayerSession>,
    },

    /// The player's connection is gone (or its admission was refused).
    /// Idempotent.
    RemovePlayer(PlayerId),

    /// Reply with the IDs of every admitted player, sorted.
    Players(oneshot::Sender<Vec<PlayerId>>),

    Stats(oneshot::Sender<RouteStats>),
    Shutdown,
}

impl MailboxMessage for DirectoryMsg {
    fn peer(address: PeerAddress) -> Self {
        Self::Peer(address)
    }

    fn stats(reply: oneshot::Sender<RouteStats>) -> Self {
        Self::Stats(reply)
    }

    fn shutdown() -> Self {
        Self::Shutdown
    }
}

pub type DirectoryHandle = ComponentHandle<DirectoryMsg>;

impl ComponentHandle<DirectoryMsg> {
    /// IDs of every admitted player, sorted.
    pub async fn players(&self) -> Result<Vec<PlayerId>, RouteError> {
        let (reply, rx) = oneshot::channel();
        self.send(DirectoryMsg::Players(reply))?;
        rx.await.map_err(|_| RouteError::PeerUnavailable(Role::Directory))
    }
}

/// A rejected request, on its way back to the client as an `error`
/// envelope.
struct Rejection {
    code: u16,
    message: String,
}

impl Rejection {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ProtocolError> for Rejection {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::NotAccepted(kind) => Self::new(
                ErrorBody::BAD_REQUEST,
                format!("{kind} is not accepted from clients"),
            ),
            ProtocolError::UnknownKind(kind) => {
                Self::new(ErrorBody::BAD_REQUEST, format!("unknown message type {kind:?}"))
            }
            other => Self::new(ErrorBody::BAD_REQUEST, format!("invalid payload: {other}")),
        }
    }
}

struct PendingCombat {
    attacker: PlayerId,
    defender: PlayerId,
    origin: ConnectionId,
    started: Instant,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct DirectoryActor<C: Codec> {
    receiver: mpsc::UnboundedReceiver<DirectoryMsg>,
    codec: C,
    store: mpsc::UnboundedSender<StoreJob>,
    config: RouterConfig,
    registry: PlayerRegistry,
    /// Connections waiting on a resume lookup.
    resuming: HashSet<ConnectionId>,
    gateway: Peer<GatewayMsg>,
    combat: Peer<CombatMsg>,
    pending: HashMap<u64, PendingCombat>,
    next_ticket: u64,
    stats: RouteStats,
}

impl<C: Codec> DirectoryActor<C> {
    async fn run(mut self) {
        tracing::info!(max_players = self.config.max_players, "directory started");

        // A zero timeout disables expiry.
        let timeout = self.config.combat_timeout();
        let expiring = !timeout.is_zero();
        let mut sweep = tokio::time::interval((timeout / 4).max(Duration::from_millis(10)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.handle(msg) {
                        break;
                    }
                }
                _ = sweep.tick(), if expiring => self.expire_combats(),
            }
        }

        tracing::info!(players = self.registry.len(), "directory stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, msg: DirectoryMsg) -> bool {
        match msg {
            DirectoryMsg::Peer(PeerAddress::Gateway(address)) => self.gateway.bind(address),
            DirectoryMsg::Peer(PeerAddress::Combat(address)) => self.combat.bind(address),
            DirectoryMsg::Peer(other) => {
                tracing::debug!(role = %other.role(), "ignoring unneeded peer");
            }
            DirectoryMsg::Inbound {
                origin,
                player,
                envelope,
            } => {
                if let Err(rejection) = self.on_inbound(origin, player, &envelope) {
                    self.reject(origin, &envelope, rejection);
                }
            }
            DirectoryMsg::Restored {
                origin,
                correlation,
                request,
                stored,
            } => self.on_restored(origin, correlation, request, stored),
            DirectoryMsg::CombatResolved {
                ticket,
                correlation,
                outcome,
            } => self.on_combat_resolved(ticket, correlation, outcome),
            DirectoryMsg::RemovePlayer(player) => self.remove_player(player),
            DirectoryMsg::Players(reply) => {
                let mut ids: Vec<_> = self.registry.ids().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
            DirectoryMsg::Stats(reply) => {
                let _ = reply.send(self.stats.clone());
            }
            DirectoryMsg::Shutdown => {
                tracing::info!("directory shutting down");
                return false;
            }
        }
        true
    }

    // -- inbound ----------------------------------------------------------

    fn on_inbound(
        &mut self,
        origin: ConnectionId,
        player: Option<PlayerId>,
        envelope: &GameEnvelope,
    ) -> Result<(), Rejection> {
        if envelope.kind.is_empty() {
            return Err(Rejection::new(ErrorBody::BAD_REQUEST, "message type is empty"));
        }
        let kind: MessageKind = envelope.kind.parse()?;

        if kind == MessageKind::Admit {
            return match Request::decode(envelope, &self.codec)? {
                Request::Admit(request) => self.admit(origin, &envelope.id, player, request),
                _ => Ok(()),
            };
        }

        if envelope.id.is_empty() {
            return Err(Rejection::new(ErrorBody::BAD_REQUEST, "correlation id is empty"));
        }
        let Some(sender) = player else {
            return Err(Rejection::new(ErrorBody::FORBIDDEN, "connection is not admitted"));
        };
        if envelope.id != sender.to_string() {
            return Err(Rejection::new(
                ErrorBody::FORBIDDEN,
                "correlation id does not match the sending player",
            ));
        }
        if !self.registry.contains(sender) {
            return Err(Rejection::new(ErrorBody::NOT_FOUND, "player not found"));
        }

        match Request::decode(envelope, &self.codec)? {
            Request::Admit(_) => Ok(()),
            Request::Chat(request) => self.chat(sender, request),
            Request::Combat(request) => self.request_combat(origin, sender, &envelope.id, request),
        }
    }

    fn admit(
        &mut self,
        origin: ConnectionId,
        correlation: &str,
        bound: Option<PlayerId>,
        request: AdmitRequest,
    ) -> Result<(), Rejection> {
        if let Some(player) = bound {
            return Err(Rejection::new(
                ErrorBody::CONFLICT,
                format!("connection is already admitted as {player}"),
            ));
        }
        if self.resuming.contains(&origin) {
            return Err(Rejection::new(
                ErrorBody::CONFLICT,
                "admission already in progress on this connection",
            ));
        }

        if let Some(ticket) = &request.resume {
            if self.registry.contains(ticket.id) {
                tracing::info!(player_id = %ticket.id, "resume target is online, admitting fresh");
            } else {
                let name = request.name.clone();
                let job = StoreJob::Load {
                    origin,
                    correlation: correlation.to_string(),
                    request,
                };
                if self.store.send(job).is_ok() {
                    self.resuming.insert(origin);
                    return Ok(());
                }
                tracing::warn!(conn_id = %origin, "store worker gone, admitting fresh");
                return self.admit_fresh(origin, name);
            }
        }
        self.admit_fresh(origin, request.name)
    }

    fn on_restored(
        &mut self,
        origin: ConnectionId,
        correlation: String,
        request: AdmitRequest,
        stored: Option<PlayerSession>,
    ) {
        self.resuming.remove(&origin);
        if let Err(rejection) = self.resume(origin, request, stored) {
            let envelope = GameEnvelope::new(MessageKind::Admit, correlation, Vec::new());
            self.reject(origin, &envelope, rejection);
        }
    }

    fn resume(
        &mut self,
        origin: ConnectionId,
        request: AdmitRequest,
        stored: Option<PlayerSession>,
    ) -> Result<(), Rejection> {
        let (Some(ticket), Some(stored)) = (request.resume, stored) else {
            return self.admit_fresh(origin, request.name);
        };
        match self.registry.restore(stored, &ticket.token) {
            Ok(session) => {
                let session = session.clone();
                self.complete_admission(origin, session)
            }
            Err(SessionError::DirectoryFull(max)) => Err(Rejection::new(
                ErrorBody::UNAVAILABLE,
                format!("server is full ({max} players)"),
            )),
            Err(e) => {
                tracing::info!(player_id = %ticket.id, error = %e, "resume refused, admitting fresh");
                self.admit_fresh(origin, request.name)
            }
        }
    }

    fn admit_fresh(&mut self, origin: ConnectionId, name: Option<String>) -> Result<(), Rejection> {
        let session = self
            .registry
            .admit_new(name)
            .map_err(|e| Rejection::new(ErrorBody::UNAVAILABLE, e.to_string()))?
            .clone();
        self.complete_admission(origin, session)
    }

    /// Persists the new session and hands it to the gateway for binding.
    fn complete_admission(
        &mut self,
        origin: ConnectionId,
        session: PlayerSession,
    ) -> Result<(), Rejection> {
        let response = AdmitResponse {
            id: session.id,
            name: session.name.clone(),
            token: session.resume_token.clone(),
        };
        let payload = match self.codec.encode(&response) {
            Ok(payload) => payload,
            Err(e) => {
                self.registry.remove(session.id);
                return Err(Rejection::new(ErrorBody::UNAVAILABLE, e.to_string()));
            }
        };

        let player = session.id;
        self.persist(StoreJob::Save(session));
        let sent = self.gateway.send(
            GatewayMsg::Admitted {
                connection: origin,
                player,
                envelope: GameEnvelope::new(MessageKind::Admitted, player.to_string(), payload),
            },
            &mut self.stats,
        );
        if !sent {
            // Nobody can ever bind this player.
            self.registry.remove(player);
        }
        Ok(())
    }

    fn chat(&mut self, sender: PlayerId, request: ChatRequest) -> Result<(), Rejection> {
        let sender_name = self
            .registry
            .get(sender)
            .map(|session| session.name.clone())
            .ok_or_else(|| Rejection::new(ErrorBody::NOT_FOUND, "player not found"))?;

        let broadcast = ChatBroadcast {
            sender,
            sender_name,
            content: request.content,
            timestamp: unix_now(),
        };
        let payload = self
            .codec
            .encode(&broadcast)
            .map_err(|e| Rejection::new(ErrorBody::UNAVAILABLE, e.to_string()))?;
        let envelope = GameEnvelope::new(MessageKind::ChatBroadcast, sender.to_string(), payload);

        let deliveries = self
            .registry
            .ids()
            .map(|recipient| (recipient, envelope.clone()))
            .collect();
        self.gateway.send(
            GatewayMsg::Fanout {
                deliveries,
                mode: FanoutMode::BestEffort,
            },
            &mut self.stats,
        );
        Ok(())
    }

    fn request_combat(
        &mut self,
        origin: ConnectionId,
        sender: PlayerId,
        correlation: &str,
        request: CombatRequest,
    ) -> Result<(), Rejection> {
        if request.attacker_id != sender {
            return Err(Rejection::new(
                ErrorBody::FORBIDDEN,
                "attacker must be the sending player",
            ));
        }
        if request.defender_id == sender {
            return Err(Rejection::new(ErrorBody::BAD_REQUEST, "cannot attack yourself"));
        }
        let (Some(attacker), Some(defender)) = (
            self.registry.get(sender),
            self.registry.get(request.defender_id),
        ) else {
            return Err(Rejection::new(ErrorBody::NOT_FOUND, "defender not found"));
        };
        let attacker = Combatant {
            id: attacker.id,
            stats: attacker.stats,
        };
        let defender = Combatant {
            id: defender.id,
            stats: defender.stats,
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let sent = self.combat.send(
            CombatMsg::Resolve {
                ticket,
                correlation: correlation.to_string(),
                attacker,
                defender,
            },
            &mut self.stats,
        );
        if !sent {
            return Err(Rejection::new(
                ErrorBody::UNAVAILABLE,
                "combat is unavailable",
            ));
        }

        self.pending.insert(
            ticket,
            PendingCombat {
                attacker: attacker.id,
                defender: defender.id,
                origin,
                started: Instant::now(),
            },
        );
        tracing::debug!(ticket, attacker = %attacker.id, defender = %defender.id, "combat requested");
        Ok(())
    }

    // -- combat results ---------------------------------------------------

    fn on_combat_resolved(&mut self, ticket: u64, correlation: String, outcome: CombatOutcome) {
        let Some(pending) = self.pending.remove(&ticket) else {
            tracing::debug!(ticket, reason = %DropReason::StaleCombatResult, "dropping combat result");
            self.stats.record_drop(DropReason::StaleCombatResult);
            return;
        };

        let mut participants = [outcome.winner_id, outcome.loser_id];
        participants.sort();
        let mut expected = [pending.attacker, pending.defender];
        expected.sort();
        if participants != expected {
            tracing::warn!(
                ticket,
                winner = %outcome.winner_id,
                loser = %outcome.loser_id,
                "combat result names the wrong players"
            );
            self.stats.record_drop(DropReason::StaleCombatResult);
            return;
        }

        if !(self.registry.contains(outcome.winner_id) && self.registry.contains(outcome.loser_id)) {
            tracing::debug!(
                ticket,
                winner = %outcome.winner_id,
                loser = %outcome.loser_id,
                reason = %DropReason::ParticipantLeft,
                "discarding combat result for both participants"
            );
            self.stats.record_drop(DropReason::ParticipantLeft);
            return;
        }

        let payload = match self.codec.encode(&outcome) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(ticket, error = %e, "failed to encode combat result");
                return;
            }
        };
        let result = GameEnvelope::new(MessageKind::CombatResult, correlation, payload);
        let deliveries = vec![
            (outcome.winner_id, result.readdressed(outcome.winner_id.to_string())),
            (outcome.loser_id, result.readdressed(outcome.loser_id.to_string())),
        ];
        self.gateway.send(
            GatewayMsg::Fanout {
                deliveries,
                mode: FanoutMode::AllOrNothing,
            },
            &mut self.stats,
        );
    }

    fn expire_combats(&mut self) {
        let limit = self.config.combat_timeout();
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.started.elapsed() >= limit)
            .map(|(ticket, _)| *ticket)
            .collect();

        for ticket in expired {
            let Some(pending) = self.pending.remove(&ticket) else {
                continue;
            };
            tracing::info!(
                ticket,
                attacker = %pending.attacker,
                defender = %pending.defender,
                "combat request timed out"
            );
            if self.registry.contains(pending.attacker) {
                let envelope = GameEnvelope::new(
                    MessageKind::CombatRequest,
                    pending.attacker.to_string(),
                    Vec::new(),
                );
                self.send_error(
                    Route::Player(pending.attacker),
                    &envelope,
                    Rejection::new(ErrorBody::TIMEOUT, "combat timed out"),
                );
            } else {
                tracing::debug!(conn_id = %pending.origin, "attacker already left");
            }
        }
    }

    // -- removal ----------------------------------------------------------

    fn remove_player(&mut self, player: PlayerId) {
        let Some(session) = self.registry.remove(player) else {
            tracing::debug!(player_id = %player, "remove for unknown player");
            return;
        };
        if self.config.persist_on_leave {
            self.persist(StoreJob::Save(session));
        } else {
            self.persist(StoreJob::Delete(player));
        }
    }

    // -- storage ----------------------------------------------------------

    /// Queues a write. A dead store worker leaves the session in-memory only.
    fn persist(&self, job: StoreJob) {
        if self.store.send(job).is_err() {
            tracing::warn!("store worker gone, session is in-memory only");
        }
    }

    // -- errors -----------------------------------------------------------

    fn reject(&mut self, origin: ConnectionId, envelope: &GameEnvelope, rejection: Rejection) {
        tracing::debug!(
            conn_id = %origin,
            kind = %envelope.kind,
            code = rejection.code,
            message = %rejection.message,
            "rejecting envelope"
        );
        self.send_error(Route::Connection(origin), envelope, rejection);
    }

    fn send_error(&mut self, route: Route, rejected: &GameEnvelope, rejection: Rejection) {
        let body = ErrorBody {
            code: rejection.code,
            message: rejection.message,
            kind: rejected.kind.clone(),
        };
        let payload = match self.codec.encode(&body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode error body");
                return;
            }
        };
        self.gateway.send(
            GatewayMsg::Deliver {
                route,
                envelope: GameEnvelope::new(MessageKind::Error, rejected.id.clone(), payload),
            },
            &mut self.stats,
        );
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Spawns a directory actor and returns a handle to it.
pub fn spawn_directory<C: Codec, S: PlayerStore>(
    codec: C,
    store: S,
    config: &RouterConfig,
) -> DirectoryHandle {
    let (handle, receiver) = mailbox(Role::Directory);
    let store = spawn_store_worker(store, config.store_timeout(), handle.address());
    let actor = DirectoryActor {
        receiver,
        codec,
        store,
        config: config.clone(),
        registry: PlayerRegistry::new(config.max_players),
        resuming: HashSet::new(),
        gateway: Peer::unbound(Role::Gateway),
        combat: Peer::unbound(Role::Combat),
        pending: HashMap::new(),
        next_ticket: 1,
        stats: RouteStats::default(),
    };
    tokio::spawn(actor.run());
    handle
}

#[cfg(test)]
mod tests {
    //! Directory-level tests with hand-held gateway and combat mailboxes.

    use rampart_protocol::{JsonCodec, ResumeTicket};
    use rampart_session::{MemoryStore, StoreError};

    use super::*;

    /// A store whose writes take most of the default store timeout.
    #[derive(Default)]
    struct SlowStore(MemoryStore);

    impl PlayerStore for SlowStore {
        async fn get(&self, id: PlayerId) -> Result<Option<PlayerSession>, StoreError> {
            self.0.get(id).await
        }

        async fn put(&self, session: &PlayerSession) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_millis(450)).await;
            self.0.put(session).await
        }

        async fn delete(&self, id: PlayerId) -> Result<(), StoreError> {
            self.0.delete(id).await
        }
    }

    struct Harness {
        directory: DirectoryHandle,
        gateway: mpsc::UnboundedReceiver<GatewayMsg>,
        combat: mpsc::UnboundedReceiver<CombatMsg>,
        _peers: (ComponentHandle<GatewayMsg>, ComponentHandle<CombatMsg>),
    }

    fn harness(config: RouterConfig) -> Harness {
        harness_with(MemoryStore::default(), config)
    }

    fn harness_with<S: PlayerStore>(store: S, config: RouterConfig) -> Harness {
        let directory = spawn_directory(JsonCodec, store, &config);
        let (g, gateway) = mailbox::<GatewayMsg>(Role::Gateway);
        let (c, combat) = mailbox::<CombatMsg>(Role::Combat);
        directory.bind_peer(g.address().into()).unwrap();
        directory.bind_peer(c.address().into()).unwrap();
        Harness {
            directory,
            gateway,
            combat,
            _peers: (g, c),
        }
    }

    fn inbound(origin: u64, player: Option<u64>, kind: &str, id: &str, payload: &[u8]) -> DirectoryMsg {
        DirectoryMsg::Inbound {
            origin: ConnectionId::new(origin),
            player: player.map(PlayerId),
            envelope: GameEnvelope {
                kind: kind.into(),
                id: id.into(),
                payload: payload.to_vec(),
            },
        }
    }

    async fn expect_error(h: &mut Harness) -> (Route, ErrorBody) {
        match h.gateway.recv().await {
            Some(GatewayMsg::Deliver { route, envelope }) => {
                assert_eq!(envelope.kind, "error");
                (route, JsonCodec.decode(&envelope.payload).unwrap())
            }
            other => panic!("expected error Deliver, got {other:?}"),
        }
    }

    async fn admit(h: &mut Harness, origin: u64) -> PlayerId {
        h.directory.send(inbound(origin, None, "player_join", "", b"")).unwrap();
        expect_admitted(h, origin).await.id
    }

    async fn expect_admitted(h: &mut Harness, origin: u64) -> AdmitResponse {
        match h.gateway.recv().await {
            Some(GatewayMsg::Admitted {
                connection,
                player,
                envelope,
            }) => {
                assert_eq!(connection, ConnectionId::new(origin));
                let response: AdmitResponse = JsonCodec.decode(&envelope.payload).unwrap();
                assert_eq!(response.id, player);
                response
            }
            other => panic!("expected Admitted, got {other:?}"),
        }
    }

    fn resume_payload(response: &AdmitResponse) -> Vec<u8> {
        let request = AdmitRequest {
            name: None,
            resume: Some(ResumeTicket {
                id: response.id,
                token: response.token.clone(),
            }),
        };
        JsonCodec.encode(&request).unwrap()
    }

    #[tokio::test]
    async fn test_admit_carries_origin_connection() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 11).await;
        let p2 = admit(&mut h, 12).await;
        assert_ne!(p1, p2);
        assert_eq!(h.directory.players().await.unwrap(), vec![p1, p2]);
    }

    #[tokio::test]
    async fn test_empty_type_rejected_to_origin() {
        let mut h = harness(RouterConfig::default());
        h.directory.send(inbound(5, None, "", "x", b"")).unwrap();

        let (route, body) = expect_error(&mut h).await;
        assert_eq!(route, Route::Connection(ConnectionId::new(5)));
        assert_eq!(body.code, ErrorBody::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let mut h = harness(RouterConfig::default());
        h.directory.send(inbound(5, Some(1), "teleport", "player_1", b"")).unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::BAD_REQUEST);
        assert_eq!(body.kind, "teleport");
    }

    #[tokio::test]
    async fn test_chat_before_admission_is_forbidden() {
        let mut h = harness(RouterConfig::default());
        h.directory
            .send(inbound(5, None, "chat", "player_1", br#"{"content":"hi"}"#))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_chat_with_missing_id_is_bad_request() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        h.directory
            .send(inbound(1, Some(p1.0), "chat", "", br#"{"content":"hi"}"#))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_spoofed_id_is_forbidden() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        let p2 = admit(&mut h, 2).await;
        h.directory
            .send(inbound(1, Some(p1.0), "chat", &p2.to_string(), br#"{"content":"hi"}"#))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_client_sent_combat_result_is_rejected() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        h.directory
            .send(inbound(1, Some(p1.0), "battle_result", &p1.to_string(), b"{}"))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admit_on_bound_connection_is_conflict() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        h.directory
            .send(inbound(1, Some(p1.0), "player_join", &p1.to_string(), b""))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::CONFLICT);
        assert_eq!(h.directory.players().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admit_beyond_capacity_is_unavailable() {
        let mut h = harness(RouterConfig {
            max_players: 1,
            ..RouterConfig::default()
        });
        admit(&mut h, 1).await;
        h.directory.send(inbound(2, None, "player_join", "", b"")).unwrap();

        let (route, body) = expect_error(&mut h).await;
        assert_eq!(route, Route::Connection(ConnectionId::new(2)));
        assert_eq!(body.code, ErrorBody::UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_chat_fans_out_to_every_player() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        let p2 = admit(&mut h, 2).await;
        h.directory
            .send(inbound(1, Some(p1.0), "chat", &p1.to_string(), br#"{"content":"hi"}"#))
            .unwrap();

        match h.gateway.recv().await {
            Some(GatewayMsg::Fanout { deliveries, mode }) => {
                assert_eq!(mode, FanoutMode::BestEffort);
                let mut recipients: Vec<_> = deliveries.iter().map(|(p, _)| *p).collect();
                recipients.sort();
                assert_eq!(recipients, vec![p1, p2]);
                let body: ChatBroadcast = JsonCodec.decode(&deliveries[0].1.payload).unwrap();
                assert_eq!(body.sender, p1);
                assert_eq!(body.content, "hi");
            }
            other => panic!("expected Fanout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_combat_request_forwarded_with_correlation() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        let p2 = admit(&mut h, 2).await;
        let payload = format!(r#"{{"attacker_id":"{p1}","defender_id":"{p2}"}}"#);
        h.directory
            .send(inbound(1, Some(p1.0), "battle_request", &p1.to_string(), payload.as_bytes()))
            .unwrap();

        match h.combat.recv().await {
            Some(CombatMsg::Resolve {
                correlation,
                attacker,
                defender,
                ..
            }) => {
                assert_eq!(correlation, p1.to_string());
                assert_eq!((attacker.id, defender.id), (p1, p2));
            }
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_combat_against_self_is_rejected() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        let payload = format!(r#"{{"attacker_id":"{p1}","defender_id":"{p1}"}}"#);
        h.directory
            .send(inbound(1, Some(p1.0), "battle_request", &p1.to_string(), payload.as_bytes()))
            .unwrap();

        let (_, body) = expect_error(&mut h).await;
        assert_eq!(body.code, ErrorBody::BAD_REQUEST);
        assert!(h.combat.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_stale() {
        let h = harness(RouterConfig::default());
        h.directory
            .send(DirectoryMsg::CombatResolved {
                ticket: 99,
                correlation: String::new(),
                outcome: CombatOutcome {
                    winner_id: PlayerId(1),
                    loser_id: PlayerId(2),
                    damage_dealt: 1,
                },
            })
            .unwrap();

        let stats = h.directory.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::StaleCombatResult), 1);
    }

    #[tokio::test]
    async fn test_remove_player_is_idempotent() {
        let mut h = harness(RouterConfig::default());
        let p1 = admit(&mut h, 1).await;
        h.directory.send(DirectoryMsg::RemovePlayer(p1)).unwrap();
        h.directory.send(DirectoryMsg::RemovePlayer(p1)).unwrap();

        assert!(h.directory.players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_after_removal_restores_same_player() {
        let mut h = harness(RouterConfig::default());
        h.directory.send(inbound(1, None, "player_join", "", br#"{"name":"ayla"}"#)).unwrap();
        let first = expect_admitted(&mut h, 1).await;
        h.directory.send(DirectoryMsg::RemovePlayer(first.id)).unwrap();

        h.directory
            .send(inbound(2, None, "player_join", "", &resume_payload(&first)))
            .unwrap();
        let resumed = expect_admitted(&mut h, 2).await;

        assert_eq!(resumed.id, first.id);
        assert_eq!(resumed.name, "ayla");
        assert_ne!(resumed.token, first.token);
    }

    #[tokio::test]
    async fn test_second_join_while_resuming_is_conflict() {
        let mut h = harness(RouterConfig::default());
        h.directory.send(inbound(1, None, "player_join", "", b"")).unwrap();
        let first = expect_admitted(&mut h, 1).await;
        h.directory.send(DirectoryMsg::RemovePlayer(first.id)).unwrap();

        let payload = resume_payload(&first);
        h.directory.send(inbound(3, None, "player_join", "", &payload)).unwrap();
        h.directory.send(inbound(3, None, "player_join", "", &payload)).unwrap();

        let (route, body) = expect_error(&mut h).await;
        assert_eq!(route, Route::Connection(ConnectionId::new(3)));
        assert_eq!(body.code, ErrorBody::CONFLICT);
        assert_eq!(expect_admitted(&mut h, 3).await.id, first.id);
        assert_eq!(h.directory.players().await.unwrap(), vec![first.id]);
    }

    #[tokio::test]
    async fn test_slow_store_does_not_stall_routing() {
        let mut h = harness_with(SlowStore::default(), RouterConfig::default());
        let started = Instant::now();
        for origin in 1..=5 {
            h.directory.send(inbound(origin, None, "player_join", "", b"")).unwrap();
        }

        let players = h.directory.players().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(players.len(), 5);
        assert!(
            elapsed < Duration::from_millis(300),
            "players query took {elapsed:?}"
        );
        for origin in 1..=5 {
            expect_admitted(&mut h, origin).await;
        }
    }

    #[tokio::test]
    async fn test_zero_combat_timeout_never_expires() {
        let mut h = harness(RouterConfig {
            combat_timeout_secs: 0,
            ..RouterConfig::default()
        });
        let p1 = admit(&mut h, 1).await;
        let p2 = admit(&mut h, 2).await;
        let payload = format!(r#"{{"attacker_id":"{p1}","defender_id":"{p2}"}}"#);
        h.directory
            .send(inbound(1, Some(p1.0), "battle_request", &p1.to_string(), payload.as_bytes()))
            .unwrap();
        assert!(matches!(h.combat.recv().await, Some(CombatMsg::Resolve { .. })));

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.directory.stats().await.unwrap();

        assert!(h.gateway.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pending_combat_times_out_with_error_to_attacker() {
        let mut h = harness(RouterConfig {
            combat_timeout_secs: 1,
            ..RouterConfig::default()
        });
        let p1 = admit(&mut h, 1).await;
        let p2 = admit(&mut h, 2).await;
        let payload = format!(r#"{{"attacker_id":"{p1}","defender_id":"{p2}"}}"#);
        h.directory
            .send(inbound(1, Some(p1.0), "battle_request", &p1.to_string(), payload.as_bytes()))
            .unwrap();

        let (route, body) = expect_error(&mut h).await;
        assert_eq!(route, Route::Player(p1));
        assert_eq!(body.code, ErrorBody::TIMEOUT);
        assert_eq!(body.kind, "battle_request");
    }
}
