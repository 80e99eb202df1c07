//! The connection gateway: bytes in, bytes out.
//!
//! The gateway owns every live connection and the session binding table.
//! Each accepted connection gets two tasks of its own:
//!
//! ```text
//!              ┌── read loop ──→ GatewayMsg::Inbound ──┐
//!  connection ─┤                                       ├─ gateway actor ─→ directory
//!              └── write loop ←── bounded send queue ←─┘
//! ```
//!
//! The read loop never touches gateway state. It only hands bytes to the
//! gateway's mailbox, so the mailbox is the single synchronisation point
//! between the network and the routing tables.
//!
//! Inbound `Game` frames are forwarded to the directory together with the
//! originating connection ID and the currently bound player (if any) as
//! out-of-band metadata. The directory answers an admission with
//! [`GatewayMsg::Admitted`], which names the connection explicitly, so
//! binding is a lookup and never a guess.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rampart_protocol::{Codec, Frame, FrameKind, GameEnvelope, PlayerId};
use rampart_transport::{Connection, ConnectionId};
use tokio::sync::{mpsc, oneshot};

use crate::binding::SessionBindings;
use crate::mailbox::{Address, ComponentHandle, MailboxMessage, Peer, mailbox};
use crate::{
    ConnectionState, DirectoryMsg, DropReason, PeerAddress, Role, RouteError,
    RouteStats, RouterConfig,
};

/// Reply sent for `Text` and client-originated `Error` frames.
pub const UNSUPPORTED_FRAME: &[u8] = b"unsupported frame type";

/// Where an outbound envelope should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Whatever connection the player is bound to, if any.
    Player(PlayerId),
    /// A specific connection, bound or not. Used for replies to traffic
    /// that arrived before admission.
    Connection(ConnectionId),
}

/// Delivery guarantee for a multi-recipient send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutMode {
    /// Every recipient gets its copy, or none does.
    AllOrNothing,
    /// Each recipient is attempted independently.
    BestEffort,
}

/// Messages the gateway understands.
#[derive(Debug)]
pub enum GatewayMsg {
    Peer(PeerAddress),

    /// A connection was accepted. `outbound` feeds its write loop.
    Register {
        id: ConnectionId,
        outbound: mpsc::Sender<Vec<u8>>,
    },

    /// Raw bytes from a connection's read loop.
    Inbound { id: ConnectionId, bytes: Vec<u8> },

    /// The read loop ended. Idempotent.
    Disconnected { id: ConnectionId },

    /// Write one envelope.
    Deliver { route: Route, envelope: GameEnvelope },

    /// Write one envelope per player.
    Fanout {
        deliveries: Vec<(PlayerId, GameEnvelope)>,
        mode: FanoutMode,
    },

    /// The directory admitted `connection` as `player`: bind them, then
    /// write `envelope` to the connection.
    Admitted {
        connection: ConnectionId,
        player: PlayerId,
        envelope: GameEnvelope,
    },

    /// Reply with the current binding table.
    Bindings(oneshot::Sender<Vec<(ConnectionId, PlayerId)>>),

    Stats(oneshot::Sender<RouteStats>),
    Shutdown,
}

impl MailboxMessage for GatewayMsg {
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

// ---------------------------------------------------------------------------
// GatewayHandle
// ---------------------------------------------------------------------------

/// Handle to a running gateway.
///
/// Besides the mailbox it carries the per-connection settings, because
/// [`accept`](Self::accept) spawns the connection's tasks on the caller's
/// side: the gateway actor never sees the concrete connection type.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    inner: ComponentHandle<GatewayMsg>,
    send_queue_size: usize,
    idle_timeout: Option<Duration>,
}

impl GatewayHandle {
    /// Registers a connection and starts its read and write loops.
    /// Returns immediately.
    ///
    /// # Errors
    /// [`RouteError::PeerUnavailable`] if the gateway has stopped. The
    /// connection is dropped in that case.
    pub fn accept<T: Connection>(&self, connection: T) -> Result<ConnectionId, RouteError> {
        let connection = Arc::new(connection);
        let id = connection.id();
        let (outbound, queue) = mpsc::channel(self.send_queue_size.max(1));

        // Register before the read loop exists, so the first Inbound can
        // never overtake it.
        self.inner.send(GatewayMsg::Register { id, outbound })?;
        tokio::spawn(write_loop(Arc::clone(&connection), queue));
        tokio::spawn(read_loop(connection, self.inner.address(), self.idle_timeout));
        Ok(id)
    }

    pub fn address(&self) -> Address<GatewayMsg> {
        self.inner.address()
    }

    /// The underlying mailbox handle.
    pub fn component(&self) -> &ComponentHandle<GatewayMsg> {
        &self.inner
    }

    /// Snapshot of the binding table, sorted by connection.
    pub async fn bindings(&self) -> Result<Vec<(ConnectionId, PlayerId)>, RouteError> {
        let (reply, rx) = oneshot::channel();
        self.inner.send(GatewayMsg::Bindings(reply))?;
        rx.await.map_err(|_| RouteError::PeerUnavailable(Role::Gateway))
    }

    pub async fn stats(&self) -> Result<RouteStats, RouteError> {
        self.inner.stats().await
    }

    pub fn shutdown(&self) -> Result<(), RouteError> {
        self.inner.shutdown()
    }

    pub async fn stopped(&self) {
        self.inner.stopped().await
    }
}

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

async fn read_loop<T: Connection>(
    connection: Arc<T>,
    gateway: Address<GatewayMsg>,
    idle_timeout: Option<Duration>,
) {
    let id = connection.id();
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, connection.recv()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::info!(conn_id = %id, "idle timeout, closing connection");
                    break;
                }
            },
            None => connection.recv().await,
        };

        match next {
            Ok(Some(bytes)) => {
                if gateway.send(GatewayMsg::Inbound { id, bytes }).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(conn_id = %id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(conn_id = %id, error = %e, "read failed");
                break;
            }
        }
    }

    let _ = gateway.send(GatewayMsg::Disconnected { id });
    if let Err(e) = connection.close().await {
        tracing::debug!(conn_id = %id, error = %e, "close failed");
    }
}

async fn write_loop<T: Connection>(connection: Arc<T>, mut queue: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = connection.send(&bytes).await {
            tracing::debug!(conn_id = %connection.id(), error = %e, "write failed");
            break;
        }
    }
    // Queue closed (torn down) or write failed: end the session. The read
    // loop observes the close and reports Disconnected.
    if let Err(e) = connection.close().await {
        tracing::debug!(conn_id = %connection.id(), error = %e, "close failed");
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct ConnectionEntry {
    state: ConnectionState,
    /// `None` once the connection is `Closing`.
    outbound: Option<mpsc::Sender<Vec<u8>>>,
}

struct GatewayActor<C: Codec> {
    receiver: mpsc::UnboundedReceiver<GatewayMsg>,
    codec: C,
    directory: Peer<DirectoryMsg>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
    bindings: SessionBindings,
    stats: RouteStats,
}

impl<C: Codec> GatewayActor<C> {
    async fn run(mut self) {
        tracing::info!("gateway started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                GatewayMsg::Peer(PeerAddress::Directory(address)) => {
                    self.directory.bind(address);
                }
                GatewayMsg::Peer(other) => {
                    tracing::debug!(role = %other.role(), "ignoring unneeded peer");
                }
                GatewayMsg::Register { id, outbound } => self.on_register(id, outbound),
                GatewayMsg::Inbound { id, bytes } => self.on_inbound(id, &bytes),
                GatewayMsg::Disconnected { id } => self.on_disconnect(id),
                GatewayMsg::Deliver { route, envelope } => self.on_deliver(route, &envelope),
                GatewayMsg::Fanout { deliveries, mode } => self.on_fanout(&deliveries, mode),
                GatewayMsg::Admitted {
                    connection,
                    player,
                    envelope,
                } => self.on_admitted(connection, player, &envelope),
                GatewayMsg::Bindings(reply) => {
                    let _ = reply.send(self.bindings.snapshot());
                }
                GatewayMsg::Stats(reply) => {
                    let _ = reply.send(self.stats.clone());
                }
                GatewayMsg::Shutdown => {
                    tracing::info!(
                        connections = self.connections.len(),
                        "gateway shutting down"
                    );
                    break;
                }
            }
        }

        // Dropping the send queues ends every write loop, which closes
        // the connections.
        self.connections.clear();
        tracing::info!("gateway stopped");
    }

    fn on_register(&mut self, id: ConnectionId, outbound: mpsc::Sender<Vec<u8>>) {
        self.connections.insert(
            id,
            ConnectionEntry {
                state: ConnectionState::Open,
                outbound: Some(outbound),
            },
        );
        tracing::info!(
            conn_id = %id,
            connections = self.connections.len(),
            "connection registered"
        );
    }

    fn on_inbound(&mut self, id: ConnectionId, bytes: &[u8]) {
        match self.connections.get(&id).map(|entry| entry.state) {
            None => return self.drop_inbound(id, DropReason::UnknownConnection),
            Some(state) if !state.is_open() => {
                return self.drop_inbound(id, DropReason::ConnectionClosing);
            }
            Some(_) => {}
        }

        let frame: Frame = match self.codec.decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(conn_id = %id, error = %e, "undecodable frame");
                return self.drop_inbound(id, DropReason::DecodeFailed);
            }
        };

        match frame.kind {
            FrameKind::Heartbeat => {
                self.write_frame(id, &frame);
            }
            FrameKind::Text | FrameKind::Error => {
                let reply = Frame::new(FrameKind::Error, UNSUPPORTED_FRAME.to_vec());
                self.write_frame(id, &reply);
            }
            FrameKind::Game => {
                let envelope: GameEnvelope = match self.codec.decode(&frame.payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(conn_id = %id, error = %e, "undecodable envelope");
                        return self.drop_inbound(id, DropReason::DecodeFailed);
                    }
                };
                let player = self.bindings.player_of(id);
                self.directory.send(
                    DirectoryMsg::Inbound {
                        origin: id,
                        player,
                        envelope,
                    },
                    &mut self.stats,
                );
            }
        }
    }

    fn on_disconnect(&mut self, id: ConnectionId) {
        match self.connections.remove(&id) {
            Some(entry) => tracing::info!(
                conn_id = %id,
                from = %entry.state,
                to = %ConnectionState::Closed,
                "connection released"
            ),
            None => tracing::debug!(conn_id = %id, "disconnect for released connection"),
        }
        self.release_binding(id);
    }

    fn on_deliver(&mut self, route: Route, envelope: &GameEnvelope) {
        let connection = match route {
            Route::Connection(connection) => connection,
            Route::Player(player) => match self.bindings.connection_of(player) {
                Some(connection) => connection,
                None => {
                    tracing::debug!(
                        player_id = %player,
                        kind = %envelope.kind,
                        reason = %DropReason::UnboundPlayer,
                        "dropping envelope"
                    );
                    self.stats.record_drop(DropReason::UnboundPlayer);
                    return;
                }
            },
        };
        if let Some(bytes) = self.encode_envelope(envelope) {
            self.enqueue(connection, bytes);
        }
    }

    fn on_fanout(&mut self, deliveries: &[(PlayerId, GameEnvelope)], mode: FanoutMode) {
        match mode {
            FanoutMode::BestEffort => {
                for (player, envelope) in deliveries {
                    self.on_deliver(Route::Player(*player), envelope);
                }
            }
            FanoutMode::AllOrNothing => {
                // Resolve and encode every copy before writing any of them.
                // Nothing else runs between the check and the writes, and a
                // queue's free capacity can only grow in the meantime.
                let mut ready = Vec::with_capacity(deliveries.len());
                for (player, envelope) in deliveries {
                    let target = self
                        .bindings
                        .connection_of(*player)
                        .filter(|c| self.has_capacity(*c));
                    match (target, self.encode_envelope(envelope)) {
                        (Some(connection), Some(bytes)) => ready.push((connection, bytes)),
                        _ => {
                            tracing::debug!(
                                player_id = %player,
                                recipients = deliveries.len(),
                                reason = %DropReason::ParticipantLeft,
                                "fan-out aborted"
                            );
                            for _ in deliveries {
                                self.stats.record_drop(DropReason::ParticipantLeft);
                            }
                            return;
                        }
                    }
                }
                for (connection, bytes) in ready {
                    self.enqueue(connection, bytes);
                }
            }
        }
    }

    fn on_admitted(&mut self, connection: ConnectionId, player: PlayerId, envelope: &GameEnvelope) {
        let open = self
            .connections
            .get(&connection)
            .is_some_and(|entry| entry.state.is_open());
        if !open {
            tracing::info!(
                conn_id = %connection,
                player_id = %player,
                "admitted connection is gone, releasing player"
            );
            self.stats.record_drop(DropReason::UnknownConnection);
            self.directory
                .send(DirectoryMsg::RemovePlayer(player), &mut self.stats);
            return;
        }

        if let Err(e) = self.bindings.bind(connection, player) {
            tracing::warn!(error = %e, "refusing admission");
            self.stats.record_drop(DropReason::BindingConflict);
            // Only the newly admitted player is an orphan. A player bound
            // elsewhere keeps its session.
            if self.bindings.connection_of(player).is_none() {
                self.directory
                    .send(DirectoryMsg::RemovePlayer(player), &mut self.stats);
            }
            return;
        }

        tracing::info!(conn_id = %connection, player_id = %player, "session bound");
        if let Some(bytes) = self.encode_envelope(envelope) {
            self.enqueue(connection, bytes);
        }
    }

    // -- helpers ----------------------------------------------------------

    fn drop_inbound(&mut self, id: ConnectionId, reason: DropReason) {
        tracing::debug!(conn_id = %id, %reason, "dropping inbound frame");
        self.stats.record_drop(reason);
    }

    fn has_capacity(&self, connection: ConnectionId) -> bool {
        self.connections.get(&connection).is_some_and(|entry| {
            entry.state.is_open()
                && entry
                    .outbound
                    .as_ref()
                    .is_some_and(|queue| queue.capacity() > 0)
        })
    }

    fn encode_envelope(&mut self, envelope: &GameEnvelope) -> Option<Vec<u8>> {
        let encoded = self
            .codec
            .encode(envelope)
            .and_then(|payload| self.codec.encode(&Frame::new(FrameKind::Game, payload)));
        match encoded {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(kind = %envelope.kind, error = %e, "failed to encode envelope");
                self.stats.record_drop(DropReason::SendFailed);
                None
            }
        }
    }

    fn write_frame(&mut self, connection: ConnectionId, frame: &Frame) {
        match self.codec.encode(frame) {
            Ok(bytes) => {
                self.enqueue(connection, bytes);
            }
            Err(e) => {
                tracing::warn!(conn_id = %connection, error = %e, "failed to encode frame");
                self.stats.record_drop(DropReason::SendFailed);
            }
        }
    }

    /// Pushes bytes onto a connection's send queue. A full or closed queue
    /// tears the connection down.
    fn enqueue(&mut self, connection: ConnectionId, bytes: Vec<u8>) -> bool {
        let Some(entry) = self.connections.get(&connection) else {
            tracing::debug!(conn_id = %connection, reason = %DropReason::UnknownConnection, "dropping outbound frame");
            self.stats.record_drop(DropReason::UnknownConnection);
            return false;
        };
        let Some(queue) = entry.outbound.as_ref().filter(|_| entry.state.is_open()) else {
            tracing::debug!(conn_id = %connection, reason = %DropReason::ConnectionClosing, "dropping outbound frame");
            self.stats.record_drop(DropReason::ConnectionClosing);
            return false;
        };

        match queue.try_send(bytes) {
            Ok(()) => {
                self.stats.record_delivery();
                true
            }
            Err(e) => {
                let full = matches!(e, mpsc::error::TrySendError::Full(_));
                tracing::info!(conn_id = %connection, queue_full = full, "write failed, tearing down");
                self.stats.record_drop(DropReason::SendFailed);
                self.teardown(connection);
                false
            }
        }
    }

    /// Marks a connection `Closing`, stops writing to it, and releases its
    /// binding. The entry itself goes away when the read loop reports.
    fn teardown(&mut self, connection: ConnectionId) {
        if let Some(entry) = self.connections.get_mut(&connection) {
            if entry.state.is_open() {
                entry.state = ConnectionState::Closing;
                entry.outbound = None;
            }
        }
        self.release_binding(connection);
    }

    fn release_binding(&mut self, connection: ConnectionId) {
        if let Some(player) = self.bindings.release_connection(connection) {
            tracing::info!(conn_id = %connection, player_id = %player, "binding released");
            self.directory
                .send(DirectoryMsg::RemovePlayer(player), &mut self.stats);
        }
    }
}

/// Spawns a gateway actor and returns a handle to it.
pub fn spawn_gateway<C: Codec>(codec: C, config: &RouterConfig) -> GatewayHandle {
    let (inner, receiver) = mailbox(Role::Gateway);
    let actor = GatewayActor {
        receiver,
        codec,
        directory: Peer::unbound(Role::Directory),
        connections: HashMap::new(),
        bindings: SessionBindings::new(),
        stats: RouteStats::default(),
    };
    tokio::spawn(actor.run());

    GatewayHandle {
        inner,
        send_queue_size: config.send_queue_size,
        idle_timeout: (config.idle_timeout_secs > 0).then(|| config.idle_timeout()),
    }
}

#[cfg(test)]
mod tests {
    //! Actor-level tests that drive the gateway through its mailbox with
    //! raw send queues instead of real connections.

    use rampart_protocol::{JsonCodec, MessageKind};

    use super::*;

    struct Harness {
        gateway: GatewayHandle,
        directory: mpsc::UnboundedReceiver<DirectoryMsg>,
        _directory_handle: ComponentHandle<DirectoryMsg>,
    }

    fn harness() -> Harness {
        let gateway = spawn_gateway(JsonCodec, &RouterConfig::default());
        let (directory_handle, directory) = mailbox::<DirectoryMsg>(Role::Directory);
        gateway
            .component()
            .bind_peer(PeerAddress::Directory(directory_handle.address()))
            .unwrap();
        Harness {
            gateway,
            directory,
            _directory_handle: directory_handle,
        }
    }

    fn register(h: &Harness, id: u64, capacity: usize) -> (ConnectionId, mpsc::Receiver<Vec<u8>>) {
        let id = ConnectionId::new(id);
        let (outbound, queue) = mpsc::channel(capacity);
        h.gateway
            .component()
            .send(GatewayMsg::Register { id, outbound })
            .unwrap();
        (id, queue)
    }

    fn envelope(kind: MessageKind, id: &str) -> GameEnvelope {
        GameEnvelope::new(kind, id, b"{}".to_vec())
    }

    fn decode(bytes: &[u8]) -> GameEnvelope {
        let frame: Frame = JsonCodec.decode(bytes).unwrap();
        assert_eq!(frame.kind, FrameKind::Game);
        JsonCodec.decode(&frame.payload).unwrap()
    }

    fn game_bytes(kind: &str, id: &str) -> Vec<u8> {
        let env = GameEnvelope {
            kind: kind.into(),
            id: id.into(),
            payload: vec![],
        };
        let frame = Frame::new(FrameKind::Game, JsonCodec.encode(&env).unwrap());
        JsonCodec.encode(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_inbound_game_frame_forwarded_with_origin() {
        let mut h = harness();
        let (c1, _q) = register(&h, 9001, 4);

        h.gateway
            .component()
            .send(GatewayMsg::Inbound {
                id: c1,
                bytes: game_bytes("player_join", ""),
            })
            .unwrap();

        match h.directory.recv().await {
            Some(DirectoryMsg::Inbound {
                origin,
                player,
                envelope,
            }) => {
                assert_eq!(origin, c1);
                assert_eq!(player, None);
                assert_eq!(envelope.kind, "player_join");
            }
            other => panic!("expected Inbound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inbound_garbage_counted_as_decode_failed() {
        let h = harness();
        let (c1, _q) = register(&h, 9002, 4);

        h.gateway
            .component()
            .send(GatewayMsg::Inbound {
                id: c1,
                bytes: b"\x00\x01garbage".to_vec(),
            })
            .unwrap();

        let stats = h.gateway.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::DecodeFailed), 1);
    }

    #[tokio::test]
    async fn test_deliver_to_unbound_player_dropped() {
        let h = harness();
        h.gateway
            .component()
            .send(GatewayMsg::Deliver {
                route: Route::Player(PlayerId(77)),
                envelope: envelope(MessageKind::Chat, "player_77"),
            })
            .unwrap();

        let stats = h.gateway.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::UnboundPlayer), 1);
        assert_eq!(stats.delivered(), 0);
    }

    #[tokio::test]
    async fn test_admitted_binds_and_writes_response() {
        let h = harness();
        let (c1, mut q1) = register(&h, 9003, 4);

        h.gateway
            .component()
            .send(GatewayMsg::Admitted {
                connection: c1,
                player: PlayerId(1),
                envelope: envelope(MessageKind::Admitted, "player_1"),
            })
            .unwrap();

        assert_eq!(h.gateway.bindings().await.unwrap(), vec![(c1, PlayerId(1))]);
        let written = decode(&q1.recv().await.unwrap());
        assert_eq!(written.kind, "player_join_response");
    }

    #[tokio::test]
    async fn test_admitted_for_bound_connection_is_refused() {
        let mut h = harness();
        let (c1, _q) = register(&h, 9004, 4);
        for player in [PlayerId(1), PlayerId(2)] {
            h.gateway
                .component()
                .send(GatewayMsg::Admitted {
                    connection: c1,
                    player,
                    envelope: envelope(MessageKind::Admitted, &player.to_string()),
                })
                .unwrap();
        }

        assert_eq!(h.gateway.bindings().await.unwrap(), vec![(c1, PlayerId(1))]);
        match h.directory.recv().await {
            Some(DirectoryMsg::RemovePlayer(p)) => assert_eq!(p, PlayerId(2)),
            other => panic!("expected RemovePlayer, got {other:?}"),
        }
        let stats = h.gateway.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::BindingConflict), 1);
    }

    #[tokio::test]
    async fn test_full_queue_tears_down_and_releases_binding() {
        let mut h = harness();
        let (c1, _q) = register(&h, 9005, 1);
        h.gateway
            .component()
            .send(GatewayMsg::Admitted {
                connection: c1,
                player: PlayerId(5),
                envelope: envelope(MessageKind::Admitted, "player_5"),
            })
            .unwrap();
        // The admission response fills the only slot; the next write fails.
        h.gateway
            .component()
            .send(GatewayMsg::Deliver {
                route: Route::Player(PlayerId(5)),
                envelope: envelope(MessageKind::Chat, "player_5"),
            })
            .unwrap();

        assert!(h.gateway.bindings().await.unwrap().is_empty());
        match h.directory.recv().await {
            Some(DirectoryMsg::RemovePlayer(p)) => assert_eq!(p, PlayerId(5)),
            other => panic!("expected RemovePlayer, got {other:?}"),
        }

        // Closing: further inbound traffic is ignored.
        h.gateway
            .component()
            .send(GatewayMsg::Inbound {
                id: c1,
                bytes: game_bytes("chat", "player_5"),
            })
            .unwrap();
        let stats = h.gateway.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::SendFailed), 1);
        assert_eq!(stats.dropped(DropReason::ConnectionClosing), 1);
    }

    #[tokio::test]
    async fn test_all_or_nothing_fanout_with_unbound_recipient_writes_nothing() {
        let h = harness();
        let (c1, mut q1) = register(&h, 9006, 4);
        h.gateway
            .component()
            .send(GatewayMsg::Admitted {
                connection: c1,
                player: PlayerId(1),
                envelope: envelope(MessageKind::Admitted, "player_1"),
            })
            .unwrap();
        q1.recv().await.unwrap();

        h.gateway
            .component()
            .send(GatewayMsg::Fanout {
                deliveries: vec![
                    (PlayerId(1), envelope(MessageKind::CombatResult, "player_1")),
                    (PlayerId(2), envelope(MessageKind::CombatResult, "player_2")),
                ],
                mode: FanoutMode::AllOrNothing,
            })
            .unwrap();

        let stats = h.gateway.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::ParticipantLeft), 2);
        assert!(q1.try_recv().is_err(), "no partial delivery");
    }
}
