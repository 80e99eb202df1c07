//! Mailboxes, addresses, and peer slots.
//!
//! Every component runs as one Tokio task draining one unbounded mpsc
//! channel, one message at a time. The pieces here are how the rest of
//! the world reaches that channel:
//!
//! - [`ComponentHandle`] holds the *strong* sender. Whoever owns the
//!   handle keeps the component alive; dropping every handle closes the
//!   mailbox and the actor loop ends.
//! - [`Address`] holds a *weak* sender. Components hand these to each
//!   other during the address exchange. An address can send but never
//!   keeps its target alive, so the peers don't form a reference cycle.
//! - [`Peer`] is a component's slot for one address it depends on.
//!   Sending through an empty slot is a logged, counted no-op.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::{
    CombatMsg, DirectoryMsg, DropReason, GatewayMsg, RouteError, RouteStats,
};

static NEXT_ADDRESS_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which component a mailbox belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Gateway,
    Directory,
    Combat,
}

impl Role {
    /// The peers a component of this role must be given before it can do
    /// its job.
    pub fn dependencies(self) -> &'static [Role] {
        match self {
            Self::Gateway => &[Role::Directory],
            Self::Directory => &[Role::Gateway, Role::Combat],
            Self::Combat => &[Role::Directory],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gateway => "gateway",
            Self::Directory => "directory",
            Self::Combat => "combat",
        })
    }
}

// ---------------------------------------------------------------------------
// MailboxMessage
// ---------------------------------------------------------------------------

/// The control messages every component's mailbox understands, on top of
/// its own domain messages.
pub trait MailboxMessage: Send + 'static {
    /// "Here is the address of one of your peers."
    fn peer(address: PeerAddress) -> Self;

    /// "Reply with your counters."
    fn stats(reply: oneshot::Sender<RouteStats>) -> Self;

    /// "Stop after this message."
    fn shutdown() -> Self;
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An opaque, comparable handle to a component's mailbox.
///
/// Two addresses are equal when they point at the same mailbox instance.
/// A restarted component gets a fresh address that compares unequal to
/// the old one.
pub struct Address<M> {
    id: u64,
    role: Role,
    sender: mpsc::WeakUnboundedSender<M>,
}

impl<M> Address<M> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Delivers a message to the mailbox.
    ///
    /// # Errors
    /// [`RouteError::PeerUnavailable`] if the component has stopped.
    pub fn send(&self, msg: M) -> Result<(), RouteError> {
        let sender = self
            .sender
            .upgrade()
            .ok_or(RouteError::PeerUnavailable(self.role))?;
        sender
            .send(msg)
            .map_err(|_| RouteError::PeerUnavailable(self.role))
    }

    /// Returns `true` while the mailbox still has a receiver.
    pub fn is_alive(&self) -> bool {
        self.sender
            .upgrade()
            .is_some_and(|sender| !sender.is_closed())
    }
}

// Manual impls: deriving would demand `M: Clone` / `M: PartialEq`.
impl<M> Clone for Address<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            role: self.role,
            sender: self.sender.clone(),
        }
    }
}

impl<M> PartialEq for Address<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M> Eq for Address<M> {}

impl<M> Hash for Address<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<M> fmt::Debug for Address<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}#{})", self.role, self.id)
    }
}

// ---------------------------------------------------------------------------
// PeerAddress
// ---------------------------------------------------------------------------

/// An address of any component, tagged with its role.
///
/// This is what travels in `Peer` control messages during the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    Gateway(Address<GatewayMsg>),
    Directory(Address<DirectoryMsg>),
    Combat(Address<CombatMsg>),
}

impl PeerAddress {
    pub fn role(&self) -> Role {
        match self {
            Self::Gateway(_) => Role::Gateway,
            Self::Directory(_) => Role::Directory,
            Self::Combat(_) => Role::Combat,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Gateway(addr) => addr.id(),
            Self::Directory(addr) => addr.id(),
            Self::Combat(addr) => addr.id(),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Self::Gateway(addr) => addr.is_alive(),
            Self::Directory(addr) => addr.is_alive(),
            Self::Combat(addr) => addr.is_alive(),
        }
    }

    /// Delivers this address to `target` as a `Peer` message.
    pub(crate) fn deliver_to(&self, target: &PeerAddress) -> Result<(), RouteError> {
        match target {
            Self::Gateway(addr) => addr.send(GatewayMsg::peer(self.clone())),
            Self::Directory(addr) => addr.send(DirectoryMsg::peer(self.clone())),
            Self::Combat(addr) => addr.send(CombatMsg::peer(self.clone())),
        }
    }
}

impl From<Address<GatewayMsg>> for PeerAddress {
    fn from(addr: Address<GatewayMsg>) -> Self {
        Self::Gateway(addr)
    }
}

impl From<Address<DirectoryMsg>> for PeerAddress {
    fn from(addr: Address<DirectoryMsg>) -> Self {
        Self::Directory(addr)
    }
}

impl From<Address<CombatMsg>> for PeerAddress {
    fn from(addr: Address<CombatMsg>) -> Self {
        Self::Combat(addr)
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// A component's slot for the address of one peer.
///
/// Empty until the exchange fills it. Sending through an empty slot, or to
/// a peer that has stopped, is a no-op recorded as
/// [`DropReason::PeerUnavailable`].
pub(crate) struct Peer<M> {
    role: Role,
    address: Option<Address<M>>,
}

impl<M> Peer<M> {
    pub(crate) fn unbound(role: Role) -> Self {
        Self {
            role,
            address: None,
        }
    }

    /// Stores (or replaces) the peer's address.
    pub(crate) fn bind(&mut self, address: Address<M>) {
        match &self.address {
            Some(old) if *old != address => {
                tracing::info!(
                    peer = %self.role,
                    old = old.id(),
                    new = address.id(),
                    "peer rebound"
                );
            }
            Some(_) => {}
            None => tracing::debug!(peer = %self.role, "peer bound"),
        }
        self.address = Some(address);
    }

    /// Sends `msg` to the peer. Returns `false` (and counts the drop) if
    /// the peer is unknown or gone.
    pub(crate) fn send(&self, msg: M, stats: &mut RouteStats) -> bool {
        let result = match &self.address {
            Some(address) => address.send(msg),
            None => Err(RouteError::PeerUnavailable(self.role)),
        };
        match result {
            Ok(()) => {
                stats.record_delivery();
                true
            }
            Err(e) => {
                tracing::warn!(
                    peer = %self.role,
                    bound = self.address.is_some(),
                    error = %e,
                    "dropping message"
                );
                stats.record_drop(DropReason::PeerUnavailable);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentHandle
// ---------------------------------------------------------------------------

/// Owning handle to a running component.
///
/// Cheap to clone. The component stops when it receives `Shutdown` or
/// when the last handle is dropped.
pub struct ComponentHandle<M> {
    address: Address<M>,
    sender: mpsc::UnboundedSender<M>,
}

impl<M> Clone for ComponentHandle<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<M> fmt::Debug for ComponentHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("address", &self.address)
            .finish()
    }
}

/// Creates a mailbox for a component of `role`.
///
/// Returns the owning handle and the receiving end the actor drains.
pub fn mailbox<M>(role: Role) -> (ComponentHandle<M>, mpsc::UnboundedReceiver<M>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let address = Address {
        id: NEXT_ADDRESS_ID.fetch_add(1, Ordering::Relaxed),
        role,
        sender: sender.downgrade(),
    };
    (ComponentHandle { address, sender }, receiver)
}

impl<M: MailboxMessage> ComponentHandle<M> {
    /// A weak address for this component, suitable for handing to peers.
    pub fn address(&self) -> Address<M> {
        self.address.clone()
    }

    pub fn role(&self) -> Role {
        self.address.role
    }

    /// Sends a message through the strong sender.
    pub fn send(&self, msg: M) -> Result<(), RouteError> {
        self.sender
            .send(msg)
            .map_err(|_| RouteError::PeerUnavailable(self.role()))
    }

    /// Hands this component one peer address. The exchange uses this; it
    /// is also the manual way to repair a single link.
    pub fn bind_peer(&self, peer: PeerAddress) -> Result<(), RouteError> {
        self.send(M::peer(peer))
    }

    /// Asks the component for its delivery/drop counters.
    pub async fn stats(&self) -> Result<RouteStats, RouteError> {
        let (reply, rx) = oneshot::channel();
        self.send(M::stats(reply))?;
        rx.await.map_err(|_| RouteError::PeerUnavailable(self.role()))
    }

    /// Tells the component to stop.
    pub fn shutdown(&self) -> Result<(), RouteError> {
        self.send(M::shutdown())
    }

    /// Resolves once the component's actor loop has ended.
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    /// Returns `true` if the actor loop has ended.
    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }
}
