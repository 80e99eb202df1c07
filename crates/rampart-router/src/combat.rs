//! The combat worker and its pluggable outcome policies.
//!
//! The worker knows nothing about connections or the gateway. It receives
//! two combatants (IDs plus the stats the directory attached), asks its
//! [`CombatPolicy`] for an outcome, and sends the outcome back to the
//! directory tagged with the same ticket and correlation id it arrived
//! with.

use rampart_protocol::{CombatOutcome, PlayerId};
use rampart_session::PlayerStats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, oneshot};

use crate::mailbox::{ComponentHandle, MailboxMessage, Peer, mailbox};
use crate::{DirectoryMsg, PeerAddress, Role, RouteStats};

/// One side of a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub id: PlayerId,
    pub stats: PlayerStats,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Decides who wins.
///
/// Implementations must return a winner and a loser that are exactly the
/// two combatants given, in either order. The magnitude is unsigned, so
/// it is never negative.
pub trait CombatPolicy: Send + 'static {
    fn resolve(&mut self, attacker: &Combatant, defender: &Combatant) -> CombatOutcome;
}

/// Unweighted coin flip. Stats are ignored; damage is uniform in `10..60`.
#[derive(Debug)]
pub struct CoinFlip {
    rng: StdRng,
}

impl CoinFlip {
    /// A coin flip seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// A reproducible coin flip.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for CoinFlip {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatPolicy for CoinFlip {
    fn resolve(&mut self, attacker: &Combatant, defender: &Combatant) -> CombatOutcome {
        let (winner, loser) = if self.rng.random_bool(0.5) {
            (attacker, defender)
        } else {
            (defender, attacker)
        };
        CombatOutcome {
            winner_id: winner.id,
            loser_id: loser.id,
            damage_dealt: self.rng.random_range(10..60),
        }
    }
}

/// Deterministic, stat-driven outcome.
///
/// Attack power is `attack + level`, guard is `defense + level`. The
/// attacker wins if its power beats the defender's guard, dealing the
/// difference. Otherwise the defender wins and deals the margin by which
/// the guard held (zero on a tie).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatWeighted;

impl CombatPolicy for StatWeighted {
    fn resolve(&mut self, attacker: &Combatant, defender: &Combatant) -> CombatOutcome {
        let power = attacker.stats.attack + attacker.stats.level;
        let guard = defender.stats.defense + defender.stats.level;
        if power > guard {
            CombatOutcome {
                winner_id: attacker.id,
                loser_id: defender.id,
                damage_dealt: power - guard,
            }
        } else {
            CombatOutcome {
                winner_id: defender.id,
                loser_id: attacker.id,
                damage_dealt: guard - power,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Messages the combat worker understands.
#[derive(Debug)]
pub enum CombatMsg {
    Peer(PeerAddress),

    /// Compute an outcome and send it to the directory.
    Resolve {
        /// Directory-internal request number, echoed back.
        ticket: u64,
        /// Original message id, echoed back.
        correlation: String,
        attacker: Combatant,
        defender: Combatant,
    },

    Stats(oneshot::Sender<RouteStats>),
    Shutdown,
}

impl MailboxMessage for CombatMsg {
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

pub type CombatHandle = ComponentHandle<CombatMsg>;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct CombatActor<P: CombatPolicy> {
    receiver: mpsc::UnboundedReceiver<CombatMsg>,
    policy: P,
    directory: Peer<DirectoryMsg>,
    stats: RouteStats,
}

impl<P: CombatPolicy> CombatActor<P> {
    async fn run(mut self) {
        tracing::info!("combat worker started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                CombatMsg::Peer(PeerAddress::Directory(address)) => {
                    self.directory.bind(address);
                }
                CombatMsg::Peer(other) => {
                    tracing::debug!(role = %other.role(), "ignoring unneeded peer");
                }
                CombatMsg::Resolve {
                    ticket,
                    correlation,
                    attacker,
                    defender,
                } => {
                    let outcome = self.policy.resolve(&attacker, &defender);
                    tracing::debug!(
                        ticket,
                        attacker = %attacker.id,
                        defender = %defender.id,
                        winner = %outcome.winner_id,
                        damage = outcome.damage_dealt,
                        "combat resolved"
                    );
                    self.directory.send(
                        DirectoryMsg::CombatResolved {
                            ticket,
                            correlation,
                            outcome,
                        },
                        &mut self.stats,
                    );
                }
                CombatMsg::Stats(reply) => {
                    let _ = reply.send(self.stats.clone());
                }
                CombatMsg::Shutdown => {
                    tracing::info!("combat worker shutting down");
                    break;
                }
            }
        }

        tracing::info!("combat worker stopped");
    }
}

/// Spawns a combat worker and returns a handle to it.
pub fn spawn_combat<P: CombatPolicy>(policy: P) -> CombatHandle {
    let (handle, receiver) = mailbox(Role::Combat);
    let actor = CombatActor {
        receiver,
        policy,
        directory: Peer::unbound(Role::Directory),
        stats: RouteStats::default(),
    };
    tokio::spawn(actor.run());
    handle
}
