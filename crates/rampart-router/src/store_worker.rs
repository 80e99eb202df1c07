//! Session persistence, off the directory's mailbox loop.
//!
//! The directory never awaits its [`PlayerStore`]. It queues jobs here and
//! keeps routing. Writes are fire-and-forget; a resume lookup answers with
//! [`DirectoryMsg::Restored`]. Jobs run one at a time in queue order, so a
//! lookup always sees every write queued before it.
//!
//! The worker stops once the directory drops its end of the queue, after
//! draining whatever writes were still pending.

use std::time::Duration;

use rampart_protocol::{AdmitRequest, PlayerId};
use rampart_session::{PlayerSession, PlayerStore};
use rampart_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::{Address, DirectoryMsg};

#[derive(Debug)]
pub(crate) enum StoreJob {
    Save(PlayerSession),
    Delete(PlayerId),
    /// Look up the session named by `request.resume` and hand the result
    /// back to the directory.
    Load {
        origin: ConnectionId,
        correlation: String,
        request: AdmitRequest,
    },
}

struct StoreWorker<S: PlayerStore> {
    jobs: mpsc::UnboundedReceiver<StoreJob>,
    store: S,
    timeout: Duration,
    directory: Address<DirectoryMsg>,
}

impl<S: PlayerStore> StoreWorker<S> {
    async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            match job {
                StoreJob::Save(session) => self.save(&session).await,
                StoreJob::Delete(player) => self.delete(player).await,
                StoreJob::Load {
                    origin,
                    correlation,
                    request,
                } => {
                    let stored = match &request.resume {
                        Some(ticket) => self.load(ticket.id).await,
                        None => None,
                    };
                    let restored = DirectoryMsg::Restored {
                        origin,
                        correlation,
                        request,
                        stored,
                    };
                    if self.directory.send(restored).is_err() {
                        tracing::debug!(conn_id = %origin, "directory gone, dropping resume lookup");
                    }
                }
            }
        }
        tracing::debug!("store worker stopped");
    }

    /// Any store failure reads as "nothing stored".
    async fn load(&self, player: PlayerId) -> Option<PlayerSession> {
        match tokio::time::timeout(self.timeout, self.store.get(player)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!(player_id = %player, error = %e, "store unavailable, cannot resume");
                None
            }
            Err(_) => {
                tracing::warn!(player_id = %player, "store timed out, cannot resume");
                None
            }
        }
    }

    async fn save(&self, session: &PlayerSession) {
        match tokio::time::timeout(self.timeout, self.store.put(session)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(player_id = %session.id, error = %e, "store unavailable, session is in-memory only");
            }
            Err(_) => {
                tracing::warn!(player_id = %session.id, "store timed out, session is in-memory only");
            }
        }
    }

    async fn delete(&self, player: PlayerId) {
        match tokio::time::timeout(self.timeout, self.store.delete(player)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(player_id = %player, error = %e, "store delete failed"),
            Err(_) => tracing::warn!(player_id = %player, "store delete timed out"),
        }
    }
}

/// Spawns the worker and returns its job queue.
pub(crate) fn spawn_store_worker<S: PlayerStore>(
    store: S,
    timeout: Duration,
    directory: Address<DirectoryMsg>,
) -> mpsc::UnboundedSender<StoreJob> {
    let (jobs_tx, jobs) = mpsc::unbounded_channel();
    let worker = StoreWorker {
        jobs,
        store,
        timeout,
        directory,
    };
    tokio::spawn(worker.run());
    jobs_tx
}
