//! The storage boundary: where player sessions live between connections.
//!
//! Rampart doesn't ship a database client. It defines the [`PlayerStore`]
//! trait (get/put/delete by player ID), and the router calls it on
//! admission and removal from a worker task beside the directory.
//! [`MemoryStore`] is provided for development and tests; a Redis- or
//! SQL-backed store implements the same three methods.
//!
//! Callers treat every error as "no persistence this time": a store that
//! is down degrades admission to an in-memory session, it never fails it.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use rampart_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{PlayerSession, StoreError};

/// Key-value persistence for player sessions.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the store is owned by the router's store
///   worker, which runs as a spawned Tokio task.
/// - Returned futures are `Send` for the same reason.
pub trait PlayerStore: Send + Sync + 'static {
    /// Loads a player's session, or `None` if nothing is stored.
    fn get(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerSession>, StoreError>> + Send;

    /// Stores (or overwrites) a player's session.
    fn put(
        &self,
        session: &PlayerSession,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a player's session. Deleting a missing key is not an error.
    fn delete(&self, id: PlayerId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Storage parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prepended to the player ID to form the record key.
    pub key_prefix: String,

    /// Record lifetime in seconds; 0 keeps records forever.
    pub ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "player:".to_string(),
            ttl_secs: 86_400,
        }
    }
}

impl StoreConfig {
    /// The record key for `id`, e.g. `player:player_3`.
    pub fn key(&self, id: PlayerId) -> String {
        format!("{}{id}", self.key_prefix)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// An in-process [`PlayerStore`] backed by a `HashMap`.
///
/// Records expire `ttl_secs` after they were last written. Expired
/// records are dropped lazily on the next `get`.
#[derive(Debug)]
pub struct MemoryStore {
    config: StoreConfig,
    ttl: Option<Duration>,
    records: Mutex<HashMap<String, Record>>,
}

#[derive(Debug)]
struct Record {
    session: PlayerSession,
    written: Instant,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self {
            config,
            ttl,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl PlayerStore for MemoryStore {
    async fn get(&self, id: PlayerId) -> Result<Option<PlayerSession>, StoreError> {
        let key = self.config.key(id);
        let mut records = self.records.lock().await;

        let expired = match (records.get(&key), self.ttl) {
            (Some(record), Some(ttl)) => record.written.elapsed() >= ttl,
            _ => false,
        };
        if expired {
            records.remove(&key);
            tracing::debug!(%key, "stored session expired");
            return Ok(None);
        }

        Ok(records.get(&key).map(|record| record.session.clone()))
    }

    async fn put(&self, session: &PlayerSession) -> Result<(), StoreError> {
        let key = self.config.key(session.id);
        self.records.lock().await.insert(
            key,
            Record {
                session: session.clone(),
                written: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: PlayerId) -> Result<(), StoreError> {
        self.records.lock().await.remove(&self.config.key(id));
        Ok(())
    }
}
