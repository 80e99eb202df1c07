//! `RampartServer` builder and accept loop.
//!
//! This is the entry point for running a Rampart game server. It ties
//! the layers together: the WebSocket transport accepts connections and
//! hands each one to the router's gateway, which takes it from there.
//!
//! The accept loop only takes TCP streams off the listener. Each upgrade
//! runs on its own task under the handshake timeout, so a client that
//! connects and goes quiet doesn't hold up anyone else.

use std::future::Future;
use std::net::SocketAddr;

use rampart_protocol::JsonCodec;
use rampart_router::{
    CoinFlip, CombatPolicy, GatewayHandle, Role, RouteError, Router, RouterConfig,
};
use rampart_session::{MemoryStore, PlayerStore};
use rampart_transport::{PendingHandshake, WebSocketTransport};

use crate::{RampartError, ServerConfig};

/// Builder for configuring and starting a Rampart server.
///
/// # Example
///
/// ```rust,ignore
/// use rampart::prelude::*;
///
/// let server = RampartServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run_until(tokio::signal::ctrl_c()).await
/// ```
#[derive(Debug, Clone, Default)]
pub struct RampartServerBuilder {
    config: ServerConfig,
}

impl RampartServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a loaded configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the routing limits and timeouts.
    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.config.router = config;
        self
    }

    /// Binds the listener and starts the router with the defaults: an
    /// in-memory store and coin-flip combat.
    pub async fn build(self) -> Result<RampartServer, RampartError> {
        let store = MemoryStore::new(self.config.store.clone());
        self.build_with(store, CoinFlip::new()).await
    }

    /// Binds the listener and starts the router with a custom store and
    /// combat policy.
    pub async fn build_with<S, P>(self, store: S, policy: P) -> Result<RampartServer, RampartError>
    where
        S: PlayerStore,
        P: CombatPolicy,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout());
        let router = Router::start(&self.config.router, JsonCodec, store, policy)?;
        Ok(RampartServer { transport, router })
    }
}

/// A running Rampart game server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct RampartServer {
    transport: WebSocketTransport,
    router: Router,
}

impl RampartServer {
    /// Creates a new builder.
    pub fn builder() -> RampartServerBuilder {
        RampartServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The routing core, for inspection.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RampartError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `signal` completes, then shuts the
    /// router down and waits for it.
    pub async fn run_until<F>(self, signal: F) -> Result<(), RampartError>
    where
        F: Future,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "Rampart server running");
        tokio::pin!(signal);

        loop {
            let accepted = tokio::select! {
                _ = &mut signal => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                accepted = self.transport.accept_pending() => accepted,
            };

            match accepted {
                Ok(pending) => {
                    let gateway = self.router.gateway().clone();
                    if gateway.component().is_stopped() {
                        tracing::error!("gateway unavailable, stopping");
                        self.router.shutdown().await;
                        return Err(RouteError::PeerUnavailable(Role::Gateway).into());
                    }
                    tokio::spawn(upgrade_and_attach(pending, gateway));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }

        self.router.shutdown().await;
        Ok(())
    }
}

/// Completes one client's upgrade and hands the connection to the gateway.
async fn upgrade_and_attach(pending: PendingHandshake, gateway: GatewayHandle) {
    let peer = pending.peer_addr();
    match pending.upgrade().await {
        Ok(conn) => {
            if let Err(e) = gateway.accept(conn) {
                tracing::warn!(%peer, error = %e, "gateway unavailable, dropping connection");
            }
        }
        Err(e) => tracing::debug!(%peer, error = %e, "handshake failed"),
    }
}
