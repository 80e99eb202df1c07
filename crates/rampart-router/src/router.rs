//! One running gateway, directory and combat worker, wired together.

use rampart_protocol::Codec;
use rampart_session::PlayerStore;

use crate::{
    AddressExchange, CombatHandle, CombatPolicy, DirectoryHandle, GatewayHandle,
    RouteError, RouterConfig, spawn_combat, spawn_directory, spawn_gateway,
};

/// The routing core.
///
/// Owns the strong handles of all three components: dropping the router
/// closes their mailboxes and they stop on their own.
#[derive(Debug)]
pub struct Router {
    gateway: GatewayHandle,
    directory: DirectoryHandle,
    combat: CombatHandle,
    exchange: AddressExchange,
}

impl Router {
    /// Spawns every component and runs the address exchange.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Whatever [`AddressExchange::exchange`] reports. In practice this
    /// only happens if a component stopped before the exchange ran.
    pub fn start<C, S, P>(
        config: &RouterConfig,
        codec: C,
        store: S,
        policy: P,
    ) -> Result<Self, RouteError>
    where
        C: Codec + Clone,
        S: PlayerStore,
        P: CombatPolicy,
    {
        let gateway = spawn_gateway(codec.clone(), config);
        let directory = spawn_directory(codec, store, config);
        let combat = spawn_combat(policy);

        let mut exchange = AddressExchange::new();
        exchange
            .register(gateway.address())
            .register(directory.address())
            .register(combat.address());
        exchange.exchange()?;

        tracing::info!(
            max_players = config.max_players,
            send_queue_size = config.send_queue_size,
            "router started"
        );
        Ok(Self {
            gateway,
            directory,
            combat,
            exchange,
        })
    }

    pub fn gateway(&self) -> &GatewayHandle {
        &self.gateway
    }

    pub fn directory(&self) -> &DirectoryHandle {
        &self.directory
    }

    pub fn combat(&self) -> &CombatHandle {
        &self.combat
    }

    /// Swaps in a fresh combat worker, e.g. after the old one died.
    ///
    /// Requests still pending with the old worker time out normally.
    pub fn restart_combat<P: CombatPolicy>(&mut self, policy: P) -> Result<(), RouteError> {
        let combat = spawn_combat(policy);
        self.exchange.rebind(combat.address())?;
        let old = std::mem::replace(&mut self.combat, combat);
        let _ = old.shutdown();
        Ok(())
    }

    /// Stops every component and waits for them to finish.
    ///
    /// The gateway goes first so no new traffic enters while the
    /// directory drains.
    pub async fn shutdown(self) {
        let _ = self.gateway.shutdown();
        self.gateway.stopped().await;
        let _ = self.directory.shutdown();
        self.directory.stopped().await;
        let _ = self.combat.shutdown();
        self.combat.stopped().await;
        tracing::info!("router stopped");
    }
}
