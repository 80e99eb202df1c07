//! The address exchange: bootstrapping the component mesh.
//!
//! Components start in any order and know nobody. Once all of them are
//! running, the exchange hands each one the addresses of the peers it
//! depends on ([`Role::dependencies`]), exactly once:
//!
//! ```text
//!   gateway   ← directory
//!   directory ← gateway, combat
//!   combat    ← directory
//! ```
//!
//! The exchange is not repeated. If one component is replaced, call
//! [`AddressExchange::rebind`] with its new address: the new component
//! gets its dependencies and every component depending on it gets the new
//! address. Nothing else is re-sent.
//!
//! Every registered mailbox is checked for liveness before the first
//! address goes out, and delivered links are remembered, so a failed
//! exchange can be retried without handing anyone the same address twice.

use std::collections::HashSet;

use crate::{PeerAddress, Role, RouteError};

const ROLES: [Role; 3] = [Role::Gateway, Role::Directory, Role::Combat];

/// One-shot fan-out of component addresses.
#[derive(Debug, Default)]
pub struct AddressExchange {
    gateway: Option<PeerAddress>,
    directory: Option<PeerAddress>,
    combat: Option<PeerAddress>,
    // (target address id, dependency address id)
    delivered: HashSet<(u64, u64)>,
    completed: bool,
}

impl AddressExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a component's address. Registering the same role twice
    /// before the exchange keeps the later address.
    pub fn register(&mut self, address: impl Into<PeerAddress>) -> &mut Self {
        let address = address.into();
        let role = address.role();
        *self.slot(role) = Some(address);
        self
    }

    /// Returns `true` once [`exchange`](Self::exchange) has succeeded.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Delivers every dependency to every component.
    ///
    /// # Errors
    /// - [`RouteError::AlreadyExchanged`] on a second call
    /// - [`RouteError::ExchangeIncomplete`] if a role was never registered
    /// - [`RouteError::PeerUnavailable`] if a registered component has
    ///   already stopped; nothing is delivered in that case
    pub fn exchange(&mut self) -> Result<(), RouteError> {
        if self.completed {
            return Err(RouteError::AlreadyExchanged);
        }
        for role in ROLES {
            if !self.get(role)?.is_alive() {
                return Err(RouteError::PeerUnavailable(role));
            }
        }

        for role in ROLES {
            for dependency in role.dependencies() {
                self.link(role, *dependency)?;
            }
        }

        self.completed = true;
        tracing::info!("address exchange complete");
        Ok(())
    }

    /// Replaces one component's address after a restart and repairs every
    /// link that involves it.
    ///
    /// # Errors
    /// - [`RouteError::ExchangeIncomplete`] if the initial exchange hasn't
    ///   happened yet (use [`register`](Self::register) before it)
    /// - [`RouteError::PeerUnavailable`] if a component is gone
    pub fn rebind(&mut self, address: impl Into<PeerAddress>) -> Result<(), RouteError> {
        let address = address.into();
        let role = address.role();
        if !self.completed {
            return Err(RouteError::ExchangeIncomplete(role));
        }
        *self.slot(role) = Some(address);

        for other in ROLES {
            if !self.get(other)?.is_alive() {
                return Err(RouteError::PeerUnavailable(other));
            }
        }
        for dependency in role.dependencies() {
            self.link(role, *dependency)?;
        }
        for other in ROLES {
            if other != role && other.dependencies().contains(&role) {
                self.link(other, role)?;
            }
        }

        tracing::info!(%role, "component rebound");
        Ok(())
    }

    /// Hands `target` the address registered for `dependency`, unless that
    /// exact pair was already linked.
    fn link(&mut self, target: Role, dependency: Role) -> Result<(), RouteError> {
        let to = self.get(target)?;
        let from = self.get(dependency)?;
        let key = (to.id(), from.id());
        if self.delivered.contains(&key) {
            return Ok(());
        }
        from.deliver_to(to)?;
        self.delivered.insert(key);
        Ok(())
    }

    fn get(&self, role: Role) -> Result<&PeerAddress, RouteError> {
        match role {
            Role::Gateway => self.gateway.as_ref(),
            Role::Directory => self.directory.as_ref(),
            Role::Combat => self.combat.as_ref(),
        }
        .ok_or(RouteError::ExchangeIncomplete(role))
    }

    fn slot(&mut self, role: Role) -> &mut Option<PeerAddress> {
        match role {
            Role::Gateway => &mut self.gateway,
            Role::Directory => &mut self.directory,
            Role::Combat => &mut self.combat,
        }
    }
}
