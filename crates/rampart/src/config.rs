//! Server configuration, loaded from a JSON file.
//!
//! Every section has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! {
//!   "bind_addr": "0.0.0.0:9000",
//!   "router": { "max_players": 64 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use rampart_router::RouterConfig;
use rampart_session::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::RampartError;

/// Top-level configuration for a [`RampartServer`](crate::RampartServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// A client that hasn't finished the WebSocket upgrade after this long
    /// is dropped.
    pub handshake_timeout_ms: u64,

    pub router: RouterConfig,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            log_filter: "info".to_string(),
            handshake_timeout_ms: 5_000,
            router: RouterConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RampartError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RampartError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|e| match e {
            RampartError::ConfigParse { source, .. } => RampartError::ConfigParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parses a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, RampartError> {
        serde_json::from_str(text).map_err(|source| RampartError::ConfigParse {
            path: "<inline>".to_string(),
            source,
        })
    }
}
