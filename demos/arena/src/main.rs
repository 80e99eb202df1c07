//! Runs a Rampart arena server.
//!
//! ```text
//! cargo run -p arena -- [config.json]
//! ```
//!
//! Without a config path every setting takes its default. Stop with Ctrl-C.

use rampart::prelude::*;

#[tokio::main]
async fn main() -> Result<(), RampartError> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default(),
    };
    rampart::logging::init(&config.log_filter);

    let server = RampartServer::builder().config(config).build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!("arena listening on ws://{addr}");
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await
}
