//! Tic-tac-toe coordinator.
//!
//! Browsers open `ws://<addr>`, send `{"event":"joinGame","data":<roomKey>}`
//! and then relay `move` / `resetGame` events to each other. Settings come
//! from the environment (see `ServerConfig::from_env`).
//!
//! Run with: `cargo run -p tic-tac-toe`

use tandem::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    init_tracing(&config.log_level);

    let server = TandemServerBuilder::from_config(&config).build().await?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %server.local_addr()?,
        idle_timeout = ?config.registry.idle_timeout,
        "tic-tac-toe coordinator listening"
    );

    server.run().await?;
    Ok(())
}
