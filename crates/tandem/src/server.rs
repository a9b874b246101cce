//! `TandemServer` builder and server loop.
//!
//! This is the entry point for running a coordinator. It ties the layers
//! together: transport → protocol → room registry.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tandem_protocol::{Codec, JsonCodec};
use tandem_room::{Registry, RegistryConfig};
use tandem_transport::{Transport, WebSocketTransport};
use tokio::time::MissedTickBehavior;

use crate::handler::handle_connection;
use crate::{ServerConfig, TandemError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The registry
/// does its own locking.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Arc<Registry>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Tandem server.
///
/// # Example
///
/// ```rust,ignore
/// use tandem::prelude::*;
///
/// let server = TandemServer::builder()
///     .bind("0.0.0.0:3001")
///     .idle_timeout(Duration::from_secs(600))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TandemServerBuilder {
    bind_addr: String,
    registry: RegistryConfig,
}

impl TandemServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            registry: config.registry.clone(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Closes Waiting rooms that have been idle this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.registry.idle_timeout = Some(timeout);
        self
    }

    /// Sets how often the idle sweep runs.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.registry.sweep_interval = interval;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<TandemServer<JsonCodec>, TandemError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(Registry::new(self.registry)),
            codec: JsonCodec,
        });

        Ok(TandemServer { transport, state })
    }
}

impl Default for TandemServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tandem server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TandemServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl TandemServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> TandemServerBuilder {
        TandemServerBuilder::new()
    }
}

impl<C: Codec> TandemServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the registry shared by every connection.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// A failed accept or handshake is logged and the loop moves on. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), TandemError> {
        tracing::info!("Tandem server running");

        let config = self.state.registry.config();
        if let Some(max_idle) = config.idle_timeout {
            tokio::spawn(sweep_idle_rooms(
                Arc::downgrade(&self.state.registry),
                max_idle,
                config.sweep_interval,
            ));
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically closes idle Waiting rooms until the registry is dropped.
async fn sweep_idle_rooms(
    registry: Weak<Registry>,
    max_idle: Duration,
    every: Duration,
) {
    tracing::info!(?max_idle, ?every, "idle sweep enabled");

    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(registry) = registry.upgrade() else {
            break;
        };
        registry.sweep_idle(max_idle).await;
    }
}
