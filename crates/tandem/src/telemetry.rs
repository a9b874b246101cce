//! Structured logging setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise everything logs at `log_level`
/// except the WebSocket library, which is held to warnings. Calling this
/// more than once is harmless: later calls leave the first subscriber in
/// place.
pub fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{log_level},tungstenite=warn,tokio_tungstenite=warn").into()
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
