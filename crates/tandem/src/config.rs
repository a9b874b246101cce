//! Server configuration loaded from environment variables.

use std::time::Duration;

use tandem_room::RegistryConfig;

/// Address used when neither `TANDEM_BIND` nor `PORT` is set.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";

/// Log level used when neither `RUST_LOG` nor `TANDEM_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// An environment variable held a value the server can't use.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub log_level: String,
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, after reading a
    /// `.env` file if one is present.
    ///
    /// All optional:
    /// - `TANDEM_BIND`: listen address, e.g. `0.0.0.0:3001`
    /// - `PORT`: used as `0.0.0.0:$PORT` when `TANDEM_BIND` is unset
    /// - `TANDEM_LOG`: default log filter when `RUST_LOG` is unset
    /// - `TANDEM_IDLE_TIMEOUT_SECS`: close Waiting rooms idle this long
    /// - `TANDEM_SWEEP_INTERVAL_SECS`: how often to look for idle rooms
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is not a port number or
    /// either duration is not a positive whole number of seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("TANDEM_BIND") {
            config.bind_addr = bind;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: port.clone(),
                reason: "expected a port number".into(),
            })?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(level) = lookup("TANDEM_LOG") {
            config.log_level = level;
        }

        if let Some(secs) = lookup("TANDEM_IDLE_TIMEOUT_SECS") {
            config.registry.idle_timeout =
                Some(parse_secs("TANDEM_IDLE_TIMEOUT_SECS", secs)?);
        }

        if let Some(secs) = lookup("TANDEM_SWEEP_INTERVAL_SECS") {
            config.registry.sweep_interval =
                parse_secs("TANDEM_SWEEP_INTERVAL_SECS", secs)?;
        }

        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a positive number of seconds".into(),
        }),
    }
}
