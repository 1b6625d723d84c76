//! Relay configuration.
//!
//! Environment variables:
//! - `LIVESYNC_HOST`: Address to bind (default: 0.0.0.0)
//! - `LIVESYNC_PORT`: Port to listen on (default: 8787)
//! - `LIVESYNC_SESSION_IDLE_SECS`: Seconds an empty session is kept before its
//!   document is dropped (default: 600)

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(600);

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// How long a session with no peers survives
    pub session_idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            session_idle_timeout: DEFAULT_SESSION_IDLE,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let host = var("LIVESYNC_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = var("LIVESYNC_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let session_idle_timeout = var("LIVESYNC_SESSION_IDLE_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_IDLE);

        Self {
            host,
            port,
            session_idle_timeout,
        }
    }

    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
