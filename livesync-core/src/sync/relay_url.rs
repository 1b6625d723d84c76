//! Relay address handling.

/// Base address of a relay, normalized for HTTP and WebSocket use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayUrl {
    http_base: String,
}

impl RelayUrl {
    /// Accepts `http(s)://`, `ws(s)://` or a bare `host:port`.
    pub fn new(relay: &str) -> Self {
        let relay = relay.trim().trim_end_matches('/');
        let http_base = if let Some(rest) = relay.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else if let Some(rest) = relay.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if relay.starts_with("http://") || relay.starts_with("https://") {
            relay.to_string()
        } else {
            format!("http://{}", relay)
        };

        Self { http_base }
    }

    /// URL of the session bootstrap endpoint.
    pub fn bootstrap_url(&self) -> String {
        format!("{}/session", self.http_base)
    }

    /// WebSocket URL of a session's collaboration channel.
    pub fn session_url(&self, session_id: &str) -> String {
        let ws_base = if let Some(rest) = self.http_base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.http_base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.http_base.clone()
        };

        format!("{}/session/{}", ws_base, session_id)
    }
}

impl std::fmt::Display for RelayUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.http_base)
    }
}
