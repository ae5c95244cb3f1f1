//! Server configuration.

use docfeed_protocol::MAX_HEADERS_PER_MESSAGE;
use std::net::SocketAddr;

/// Cookie carrying the shared secret unless configured otherwise.
pub const DEFAULT_SECRET_NAME: &str = "docfeed_secret";

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum headers in one `update_headers` message.
    pub max_headers_per_message: usize,
    /// Frames buffered per connection before a slow peer is dropped.
    pub outbound_queue_capacity: usize,
    /// Shared secret required on the WebSocket handshake, if any.
    pub secret: Option<String>,
    /// Cookie name the secret is read from.
    pub secret_name: String,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_headers_per_message: MAX_HEADERS_PER_MESSAGE,
            outbound_queue_capacity: 4096,
            secret: None,
            secret_name: DEFAULT_SECRET_NAME.to_string(),
        }
    }

    /// Sets the per-message header limit (at least one).
    pub fn with_max_headers_per_message(mut self, max: usize) -> Self {
        self.max_headers_per_message = max.max(1);
        self
    }

    /// Sets the per-connection outbound queue size (at least one).
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Requires the given shared secret on every connection.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the cookie name the secret is read from.
    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = name.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 9215)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_headers_per_message, 1000);
        assert_eq!(config.secret, None);
        assert_eq!(config.secret_name, "docfeed_secret");
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_headers_per_message(0)
            .with_outbound_queue_capacity(16)
            .with_secret("hunter2")
            .with_secret_name("dqm_secret");

        assert_eq!(config.max_headers_per_message, 1);
        assert_eq!(config.outbound_queue_capacity, 16);
        assert_eq!(config.secret.as_deref(), Some("hunter2"));
        assert_eq!(config.secret_name, "dqm_secret");
    }
}
