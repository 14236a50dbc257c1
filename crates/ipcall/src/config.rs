//! Tunables for clients and servers.

use std::collections::HashSet;
use std::time::Duration;

/// Default maximum time a client waits for a complete response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Upper bound on a single message payload. The wire format has no length
/// framing, so this caps buffer growth on both sides.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Read granularity for socket drains.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Capacity of the server's event channel. Lagging subscribers miss events
/// rather than blocking the dispatch engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum time to wait for a complete response before the call fails.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Remove any stale file at the socket path before binding, so a crashed
    /// previous instance does not leave the address unusable.
    pub clean_handle_on_listen: bool,
    /// Fully-qualified method names that must never be dispatched, even when
    /// they resolve in the registry.
    pub excluded_methods: HashSet<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            clean_handle_on_listen: true,
            excluded_methods: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_default_timeout() {
        assert_eq!(ClientOptions::default().timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_server_options_defaults() {
        let options = ServerOptions::default();
        assert!(options.clean_handle_on_listen);
        assert!(options.excluded_methods.is_empty());
    }
}
