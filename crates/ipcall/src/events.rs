//! Typed server notifications.
//!
//! Observers register through [`crate::Server::subscribe`] and receive a
//! [`ServerEvent`] per lifecycle step; dropping the receiver unsubscribes.
//! Events are observability only — they never alter the response written to
//! the caller, and a lagging observer misses events rather than stalling
//! the dispatch engine.

use crate::protocol::Request;

/// Notification emitted by a server instance.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// The server bound its socket path and is accepting connections.
    Listening,
    /// A connection was accepted and entered the active set.
    ConnectionEstablished,
    /// A request decoded successfully, before dispatch.
    Request(Request),
    /// An out-of-band failure: accept error, parse failure, unresolvable
    /// method, or handler failure.
    Error(String),
    /// The server stopped listening and ended its tracked connections.
    Closed,
}
