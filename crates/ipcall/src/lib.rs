//! ipcall - JSON-RPC 2.0 inter-process calls over Unix domain sockets.
//!
//! A [`Client`] issues named remote procedure calls to a [`Server`] listening
//! on a local socket path; the server resolves the dot-delimited method name
//! against a tree of namespaced handlers ([`Methods`]) and answers with a
//! JSON-RPC 2.0 result or error. The design is strictly one request per
//! connection over a trusted local socket: no multiplexing, batching,
//! streaming, or authentication.
//!
//! # Example
//!
//! ```rust,ignore
//! use ipcall::{Client, Handler, Methods, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ipcall::Result<()> {
//!     let methods = Methods::new().namespace(
//!         "math",
//!         Methods::new().handler("double", Handler::sync(|params| {
//!             let n = params.first().and_then(|v| v.as_i64()).unwrap_or(0);
//!             Ok(json!(n * 2))
//!         })),
//!     );
//!
//!     let server = Server::new("/tmp/ipcall-example.sock", methods)?;
//!     server.listen().await?;
//!
//!     let client = Client::new("/tmp/ipcall-example.sock")?;
//!     let result = client.call("math.double", vec![json!(21)]).await?;
//!     assert_eq!(result, json!(42));
//!
//!     server.close().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use client::Client;
pub use config::{ClientOptions, ServerOptions};
pub use error::{IpcError, Result, CLIENT_FAULT};
pub use events::ServerEvent;
pub use protocol::{ErrorObject, Request, Response};
pub use registry::{Handler, Methods};
pub use server::Server;
