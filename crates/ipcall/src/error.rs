//! Error types for the IPC call engine.
//!
//! Every failure mode of a call surfaces through [`IpcError`], and the server
//! maps the dispatch-side variants onto JSON-RPC 2.0 error responses via
//! [`IpcError::code`] and [`IpcError::response`].

use crate::protocol::{Request, Response};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Fixed marker prefixing every client-side failure, so callers can tell a
/// locally raised fault from a result produced by the remote method.
pub const CLIENT_FAULT: &str = "IPC client exception";

/// Main error type for the ipcall library.
#[derive(Debug, Error)]
pub enum IpcError {
    /// A required construction or call argument was missing or empty.
    /// Raised synchronously, before any I/O happens.
    #[error("{0}")]
    InvalidArgument(String),

    /// Binding the Unix domain socket failed (permission denied,
    /// address-in-use, unreachable directory).
    #[error("failed to bind Unix domain socket at {path:?}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A socket-level failure while calling a remote method (connection
    /// refused, missing socket file, reset, early close).
    #[error("IPC client exception: {path:?}: {source}")]
    Transport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload was not valid JSON.
    #[error("failed to parse JSON-RPC message: {0}")]
    Parse(String),

    /// The payload was valid JSON but not a valid JSON-RPC 2.0 envelope.
    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    /// The requested method did not resolve to a handler, or is excluded
    /// from remote execution.
    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    /// Request `params` was present but not array-shaped.
    #[error("parameters must be an array")]
    InvalidParameters,

    /// The handler failed; carries the handler's own failure message.
    #[error("method execution failed: {message}")]
    Execution { message: String },

    /// No complete response arrived before the configured call timeout.
    /// Carries the original request for diagnostics.
    #[error("IPC client exception: timeout awaiting response from {path:?}")]
    Timeout { path: PathBuf, request: Request },

    /// The server answered with a JSON-RPC error envelope; `code` and
    /// `method` are copied from the envelope's `code` and `data` fields.
    #[error("IPC client exception: {message}")]
    Call {
        code: i32,
        message: String,
        method: Option<String>,
    },

    /// `close` was called on a server that is not listening.
    #[error("server is not listening")]
    NotListening,

    /// `listen` was called on a server that is already listening.
    #[error("server is already listening")]
    AlreadyListening,

    /// Any other I/O failure (e.g. removing the socket file on close).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`IpcError`].
pub type Result<T> = std::result::Result<T, IpcError>;

impl IpcError {
    /// Map this error onto its JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            IpcError::Parse(_) => -32700,
            IpcError::InvalidRequest(_) => -32600,
            IpcError::MethodNotFound { .. } => -32601,
            IpcError::InvalidParameters => -32602,
            // Everything else that reaches a response is an internal error.
            _ => -32603,
        }
    }

    /// Context value for the JSON-RPC error object's `data` field.
    ///
    /// Only method resolution failures carry context (the offending method
    /// name); other variants are fully described by code and message.
    pub fn data(&self) -> Option<Value> {
        match self {
            IpcError::MethodNotFound { method } => Some(Value::String(method.clone())),
            _ => None,
        }
    }

    /// Build the JSON-RPC error response the server writes back for this
    /// failure, correlated to the originating request's id.
    pub fn response(&self, id: Option<Value>) -> Response {
        Response::failure(id, self.code(), self.to_string(), self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(IpcError::Parse("bad json".into()).code(), -32700);
        assert_eq!(IpcError::InvalidRequest("no version".into()).code(), -32600);
        assert_eq!(
            IpcError::MethodNotFound {
                method: "math.triple".into()
            }
            .code(),
            -32601
        );
        assert_eq!(IpcError::InvalidParameters.code(), -32602);
        assert_eq!(
            IpcError::Execution {
                message: "boom".into()
            }
            .code(),
            -32603
        );
        assert_eq!(IpcError::NotListening.code(), -32603);
    }

    #[test]
    fn test_method_not_found_response_carries_method_name() {
        let err = IpcError::MethodNotFound {
            method: "math.triple".into(),
        };
        let response = err.response(Some(Value::from(7)));

        assert_eq!(response.id, Some(Value::from(7)));
        let error = response.error.expect("error object");
        assert_eq!(error.code, -32601);
        assert_eq!(error.data, Some(Value::String("math.triple".into())));
    }

    #[test]
    fn test_client_fault_marker_on_call_and_timeout() {
        let call = IpcError::Call {
            code: -32603,
            message: "kaput".into(),
            method: None,
        };
        assert!(call.to_string().starts_with(CLIENT_FAULT));

        let timeout = IpcError::Timeout {
            path: PathBuf::from("/tmp/missing.sock"),
            request: Request::new("slow", vec![]),
        };
        assert!(timeout.to_string().starts_with(CLIENT_FAULT));
    }
}
