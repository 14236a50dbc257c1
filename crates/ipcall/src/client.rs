//! Client call engine.
//!
//! Each call owns an ephemeral connection: connect to the server's socket
//! path, write exactly one encoded request, accumulate reads until the bytes
//! decode as one complete response, then drop the connection. A timeout armed
//! at connect bounds the whole exchange. Nothing is shared across calls, so
//! concurrent calls never interfere.
//!
//! Two completion styles sit over one internal dispatch path: [`Client::call`]
//! returns a future, [`Client::call_with_callback`] adapts the same result
//! into a callback invocation.

use crate::config::{ClientOptions, MAX_MESSAGE_SIZE, READ_CHUNK_SIZE};
use crate::error::{IpcError, Result};
use crate::protocol::{decode_response, Request, Response};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// Client for issuing remote procedure calls over a Unix domain socket.
#[derive(Debug, Clone)]
pub struct Client {
    path: PathBuf,
    options: ClientOptions,
}

impl Client {
    /// Create a client for the server at `path` with default options.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(path, ClientOptions::default())
    }

    /// Create a client for the server at `path`.
    pub fn with_options(path: impl Into<PathBuf>, options: ClientOptions) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(IpcError::InvalidArgument(
                "path parameter is required".to_string(),
            ));
        }

        debug!("new IPC client for {:?}", path);

        Ok(Self { path, options })
    }

    /// The socket path this client connects to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Call a remote method with positional arguments.
    ///
    /// Convenience form: wraps the arguments into a request with a freshly
    /// generated id. Fails with [`IpcError::InvalidArgument`] before any
    /// connection attempt when `method` is empty.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        if method.is_empty() {
            return Err(IpcError::InvalidArgument(
                "method parameter is required".to_string(),
            ));
        }

        self.call_request(Request::new(method, params)).await
    }

    /// Call a remote method with a fully-formed request.
    ///
    /// Verbose form: the request is transmitted unchanged, so the caller
    /// controls the id and params shape.
    pub async fn call_request(&self, request: Request) -> Result<Value> {
        if request.method.is_empty() {
            return Err(IpcError::InvalidArgument(
                "method parameter is required".to_string(),
            ));
        }

        match tokio::time::timeout(self.options.timeout, self.dispatch(&request)).await {
            Ok(settled) => settled,
            Err(_) => {
                debug!("timeout awaiting response for {}", request.method);
                Err(IpcError::Timeout {
                    path: self.path.clone(),
                    request,
                })
            }
        }
    }

    /// Call a remote method and deliver the outcome to `callback` instead of
    /// returning it. Must be invoked from within a Tokio runtime.
    pub fn call_with_callback<F>(&self, method: &str, params: Vec<Value>, callback: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let client = self.clone();
        let method = method.to_string();
        tokio::spawn(async move {
            callback(client.call(&method, params).await);
        });
    }

    /// Single-shot exchange: connect, write, read until one complete
    /// response decodes. The stream is dropped on every exit path.
    async fn dispatch(&self, request: &Request) -> Result<Value> {
        let transport = |source: std::io::Error| IpcError::Transport {
            path: self.path.clone(),
            source,
        };

        let mut stream = UnixStream::connect(&self.path).await.map_err(transport)?;

        let payload = serde_json::to_vec(request).map_err(|e| IpcError::Parse(e.to_string()))?;
        debug!("writing {} byte request to {:?}", payload.len(), self.path);
        stream.write_all(&payload).await.map_err(transport)?;
        stream.flush().await.map_err(transport)?;

        // The response is a single unframed JSON message; keep reading until
        // the accumulated bytes parse.
        let mut received = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = stream.read(&mut chunk).await.map_err(transport)?;
            if n == 0 {
                return Err(transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before a complete response arrived",
                )));
            }
            received.extend_from_slice(&chunk[..n]);
            if received.len() > MAX_MESSAGE_SIZE {
                return Err(IpcError::Parse(format!(
                    "response size {} exceeds maximum {}",
                    received.len(),
                    MAX_MESSAGE_SIZE
                )));
            }

            if let Some(response) = decode_response(&received) {
                return settle(response);
            }
        }
    }
}

/// Map a decoded response envelope into the call's outcome.
fn settle(response: Response) -> Result<Value> {
    if let Some(error) = response.error {
        let method = error
            .data
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!(
            "remote call failed with code {}: {}",
            error.code, error.message
        );
        return Err(IpcError::Call {
            code: error.code,
            message: error.message,
            method,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}
