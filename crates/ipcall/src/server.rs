//! Server dispatch engine.
//!
//! Listens on a Unix domain socket path, accepts connections, and handles
//! each one in its own spawned task: drain the readable bytes, decode one
//! request, resolve it through the method registry, invoke the handler, and
//! write the JSON-RPC response. A connection carries at most one in-flight
//! request, and one decoded message is processed per readiness batch;
//! whatever else that batch buffered is dropped and the next batch starts
//! clean. A slow handler delays only its own connection.
//!
//! # Lifecycle
//!
//! A server starts non-listening. [`Server::listen`] binds and spawns the
//! accept loop; [`Server::close`] ends every tracked connection, removes the
//! socket file, and returns the instance to the non-listening state, from
//! which `listen` may be called again.

use crate::config::{EVENT_CHANNEL_CAPACITY, MAX_MESSAGE_SIZE, READ_CHUNK_SIZE, ServerOptions};
use crate::error::{IpcError, Result};
use crate::events::ServerEvent;
use crate::protocol::{decode_request, Response};
use crate::registry::{self, Methods};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Server for dispatching remote procedure calls received over a Unix
/// domain socket.
pub struct Server {
    path: PathBuf,
    shared: Arc<Shared>,
    listening: Mutex<Option<ListenerState>>,
}

/// State shared between the server handle and its spawned tasks.
struct Shared {
    methods: Methods,
    options: ServerOptions,
    connections: AtomicUsize,
    events: broadcast::Sender<ServerEvent>,
}

/// Handles owned while listening; dropped on close.
struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    conn_shutdown_tx: watch::Sender<bool>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl Server {
    /// Create a server for `path` dispatching to `methods`, with default
    /// options.
    pub fn new(path: impl Into<PathBuf>, methods: Methods) -> Result<Self> {
        Self::with_options(path, methods, ServerOptions::default())
    }

    /// Create a server for `path` dispatching to `methods`.
    pub fn with_options(
        path: impl Into<PathBuf>,
        methods: Methods,
        options: ServerOptions,
    ) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(IpcError::InvalidArgument(
                "path parameter is required".to_string(),
            ));
        }
        if methods.is_empty() {
            return Err(IpcError::InvalidArgument(
                "methods parameter is required".to_string(),
            ));
        }

        debug!("new IPC server for {:?}", path);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            path,
            shared: Arc::new(Shared {
                methods,
                options,
                connections: AtomicUsize::new(0),
                events,
            }),
            listening: Mutex::new(None),
        })
    }

    /// The socket path this server binds to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register an observer for server notifications. Dropping the returned
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// Whether the server is currently listening.
    pub async fn is_listening(&self) -> bool {
        self.listening.lock().await.is_some()
    }

    /// Number of connections currently tracked in the active set.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Bind the socket path and start accepting connections.
    ///
    /// When `clean_handle_on_listen` is set, any stale file at the path is
    /// removed first so a previous crashed instance cannot poison the bind.
    /// A bind failure is returned and also emitted as an error notification.
    pub async fn listen(&self) -> Result<()> {
        let mut listening = self.listening.lock().await;
        if listening.is_some() {
            return Err(IpcError::AlreadyListening);
        }

        if self.shared.options.clean_handle_on_listen {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => debug!("removed stale socket file at {:?}", self.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove stale socket file {:?}: {}", self.path, e),
            }
        }

        let listener = UnixListener::bind(&self.path).map_err(|source| {
            let err = IpcError::Bind {
                path: self.path.clone(),
                source,
            };
            let _ = self.shared.events.send(ServerEvent::Error(err.to_string()));
            err
        })?;

        info!("IPC server listening on {:?}", self.path);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            self.shared.clone(),
            listener,
            shutdown_rx,
            conn_shutdown_rx,
        ));

        let _ = self.shared.events.send(ServerEvent::Listening);

        *listening = Some(ListenerState {
            shutdown_tx,
            conn_shutdown_tx,
            accept_task,
        });

        Ok(())
    }

    /// Stop listening: end every tracked connection, emit the close
    /// notification, and remove the socket file.
    ///
    /// Fails with [`IpcError::NotListening`] when the server is not
    /// listening. A missing socket file is ignored; any other removal
    /// failure is returned.
    pub async fn close(&self) -> Result<()> {
        let mut listening = self.listening.lock().await;
        let Some(state) = listening.take() else {
            return Err(IpcError::NotListening);
        };

        debug!(
            "closing IPC server, ending {} active connections",
            self.connection_count()
        );

        // Stop the accept loop, then force every connection task to end.
        let _ = state.shutdown_tx.send(());
        let _ = state.conn_shutdown_tx.send(true);
        let _ = state.accept_task.await;

        let _ = self.shared.events.send(ServerEvent::Closed);

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IpcError::Io(e)),
        }
    }
}

/// Accept connections until the shutdown signal fires. Each connection is
/// counted exactly once on accept and uncounted exactly once when its task
/// ends, however it ends.
async fn accept_loop(
    shared: Arc<Shared>,
    listener: UnixListener,
    mut shutdown_rx: oneshot::Receiver<()>,
    conn_shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("IPC server accept loop shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        shared.connections.fetch_add(1, Ordering::SeqCst);
                        let _ = shared.events.send(ServerEvent::ConnectionEstablished);
                        debug!("new socket connection accepted");

                        let shared = shared.clone();
                        let mut conn_shutdown = conn_shutdown_rx.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(&shared, stream, &mut conn_shutdown).await
                            {
                                debug!("socket connection ended: {}", e);
                            }
                            shared.connections.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("accept error: {}", e);
                        let _ = shared
                            .events
                            .send(ServerEvent::Error(format!("accept error: {e}")));
                    }
                }
            }
        }
    }
}

/// Serve one connection until the peer hangs up or the server closes.
///
/// Each pass waits for readability, drains what is buffered, and processes
/// exactly one message from that batch. The shutdown signal forcibly ends
/// the task even while a handler is still pending.
async fn handle_connection(
    shared: &Shared,
    mut stream: UnixStream,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => return Ok(()),
            ready = stream.readable() => ready?,
        }

        let (batch, eof) = drain_available(&mut stream)?;

        if !batch.is_empty() {
            tokio::select! {
                _ = shutdown_rx.changed() => return Ok(()),
                outcome = handle_message(shared, &mut stream, &batch) => outcome?,
            }
        }

        if eof {
            return Ok(());
        }
    }
}

/// Drain everything currently readable without blocking. Returns the bytes
/// and whether the peer has closed its end.
fn drain_available(stream: &mut UnixStream) -> Result<(Vec<u8>, bool)> {
    let mut batch = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.try_read(&mut chunk) {
            Ok(0) => return Ok((batch, true)),
            Ok(n) => {
                batch.extend_from_slice(&chunk[..n]);
                // Cap growth: the decoder rejects it with a parse error.
                if batch.len() > MAX_MESSAGE_SIZE {
                    return Ok((batch, false));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok((batch, false)),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Decode and dispatch one message, writing the correlated response.
async fn handle_message(shared: &Shared, stream: &mut UnixStream, batch: &[u8]) -> Result<()> {
    let request = match decode_request(batch) {
        Ok(request) => request,
        Err((id, err)) => {
            debug!("failed to decode inbound message: {}", err);
            let _ = shared.events.send(ServerEvent::Error(err.to_string()));
            return write_response(stream, &err.response(id)).await;
        }
    };

    debug!("request received for method {}", request.method);
    let _ = shared.events.send(ServerEvent::Request(request.clone()));

    let id = request.id.clone();

    // Params shape is validated before method resolution, so a malformed
    // request is reported as such even when the method does not exist.
    let params = match request.params {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return write_response(stream, &IpcError::InvalidParameters.response(id)).await;
        }
    };

    let Some(handler) = registry::resolve(
        &shared.methods,
        &shared.options.excluded_methods,
        &request.method,
    ) else {
        let err = IpcError::MethodNotFound {
            method: request.method.clone(),
        };
        let _ = shared.events.send(ServerEvent::Error(err.to_string()));
        return write_response(stream, &err.response(id)).await;
    };

    debug!("executing method {}", request.method);
    let started = Instant::now();

    match handler.invoke(params).await {
        Ok(value) => {
            debug!(
                "completed method {} in {:?}",
                request.method,
                started.elapsed()
            );
            write_response(stream, &Response::success(id, value)).await
        }
        Err(failure) => {
            debug!(
                "method {} failed after {:?}: {}",
                request.method,
                started.elapsed(),
                failure
            );
            let err = IpcError::Execution {
                message: failure.to_string(),
            };
            let _ = shared.events.send(ServerEvent::Error(err.to_string()));
            write_response(stream, &err.response(id)).await
        }
    }
}

/// Serialize and write one response message.
async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let payload = serde_json::to_vec(response).map_err(|e| IpcError::Parse(e.to_string()))?;
    stream.write_all(&payload).await?;
    stream.flush().await?;
    Ok(())
}
