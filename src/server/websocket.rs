// ABOUTME: WebSocket connection manager, handshake auth, framing, pending queue, disconnect cleanup
// ABOUTME: One reader loop and one writer task per connection; dispatch runs on the worker pool

//! WebSocket connection manager.
//!
//! The [`GatewaySocketServer`] accepts loopback WebSocket connections and
//! owns the full connection lifecycle:
//!
//! - the upgrade request's query string must carry `session=<token>`; the
//!   token is resolved through the authenticator while the read loop is
//!   already running;
//! - frames arriving before authentication completes are queued in a
//!   bounded per-connection FIFO (oldest dropped on overflow, with a
//!   synthesized error response); once the app id is known the queue drains
//!   in order into the dispatcher;
//! - each connection gets a process-unique monotonic id and a writer task
//!   that exclusively owns the socket sink;
//! - on disconnect the connection's identity is retired, lifecycle sinks
//!   are notified, and every subscription it held is cleaned up.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

use crate::constants::{limits, network, origins, timeouts};
use crate::context::CallContext;
use crate::error::{GatekitError, Result};
use crate::gateway::GatewayDispatcher;
use crate::monitoring;
use crate::notifications::NotificationHub;
use crate::server::common::SocketServerConfig;
use crate::server::mirror::TrafficMirror;
use crate::server::registry::{AppIdRegistry, ConnectionSinkRegistry, ConnectionTable};
use crate::traits::Authenticator;
use crate::types::jsonrpc::{ErrorEnvelope, JsonRpcRequest, JsonRpcResponse};
use crate::workers::WorkerPool;

/// Extract a query parameter value from a raw query string.
///
/// Values are percent-decoded; a missing key or empty value yields `None`.
pub(crate) fn resolve_query(query: &str, key: &str) -> Option<String> {
    if query.is_empty() {
        tracing::warn!("Query is empty");
        return None;
    }
    for pair in query.split('&') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        if name == key {
            if value.is_empty() {
                tracing::error!("'{}' value missing in query: {}", key, query);
                return None;
            }
            return match urlencoding::decode(value) {
                Ok(decoded) => Some(decoded.into_owned()),
                Err(e) => {
                    tracing::error!("Failed to decode '{}' value: {}", key, e);
                    None
                }
            };
        }
    }
    tracing::warn!("{} not found in query: {}", key, query);
    None
}

/// Shared state handed to every connection task
struct ServerShared {
    config: SocketServerConfig,
    authenticator: Arc<dyn Authenticator>,
    dispatcher: Arc<GatewayDispatcher>,
    hub: Arc<NotificationHub>,
    connections: Arc<ConnectionTable>,
    app_ids: Arc<AppIdRegistry>,
    sinks: Arc<ConnectionSinkRegistry>,
    workers: Arc<WorkerPool>,
    mirror: Arc<TrafficMirror>,
    next_connection_id: AtomicU32,
}

/// WebSocket server fronting the gateway
pub struct GatewaySocketServer {
    shared: Arc<ServerShared>,
    listener: Option<TcpListener>,
    shutdown: Arc<tokio::sync::Notify>,
}

impl GatewaySocketServer {
    /// Create a server over the gateway's collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SocketServerConfig,
        authenticator: Arc<dyn Authenticator>,
        dispatcher: Arc<GatewayDispatcher>,
        hub: Arc<NotificationHub>,
        connections: Arc<ConnectionTable>,
        app_ids: Arc<AppIdRegistry>,
        sinks: Arc<ConnectionSinkRegistry>,
        workers: Arc<WorkerPool>,
        mirror: Arc<TrafficMirror>,
    ) -> Self {
        Self {
            shared: Arc::new(ServerShared {
                config,
                authenticator,
                dispatcher,
                hub,
                connections,
                app_ids,
                sinks,
                workers,
                mirror,
                next_connection_id: AtomicU32::new(0),
            }),
            listener: None,
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Bind the configured connector; returns the bound address.
    ///
    /// Binding separately from [`GatewaySocketServer::run`] lets callers
    /// use an ephemeral port (`127.0.0.1:0`) and learn what was assigned.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let connector = if self.shared.config.connector.is_empty() {
            network::DEFAULT_CONNECTOR.to_string()
        } else {
            self.shared.config.connector.clone()
        };
        let listener = TcpListener::bind(&connector)
            .await
            .map_err(|e| GatekitError::transport(format!("Failed to bind to {}: {}", connector, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| GatekitError::transport(e.to_string()))?;
        tracing::info!("WebSocket server starting on ws://{}", addr);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Handle returned to request a graceful stop of the accept loop
    pub fn shutdown_handle(&self) -> Arc<tokio::sync::Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Accept connections until shutdown is requested.
    pub async fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self.listener.take().ok_or_else(|| {
            GatekitError::internal("listener disappeared between bind and run")
        })?;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    tracing::info!("WebSocket server shutting down gracefully");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let shared = Arc::clone(&self.shared);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, shared).await {
                                    tracing::error!("WebSocket connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        tracing::info!("WebSocket server stopped");
        Ok(())
    }

    /// Bind and run in one call.
    pub async fn start(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        self.run().await
    }
}

/// Handle one accepted TCP connection end to end.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<ServerShared>,
) -> Result<()> {
    let connection_id = shared.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!("New WebSocket connection from {} (id {})", peer, connection_id);

    let mut query = String::new();
    let handshake = accept_hdr_async(stream, |req: &Request, response: Response| {
        query = req.uri().query().unwrap_or("").to_string();
        tracing::debug!("WebSocket request query: {}", query);
        Ok(response)
    });
    let ws_stream = tokio::time::timeout(timeouts::HANDSHAKE_TIMEOUT, handshake)
        .await
        .map_err(|_| GatekitError::transport("WebSocket handshake timed out"))?
        .map_err(|e| GatekitError::transport(format!("WebSocket handshake failed: {}", e)))?;

    let (mut ws_sink, mut ws_source) = ws_stream.split();

    // The writer task exclusively owns the socket sink; everything outbound
    // goes through the connection table's channel.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(limits::OUTBOUND_CHANNEL_CAPACITY);
    shared.connections.register(connection_id, outbound_tx.clone());
    let _writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if ws_sink.send(message).await.is_err() {
                tracing::debug!("Socket write failed, writer exiting");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Authentication runs concurrently with the read loop so early frames
    // can be queued instead of lost.
    let auth_shared = Arc::clone(&shared);
    let auth_query = query.clone();
    let mut auth_task = tokio::spawn(async move {
        authenticate_connection(&auth_shared, connection_id, &auth_query).await
    });
    let mut auth_done = false;
    let mut app_id: Option<String> = None;
    let mut pending: VecDeque<JsonRpcRequest> = VecDeque::new();

    loop {
        tokio::select! {
            auth_result = &mut auth_task, if !auth_done => {
                auth_done = true;
                match auth_result {
                    Ok(Some(resolved)) => {
                        on_authenticated(&shared, connection_id, &resolved).await;
                        while let Some(frame) = pending.pop_front() {
                            tracing::debug!("Processing pending message for connection {}", connection_id);
                            dispatch_frame(&shared, connection_id, &resolved, frame).await;
                        }
                        app_id = Some(resolved);
                    }
                    Ok(None) => {
                        tracing::error!("Authentication failed for query: {}", query);
                        shared.connections.close(connection_id).await;
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Authentication task failed: {}", e);
                        shared.connections.close(connection_id).await;
                        break;
                    }
                }
            }
            message = ws_source.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        process_frame(&shared, connection_id, app_id.as_deref(), &mut pending, &text)
                            .await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        shared.connections.send(connection_id, Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(
                            "WebSocket close frame received from connection {}: {:?}",
                            connection_id,
                            frame
                        );
                        shared.connections.send(connection_id, Message::Close(frame)).await;
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!("Received binary WebSocket message (not supported)");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let text = e.to_string();
                        if text.contains("without closing handshake") {
                            tracing::info!("Connection {} reset without close handshake", connection_id);
                        } else {
                            tracing::error!("WebSocket error on connection {}: {}", connection_id, e);
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if !auth_done {
        auth_task.abort();
    }
    disconnect_cleanup(&shared, connection_id).await;
    drop(outbound_tx);
    tracing::info!("WebSocket connection terminated: {}", connection_id);
    Ok(())
}

/// Resolve the session query parameter to an app id.
async fn authenticate_connection(
    shared: &Arc<ServerShared>,
    connection_id: u32,
    query: &str,
) -> Option<String> {
    let session = match resolve_query(query, network::SESSION_QUERY_KEY) {
        Some(session) => session,
        None => {
            tracing::error!("No session token provided");
            return None;
        }
    };
    match shared.authenticator.authenticate(&session).await {
        Ok(app_id) => {
            tracing::trace!("App id {} for connection {}", app_id, connection_id);
            Some(app_id)
        }
        Err(e) => {
            tracing::error!("Session resolution failed for connection {}: {}", connection_id, e);
            None
        }
    }
}

/// Record the identity and broadcast the connection-up notification.
async fn on_authenticated(shared: &Arc<ServerShared>, connection_id: u32, app_id: &str) {
    shared.app_ids.add(connection_id, app_id);
    monitoring::record_connection_change(true);
    shared.mirror.on_connection_changed(connection_id, app_id, true).await;

    let sinks = Arc::clone(&shared.sinks);
    let app_id = app_id.to_string();
    shared
        .workers
        .submit(async move {
            sinks.notify(&app_id, connection_id, true).await;
        })
        .await;
}

/// Retire a connection: notify, unregister, and release subscriptions.
async fn disconnect_cleanup(shared: &Arc<ServerShared>, connection_id: u32) {
    let session_secs = shared
        .app_ids
        .session_duration(connection_id)
        .map(|d| d.num_seconds())
        .unwrap_or(0);
    tracing::info!(
        "Connection disconnected: {} (authenticated for {}s)",
        connection_id,
        session_secs
    );
    match shared.app_ids.get(connection_id) {
        Some(app_id) => {
            monitoring::record_connection_change(false);
            shared.mirror.on_connection_changed(connection_id, &app_id, false).await;
            let sinks = Arc::clone(&shared.sinks);
            let notified_app = app_id.clone();
            shared
                .workers
                .submit(async move {
                    sinks.notify(&notified_app, connection_id, false).await;
                })
                .await;
        }
        None => {
            tracing::debug!("No app id found for connection {} during disconnect", connection_id);
        }
    }

    shared.app_ids.remove(connection_id);
    shared.hub.cleanup(connection_id, origins::GATEWAY).await;
    shared.connections.unregister(connection_id);
}

/// Parse one text frame and either queue it, dispatch it, or drop it.
async fn process_frame(
    shared: &Arc<ServerShared>,
    connection_id: u32,
    app_id: Option<&str>,
    pending: &mut VecDeque<JsonRpcRequest>,
    text: &str,
) {
    let frame = match serde_json::from_str::<JsonRpcRequest>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to parse message: {} ({})", e, text);
            return;
        }
    };

    if frame.id.is_none() {
        // Strictly request/response: without an id there is nothing to
        // correlate a reply to.
        tracing::error!("Message MUST contain an id field: {}", text);
        return;
    }

    match app_id {
        Some(app_id) => dispatch_frame(shared, connection_id, app_id, frame).await,
        None => {
            if pending.len() == limits::PENDING_QUEUE_CAPACITY {
                tracing::error!(
                    "Pending queue full for connection {}, dropping oldest entry",
                    connection_id
                );
                if let Some(dropped) = pending.pop_front() {
                    if let Some(dropped_id) = dropped.id {
                        send_error_response(
                            shared,
                            connection_id,
                            dropped_id,
                            ErrorEnvelope::bad_request("Dropped before authentication completed"),
                        )
                        .await;
                    }
                }
            }
            pending.push_back(frame);
            tracing::trace!(
                "Message queued for connection {}, queue size: {}",
                connection_id,
                pending.len()
            );
        }
    }
}

/// Hand a complete request to the dispatcher on the worker pool.
async fn dispatch_frame(
    shared: &Arc<ServerShared>,
    connection_id: u32,
    app_id: &str,
    frame: JsonRpcRequest,
) {
    let Some(request_id) = frame.id else {
        return;
    };

    let method = match frame.method.as_deref() {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => {
            tracing::error!("Message MUST contain a method field");
            send_error_response(
                shared,
                connection_id,
                request_id,
                ErrorEnvelope::bad_request("Message MUST contain a method field"),
            )
            .await;
            return;
        }
    };
    let params = frame.params_string();

    if shared.config.enhanced_logging {
        tracing::debug!(
            "{}-->[[a-{}-{}]] method={}, params={}",
            app_id,
            connection_id,
            request_id,
            method,
            params
        );
    }
    shared.mirror.mirror_request(connection_id, request_id, &method, &params).await;

    let context = CallContext::new(request_id, connection_id, app_id);
    let dispatcher = Arc::clone(&shared.dispatcher);
    shared
        .workers
        .submit(async move {
            dispatcher.resolve(context, origins::GATEWAY, &method, &params).await;
        })
        .await;
}

/// Write a JSON-RPC error response directly to a connection.
async fn send_error_response(
    shared: &Arc<ServerShared>,
    connection_id: u32,
    request_id: u32,
    envelope: ErrorEnvelope,
) {
    let response = JsonRpcResponse::error(request_id, envelope.to_wire());
    match serde_json::to_string(&response) {
        Ok(text) => {
            shared.connections.send(connection_id, Message::Text(text.into())).await;
        }
        Err(e) => {
            tracing::error!("Failed to serialize error response: {}", e);
        }
    }
}
