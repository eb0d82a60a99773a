// ABOUTME: Traffic mirror copying gateway frames to a designated observer connection
// ABOUTME: Best-effort notifications; mirroring never blocks or fails the primary path

//! Traffic mirroring.
//!
//! When `mirror_app_id` is configured and a connection authenticates as
//! that app, every request, response, and notification on *other*
//! connections is copied to it as an `observer.update` notification, and
//! connection up/down transitions as `observer.connection`. The mirror is a
//! debugging aid: frames are sent directly to the observer's write handle,
//! best effort, bypassing the responder so mirrored traffic is never
//! re-mirrored.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::constants::methods;
use crate::server::registry::ConnectionTable;
use crate::types::jsonrpc::JsonRpcNotification;

/// Copies gateway traffic to an observer connection
pub struct TrafficMirror {
    mirror_app_id: Option<String>,
    mirror_connection: AtomicU32,
    connections: Arc<ConnectionTable>,
}

impl TrafficMirror {
    /// Create a mirror; `None` disables mirroring entirely
    pub fn new(mirror_app_id: Option<String>, connections: Arc<ConnectionTable>) -> Self {
        Self {
            mirror_app_id,
            mirror_connection: AtomicU32::new(0),
            connections,
        }
    }

    /// True when a mirror connection is currently attached
    pub fn is_attached(&self) -> bool {
        self.mirror_connection.load(Ordering::SeqCst) != 0
    }

    /// Track connection transitions: attach/detach the observer and inform
    /// it about other connections coming and going.
    pub async fn on_connection_changed(&self, connection_id: u32, app_id: &str, connected: bool) {
        let Some(mirror_app) = self.mirror_app_id.as_deref() else {
            return;
        };

        if app_id == mirror_app {
            if connected {
                self.mirror_connection.store(connection_id, Ordering::SeqCst);
                tracing::info!(
                    "Observer connected with id: {}, appId: {}",
                    connection_id,
                    app_id
                );
            } else {
                self.mirror_connection.store(0, Ordering::SeqCst);
                tracing::info!("Observer disconnected");
            }
            return;
        }

        let params = json!({
            "connectionId": connection_id,
            "appId": app_id,
            "connected": connected,
        });
        self.forward(connection_id, methods::OBSERVER_CONNECTION, params)
            .await;
    }

    /// Mirror an inbound request frame
    pub async fn mirror_request(&self, connection_id: u32, request_id: u32, method: &str, params: &str) {
        let update = json!({
            "connectionId": connection_id,
            "type": "request",
            "id": request_id,
            "method": method,
            "params": params,
        });
        self.forward(connection_id, methods::OBSERVER_UPDATE, update).await;
    }

    /// Mirror an outbound response frame
    pub async fn mirror_response(&self, connection_id: u32, request_id: u32, payload: &str) {
        let update = json!({
            "connectionId": connection_id,
            "type": "response",
            "id": request_id,
            "payload": payload,
        });
        self.forward(connection_id, methods::OBSERVER_UPDATE, update).await;
    }

    /// Mirror an outbound notification frame
    pub async fn mirror_notification(&self, connection_id: u32, method: &str, payload: &str) {
        let update = json!({
            "connectionId": connection_id,
            "type": "notification",
            "method": method,
            "params": payload,
        });
        self.forward(connection_id, methods::OBSERVER_UPDATE, update).await;
    }

    async fn forward(&self, source_connection: u32, method: &str, params: serde_json::Value) {
        let mirror = self.mirror_connection.load(Ordering::SeqCst);
        if mirror == 0 || mirror == source_connection {
            return;
        }
        let frame = JsonRpcNotification::new(method, Some(params));
        match serde_json::to_string(&frame) {
            Ok(text) => {
                self.connections.send(mirror, Message::Text(text.into())).await;
            }
            Err(e) => {
                tracing::error!("Failed to serialize mirror frame: {}", e);
            }
        }
    }
}
