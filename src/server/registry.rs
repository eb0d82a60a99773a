// ABOUTME: Connection-scoped registries, app identity, write handles, and lifecycle sinks
// ABOUTME: All maps are point-read/point-write under short locks

//! Connection registries.
//!
//! Three small registries back the connection manager:
//!
//! - [`AppIdRegistry`] — connection id to authenticated app id,
//! - [`ConnectionTable`] — connection id to the outbound write handle owned
//!   by that connection's writer task,
//! - [`ConnectionSinkRegistry`] — dynamically registered listeners for
//!   connection up/down transitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::traits::sinks::ConnectionSink;

/// One authenticated connection's identity
#[derive(Debug, Clone)]
struct AppIdEntry {
    app_id: String,
    connected_at: DateTime<Utc>,
}

/// Connection id to authenticated app id
#[derive(Debug, Default)]
pub struct AppIdRegistry {
    inner: RwLock<HashMap<u32, AppIdEntry>>,
}

impl AppIdRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authenticated connection
    pub fn add(&self, connection_id: u32, app_id: &str) {
        self.write().insert(
            connection_id,
            AppIdEntry {
                app_id: app_id.to_string(),
                connected_at: Utc::now(),
            },
        );
    }

    /// App id for a connection, if authenticated
    pub fn get(&self, connection_id: u32) -> Option<String> {
        self.read().get(&connection_id).map(|entry| entry.app_id.clone())
    }

    /// How long a connection has been authenticated
    pub fn session_duration(&self, connection_id: u32) -> Option<chrono::Duration> {
        self.read()
            .get(&connection_id)
            .map(|entry| Utc::now() - entry.connected_at)
    }

    /// Remove a connection's identity
    pub fn remove(&self, connection_id: u32) {
        self.write().remove(&connection_id);
    }

    /// Connection carrying the given app id, if any
    pub fn connection_for_app(&self, app_id: &str) -> Option<u32> {
        self.read()
            .iter()
            .find(|(_, entry)| entry.app_id.as_str() == app_id)
            .map(|(connection_id, _)| *connection_id)
    }

    /// Number of authenticated connections
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when no connection is authenticated
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, AppIdEntry>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, AppIdEntry>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Connection id to outbound frame sender.
///
/// The sender feeds the connection's writer task, which exclusively owns
/// the socket sink. Sends to a departed connection are dropped quietly;
/// late deliveries after a disconnect are expected and not an error.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    inner: RwLock<HashMap<u32, mpsc::Sender<Message>>>,
}

impl ConnectionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's write handle
    pub fn register(&self, connection_id: u32, sender: mpsc::Sender<Message>) {
        self.write().insert(connection_id, sender);
    }

    /// Drop a connection's write handle; its writer task drains and exits
    pub fn unregister(&self, connection_id: u32) {
        self.write().remove(&connection_id);
    }

    /// Write handle for a connection, if still up
    pub fn sender_for(&self, connection_id: u32) -> Option<mpsc::Sender<Message>> {
        self.read().get(&connection_id).cloned()
    }

    /// Send one frame to a connection; silently dropped when the
    /// connection is gone, logged when its outbound queue is closed.
    pub async fn send(&self, connection_id: u32, message: Message) {
        match self.sender_for(connection_id) {
            Some(sender) => {
                if sender.send(message).await.is_err() {
                    tracing::warn!("Outbound queue closed for connection {}", connection_id);
                }
            }
            None => {
                tracing::debug!(
                    "Dropping frame for departed connection {}",
                    connection_id
                );
            }
        }
    }

    /// Ask a connection's writer to close the socket
    pub async fn close(&self, connection_id: u32) {
        self.send(connection_id, Message::Close(None)).await;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, mpsc::Sender<Message>>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, mpsc::Sender<Message>>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Dynamically registered connection lifecycle listeners
#[derive(Default)]
pub struct ConnectionSinkRegistry {
    sinks: Mutex<Vec<Arc<dyn ConnectionSink>>>,
}

impl ConnectionSinkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink; registering the same sink twice is a no-op.
    pub fn register(&self, sink: Arc<dyn ConnectionSink>) {
        let mut sinks = self.lock();
        if sinks.iter().any(|existing| Arc::ptr_eq(existing, &sink)) {
            return;
        }
        tracing::info!("Register connection sink");
        sinks.push(sink);
    }

    /// Unregister a previously registered sink.
    pub fn unregister(&self, sink: &Arc<dyn ConnectionSink>) -> bool {
        let mut sinks = self.lock();
        let before = sinks.len();
        sinks.retain(|existing| !Arc::ptr_eq(existing, sink));
        if sinks.len() == before {
            tracing::error!("Connection sink not found");
            false
        } else {
            tracing::info!("Unregister connection sink");
            true
        }
    }

    /// Snapshot of the registered sinks
    pub fn snapshot(&self) -> Vec<Arc<dyn ConnectionSink>> {
        self.lock().clone()
    }

    /// Invoke every sink for a connection transition.
    pub async fn notify(&self, app_id: &str, connection_id: u32, connected: bool) {
        for sink in self.snapshot() {
            sink.on_app_connection_changed(app_id, connection_id, connected)
                .await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn ConnectionSink>>> {
        self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
