// ABOUTME: Notification sink for application connection lifecycle changes
// ABOUTME: Registered dynamically; invoked from the worker pool on up/down transitions

//! Connection lifecycle sinks.

use async_trait::async_trait;

/// Listener for application connection up/down transitions
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Called after an application authenticates (`connected == true`) and
    /// after its connection closes (`connected == false`).
    async fn on_app_connection_changed(&self, app_id: &str, connection_id: u32, connected: bool);
}
