// ABOUTME: Downstream plugin capabilities looked up by callsign
// ABOUTME: Defines the generic JSON-RPC link, the typed request handler, and event notifier hooks

//! Downstream plugin capabilities.
//!
//! The in-process plugin framework is abstracted as a [`PluginBroker`]:
//! a directory that hands out capability objects by callsign. Three
//! capabilities matter to the gateway:
//!
//! - [`RpcLink`] — the generic JSON-RPC invocation path (bridge mode A),
//! - [`GatewayRequestHandler`] — the strongly-typed request path
//!   (bridge mode B),
//! - [`NotificationHandler`] — upstream event registration, given an
//!   [`EventEmitter`] to call back into when events fire.
//!
//! Capabilities are reference counted (`Arc`); a lookup that returns `None`
//! means the callsign is unknown or the plugin does not expose the
//! capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::Result;

/// Generic JSON-RPC invocation link to one plugin
#[async_trait]
pub trait RpcLink: Send + Sync {
    /// Invoke `method` with serialized `params`, returning the serialized
    /// result. May block the calling worker while the plugin executes.
    async fn invoke(&self, method: &str, params: &str) -> Result<String>;
}

/// Strongly-typed gateway request handler exposed by a plugin
#[async_trait]
pub trait GatewayRequestHandler: Send + Sync {
    /// Handle a gateway request with full caller context.
    async fn handle_gateway_request(
        &self,
        context: &CallContext,
        method: &str,
        params: &str,
    ) -> Result<String>;
}

/// Callback capability handed to plugins so they can emit events
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emit an event toward subscribed applications.
    ///
    /// An empty `app_id` broadcasts to every subscriber of `event`; a
    /// non-empty `app_id` restricts delivery to that application.
    async fn emit(&self, event: &str, payload: &str, app_id: &str) -> Result<()>;
}

/// Upstream event registration capability exposed by a plugin
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Register (`listen == true`) or unregister (`listen == false`) the
    /// gateway's interest in `event`. The plugin reports whether the
    /// registration is active after the call.
    async fn handle_event_notifier(
        &self,
        emitter: Arc<dyn EventEmitter>,
        event: &str,
        listen: bool,
    ) -> Result<bool>;
}

/// Directory of plugins keyed by callsign
pub trait PluginBroker: Send + Sync {
    /// Generic JSON-RPC link for a callsign, if the plugin is available.
    fn rpc_link(&self, callsign: &str) -> Option<Arc<dyn RpcLink>>;

    /// Typed gateway request handler for a callsign, if exposed.
    fn request_handler(&self, callsign: &str) -> Option<Arc<dyn GatewayRequestHandler>>;

    /// Event notifier capability for a callsign, if exposed.
    fn notification_handler(&self, callsign: &str) -> Option<Arc<dyn NotificationHandler>>;
}
