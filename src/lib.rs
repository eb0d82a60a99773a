// ABOUTME: Main library entry point for the gatekit gateway
// ABOUTME: Embedded WebSocket application gateway with configurable method resolution

//! # Gatekit
//!
//! An embedded application gateway that sits between locally running
//! applications (JSON-RPC 2.0 over a loopback WebSocket) and an in-process
//! plugin framework exposing device capabilities.
//!
//! ## What it does
//!
//! - **Method resolution**: a layered, regionally-selected configuration
//!   maps every application-facing method to a downstream alias, an
//!   optional permission group, event metadata, and a dispatch mode.
//! - **Dispatch**: each request is authenticated, resolved, permission
//!   checked, and invoked downstream — generically by callsign or through
//!   a strongly-typed capability — with the reply delivered asynchronously
//!   on the origin's back-channel.
//! - **Subscriptions**: apps subscribe to events with `{"listen": true}`;
//!   the gateway keeps exactly one upstream registration per event and
//!   fans emissions out to every subscribed connection, app-scoped when
//!   the plugin targets one application.
//! - **Connections**: per-connection identity, bounded pre-authentication
//!   queueing, and disconnect cleanup that releases every subscription the
//!   connection held.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatekit::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> gatekit::error::Result<()> {
//! let mut broker = StaticPluginBroker::new();
//! broker.register_rpc_link("org.rdk.System", |method, _params| match method {
//!     "getFriendlyName" => Ok("\"Living Room\"".to_string()),
//!     _ => Err(GatekitError::invoke_failed(2, "unknown method")),
//! });
//!
//! let authenticator = StaticAuthenticator::new().with_session("token-1", "app-1");
//!
//! let mut gateway = Gateway::builder()
//!     .config(GatewayConfig::default())
//!     .authenticator(Arc::new(authenticator))
//!     .broker(Arc::new(broker))
//!     .build()?;
//! gateway.configure_resolutions()?;
//! gateway.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod gateway;
pub mod monitoring;
pub mod notifications;
pub mod resolver;
pub mod server;
pub mod subscriptions;
pub mod testing;
pub mod traits;
pub mod types;
pub mod workers;

// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::bridge::{parse_alias, PluginBridge};
    pub use crate::client::GatewayClient;
    pub use crate::config::settings::GatewayConfig;
    pub use crate::config::resolution::{Resolution, ResolutionTable};
    pub use crate::context::{CallContext, SubscriberContext};
    pub use crate::error::{GatekitError, Result};
    pub use crate::gateway::{Gateway, GatewayBuilder, GatewayDispatcher};
    pub use crate::notifications::{NotificationHub, OriginRouter};
    pub use crate::resolver::Resolver;
    pub use crate::server::{GatewayResponder, GatewaySocketServer, SocketServerConfig};
    pub use crate::testing::{StaticAuthenticator, StaticPluginBroker};
    pub use crate::traits::{
        Authenticator, ConnectionSink, EventEmitter, GatewayRequestHandler, NotificationHandler,
        PluginBroker, ResponderChannel, RpcLink,
    };
    pub use crate::types::jsonrpc::{
        ErrorEnvelope, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    };
}
