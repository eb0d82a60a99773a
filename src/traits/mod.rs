// ABOUTME: Capability traits at the seams of the gateway
// ABOUTME: Authentication, downstream plugins, responder back-channels, and lifecycle sinks

//! Capability traits at the seams of the gateway.
//!
//! Everything the gateway consumes from the outside world is expressed as a
//! trait object here: the authenticator, the plugin directory and its
//! capabilities, the responder back-channels, and the connection lifecycle
//! sinks. Tests and the demo binary provide in-memory implementations; a
//! production embedding provides bridges into its plugin framework.

pub mod auth;
pub mod plugins;
pub mod responder;
pub mod sinks;

pub use auth::Authenticator;
pub use plugins::{
    EventEmitter, GatewayRequestHandler, NotificationHandler, PluginBroker, RpcLink,
};
pub use responder::ResponderChannel;
pub use sinks::ConnectionSink;
