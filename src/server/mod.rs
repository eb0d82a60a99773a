// ABOUTME: WebSocket server module for the gatekit gateway
// ABOUTME: Connection manager, responder back-channel, registries, and traffic mirroring

//! WebSocket server for the gatekit gateway.

pub mod common;
pub mod mirror;
pub mod registry;
pub mod responder;
pub mod websocket;

pub use common::{SocketServerConfig, SocketServerConfigBuilder};
pub use mirror::TrafficMirror;
pub use registry::{AppIdRegistry, ConnectionSinkRegistry, ConnectionTable};
pub use responder::GatewayResponder;
pub use websocket::GatewaySocketServer;
