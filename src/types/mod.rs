// ABOUTME: Wire-facing type definitions for the gatekit gateway
// ABOUTME: Currently hosts the JSON-RPC 2.0 message shapes

//! Wire-facing type definitions.

pub mod jsonrpc;

pub use jsonrpc::{
    ErrorEnvelope, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcServerRequest,
};
