// ABOUTME: Error types and handling for the gatekit gateway
// ABOUTME: Provides the crate-wide error enum plus bridge-specific invocation failures

//! Error types and utilities for the gatekit gateway.
//!
//! This module provides the crate-wide error type covering configuration,
//! transport, resolution, and downstream-invocation failures. Wire-visible
//! error envelopes (the `{code, text}` payloads that terminate a request)
//! live in [`crate::types::jsonrpc`]; the variants here never leave the
//! process.

use thiserror::Error;

/// Result type alias for gatekit operations
pub type Result<T> = std::result::Result<T, GatekitError>;

/// Crate-wide error type for all gatekit operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatekitError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Network/transport errors
    #[error("transport error: {0}")]
    Transport(String),

    /// Method resolution errors
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Authentication/authorization errors
    #[error("security error: {0}")]
    Security(String),

    /// Internal gateway errors
    #[error("internal error: {0}")]
    Internal(String),

    /// Connection lifecycle errors
    #[error("connection error: {0}")]
    Connection(String),

    /// Subscription bookkeeping errors
    #[error("subscription error: {0}")]
    Subscription(String),

    /// No plugin is registered under the requested callsign
    #[error("unknown callsign: {0}")]
    UnknownCallsign(String),

    /// The callsign exists but does not expose the requested capability
    #[error("capability unavailable for callsign: {0}")]
    CapabilityUnavailable(String),

    /// A resolution row carried an empty alias
    #[error("empty alias")]
    EmptyAlias,

    /// The downstream plugin reported a failure
    #[error("invoke failed ({code}): {text}")]
    InvokeFailed {
        /// Downstream status code
        code: i64,
        /// Downstream status text
        text: String,
    },
}

impl GatekitError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a security error
    pub fn security(msg: impl Into<String>) -> Self {
        Self::Security(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    /// Create an invoke failure from a downstream status
    pub fn invoke_failed(code: i64, text: impl Into<String>) -> Self {
        Self::InvokeFailed {
            code,
            text: text.into(),
        }
    }
}

impl From<serde_json::Error> for GatekitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for GatekitError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
