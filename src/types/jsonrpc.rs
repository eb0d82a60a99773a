// ABOUTME: JSON-RPC 2.0 wire message types for the application-facing WebSocket protocol
// ABOUTME: Covers inbound requests, outbound responses/notifications, and terminal error envelopes

//! JSON-RPC 2.0 wire types for the application-facing protocol.
//!
//! Every frame exchanged with an application is one of three shapes:
//!
//! - an inbound [`JsonRpcRequest`] (`id` + `method` + optional `params`),
//! - an outbound [`JsonRpcResponse`] correlated by `id` carrying either
//!   `result` or `error`,
//! - an outbound [`JsonRpcNotification`] (no `id`).
//!
//! Terminal error payloads travel inside the gateway as [`ErrorEnvelope`]
//! values (`{"code": <int>, "text": <string>}`); the responder converts them
//! to the wire `error` object (`code` + `message`) just before writing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version constant for all frames
pub const JSONRPC_VERSION: &str = "2.0";

/// Method not present in the resolver table
pub const ERROR_NOT_SUPPORTED: i64 = -50100;
/// Target callsign or capability unavailable
pub const ERROR_NOT_AVAILABLE: i64 = -50200;
/// Permission group check failed
pub const ERROR_NOT_PERMITTED: i64 = -40300;
/// Malformed request (missing `listen`, bad params)
pub const ERROR_BAD_REQUEST: i64 = -32600;
/// Downstream invocation failed
pub const ERROR_INTERNAL: i64 = -32603;

/// Inbound JSON-RPC request as received from an application.
///
/// All fields except `method` are optional at the parsing layer so the
/// connection manager can apply the protocol rules itself: a frame without
/// an `id` is dropped (the protocol is strictly request/response), a frame
/// without a `method` is answered with a bad-request error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version; not validated, the gateway only speaks 2.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Correlation id; mandatory for every client-originated message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Request method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request parameters, passed downstream as an opaque JSON value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Parameters serialized for downstream dispatch; `{}` when absent.
    pub fn params_string(&self) -> String {
        match &self.params {
            Some(value) => value.to_string(),
            None => "{}".to_string(),
        }
    }
}

/// Wire error object inside a response frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i64,
    /// Human-readable error message
    pub message: String,
}

/// Outbound JSON-RPC response frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version, always `2.0`
    pub jsonrpc: String,
    /// Correlation id copied from the request
    pub id: u32,
    /// Successful result, mutually exclusive with `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object, mutually exclusive with `result`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response
    pub fn result(id: u32, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response
    pub fn error(id: u32, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Server-initiated JSON-RPC notification (no `id`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol version, always `2.0`
    pub jsonrpc: String,
    /// Event method name
    pub method: String,
    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Build a notification frame
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Server-initiated JSON-RPC request pushed to an application.
///
/// Used by the gateway to interrogate an app; the app answers with a
/// response frame carrying the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcServerRequest {
    /// Protocol version, always `2.0`
    pub jsonrpc: String,
    /// Correlation id chosen by the gateway
    pub id: u32,
    /// Request method
    pub method: String,
    /// Request parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcServerRequest {
    /// Build a server-initiated request frame
    pub fn new(id: u32, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Terminal error envelope used for in-process resolutions.
///
/// The dispatcher and bridge produce these as the final resolution of a
/// failed request. The `text` field becomes the wire `message`; the field
/// name difference is deliberate and matched by [`ErrorEnvelope::from_payload`]
/// so ordinary results that happen to contain a `code` key are not
/// misclassified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    /// Numeric error code
    pub code: i64,
    /// Error text, mapped to the wire `message` field
    pub text: String,
}

impl ErrorEnvelope {
    /// Method not present in the resolver table
    pub fn not_supported() -> Self {
        Self {
            code: ERROR_NOT_SUPPORTED,
            text: "NotSupported".to_string(),
        }
    }

    /// Target callsign or capability unavailable
    pub fn not_available() -> Self {
        Self {
            code: ERROR_NOT_AVAILABLE,
            text: "NotAvailable".to_string(),
        }
    }

    /// Permission group check failed
    pub fn not_permitted() -> Self {
        Self {
            code: ERROR_NOT_PERMITTED,
            text: "NotPermitted".to_string(),
        }
    }

    /// Malformed request
    pub fn bad_request(text: impl Into<String>) -> Self {
        Self {
            code: ERROR_BAD_REQUEST,
            text: text.into(),
        }
    }

    /// Gateway-side failure
    pub fn internal(text: impl Into<String>) -> Self {
        Self {
            code: ERROR_INTERNAL,
            text: text.into(),
        }
    }

    /// Serialize to the resolution payload string
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"text":"serialization failure"}}"#, ERROR_INTERNAL)
        })
    }

    /// Detect an error envelope inside an opaque resolution payload.
    ///
    /// Returns `Some` only for a JSON object with an integer `code` and a
    /// string `text`; everything else is an ordinary result.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(payload).ok()?;
        let obj = value.as_object()?;
        let code = obj.get("code")?.as_i64()?;
        let text = obj.get("text")?.as_str()?.to_string();
        Some(Self { code, text })
    }

    /// Convert to the wire error object
    pub fn to_wire(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code,
            message: self.text.clone(),
        }
    }
}
