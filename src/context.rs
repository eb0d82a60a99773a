// ABOUTME: Per-request context types flowing between the gateway subsystems
// ABOUTME: Provides the call context, the origin-tagged subscription context, and conversions

//! Per-request context propagation.
//!
//! A [`CallContext`] is created when a frame is read off a connection and is
//! passed by value through every hop of the dispatch: it never outlives the
//! request and is never shared across connections. Subscription bookkeeping
//! additionally needs to remember which back-channel the subscriber arrived
//! on, so the registry stores [`SubscriberContext`] values that extend the
//! call context with an origin callsign.

use serde::{Deserialize, Serialize};

use crate::constants::origins;

/// Identity of one in-flight request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// JSON-RPC correlation id from the request frame
    #[serde(rename = "requestId")]
    pub request_id: u32,
    /// Gateway-local id of the connection the request arrived on
    #[serde(rename = "connectionId")]
    pub connection_id: u32,
    /// Authenticated application id
    #[serde(rename = "appId")]
    pub app_id: String,
}

impl CallContext {
    /// Create a new call context
    pub fn new(request_id: u32, connection_id: u32, app_id: impl Into<String>) -> Self {
        Self {
            request_id,
            connection_id,
            app_id: app_id.into(),
        }
    }
}

/// Call context plus the origin callsign that will carry replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberContext {
    /// JSON-RPC correlation id of the subscribing request
    pub request_id: u32,
    /// Connection the subscription belongs to
    pub connection_id: u32,
    /// Authenticated application id
    pub app_id: String,
    /// Back-channel callsign for deliveries
    pub origin: String,
}

impl SubscriberContext {
    /// Attach an origin to a call context
    pub fn from_call(context: &CallContext, origin: impl Into<String>) -> Self {
        Self {
            request_id: context.request_id,
            connection_id: context.connection_id,
            app_id: context.app_id.clone(),
            origin: origin.into(),
        }
    }

    /// Project back to the plain call context
    pub fn to_call(&self) -> CallContext {
        CallContext {
            request_id: self.request_id,
            connection_id: self.connection_id,
            app_id: self.app_id.clone(),
        }
    }
}

/// True when the origin names the public gateway back-channel
pub fn is_gateway_origin(origin: &str) -> bool {
    origin == origins::GATEWAY
}
