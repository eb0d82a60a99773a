// ABOUTME: Two-mode downstream invocation bridge, generic JSON-RPC by callsign and typed capability
// ABOUTME: Owns alias parsing; capability lookups go through the plugin broker

//! Downstream plugin bridge.
//!
//! The bridge turns a resolved alias into a downstream invocation:
//!
//! - **Generic JSON-RPC** (`invoke_json_rpc`): the alias is
//!   `<callsign>.<method>` — split at the *last* dot — and the call goes
//!   through the plugin's [`RpcLink`].
//! - **Typed capability** (`invoke_typed`): the alias is the bare callsign
//!   and the call goes through the plugin's [`GatewayRequestHandler`] with
//!   the full caller context.
//!
//! Capability references are `Arc`s obtained per call and dropped on every
//! exit path; the bridge holds no plugin state between requests.

use std::sync::Arc;

use crate::context::CallContext;
use crate::error::{GatekitError, Result};
use crate::traits::plugins::PluginBroker;

/// Split an alias into `(callsign, method)` at the last dot.
///
/// Without a dot the whole alias is the callsign and the method is empty;
/// the generic invocation path rejects that shape, the typed path expects
/// it.
pub fn parse_alias(alias: &str) -> (&str, &str) {
    match alias.rfind('.') {
        Some(dot) => (&alias[..dot], &alias[dot + 1..]),
        None => (alias, ""),
    }
}

/// Downstream invocation front-end over a plugin broker
pub struct PluginBridge {
    broker: Arc<dyn PluginBroker>,
}

impl PluginBridge {
    /// Create a bridge over the given plugin directory
    pub fn new(broker: Arc<dyn PluginBroker>) -> Self {
        Self { broker }
    }

    /// The underlying broker, for capability lookups outside the bridge
    pub fn broker(&self) -> Arc<dyn PluginBroker> {
        Arc::clone(&self.broker)
    }

    /// Mode A: invoke `<callsign>.<method>` generically with opaque params.
    pub async fn invoke_json_rpc(&self, alias: &str, params: &str) -> Result<String> {
        if alias.is_empty() {
            tracing::error!("Empty alias provided");
            return Err(GatekitError::EmptyAlias);
        }

        let (callsign, method) = parse_alias(alias);
        tracing::trace!(
            "Parsed alias '{}' -> callsign: '{}', method: '{}'",
            alias,
            callsign,
            method
        );
        if callsign.is_empty() || method.is_empty() {
            tracing::error!("No method found in alias: {}", alias);
            return Err(GatekitError::EmptyAlias);
        }

        let link = self
            .broker
            .rpc_link(callsign)
            .ok_or_else(|| GatekitError::UnknownCallsign(callsign.to_string()))?;

        link.invoke(method, params).await.map_err(|e| {
            tracing::error!("Invoke failed for {}.{}: {}", callsign, method, e);
            e
        })
    }

    /// Mode B: invoke the typed gateway request handler of `callsign`.
    pub async fn invoke_typed(
        &self,
        callsign: &str,
        context: &CallContext,
        method: &str,
        params: &str,
    ) -> Result<String> {
        if callsign.is_empty() {
            return Err(GatekitError::EmptyAlias);
        }

        let handler = self
            .broker
            .request_handler(callsign)
            .ok_or_else(|| GatekitError::CapabilityUnavailable(callsign.to_string()))?;

        handler
            .handle_gateway_request(context, method, params)
            .await
            .map_err(|e| {
                tracing::error!("Gateway request handler failed for callsign {}: {}", callsign, e);
                e
            })
    }
}
