// ABOUTME: Request dispatcher, resolve then authorize then dispatch then respond
// ABOUTME: Terminal resolutions are handed to the origin's responder channel via the worker pool

//! Gateway request dispatch.
//!
//! [`GatewayDispatcher::resolve`] drives the full lifecycle of one request:
//!
//! 1. resolver configured? — else a framework error resolution,
//! 2. method known? — else `NotSupported`,
//! 3. permission group satisfied? — else `NotPermitted`,
//! 4. event methods branch into subscription handling,
//! 5. typed-capability methods go through bridge mode B,
//! 6. everything else goes through generic JSON-RPC (bridge mode A).
//!
//! Whatever the branch produces, the final resolution is submitted to the
//! worker pool and delivered through the responder channel selected by the
//! request's origin; the dispatcher never blocks on a socket write.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::bridge::PluginBridge;
use crate::context::{CallContext, SubscriberContext};
use crate::error::GatekitError;
use crate::monitoring;
use crate::notifications::{NotificationHub, OriginRouter};
use crate::resolver::Resolver;
use crate::traits::Authenticator;
use crate::types::jsonrpc::ErrorEnvelope;
use crate::workers::WorkerPool;

/// Per-request orchestrator for the gateway
pub struct GatewayDispatcher {
    resolver: Arc<Resolver>,
    bridge: PluginBridge,
    hub: Arc<NotificationHub>,
    authenticator: Arc<dyn Authenticator>,
    router: Arc<OriginRouter>,
    workers: Arc<WorkerPool>,
}

impl GatewayDispatcher {
    /// Wire a dispatcher over its collaborators
    pub fn new(
        resolver: Arc<Resolver>,
        bridge: PluginBridge,
        hub: Arc<NotificationHub>,
        authenticator: Arc<dyn Authenticator>,
        router: Arc<OriginRouter>,
        workers: Arc<WorkerPool>,
    ) -> Self {
        Self {
            resolver,
            bridge,
            hub,
            authenticator,
            router,
            workers,
        }
    }

    /// The method resolver backing this dispatcher
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// The notification hub backing this dispatcher
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Resolve one request and deliver its terminal resolution.
    ///
    /// The resolution is written back on the `origin` channel
    /// asynchronously; the returned future completes once the response job
    /// is queued, not once it is written.
    pub async fn resolve(&self, context: CallContext, origin: &str, method: &str, params: &str) {
        tracing::trace!("method={} params={}", method, params);
        monitoring::record_request();

        let resolution = self.fetch_resolution(&context, origin, method, params).await;
        if resolution.is_empty() {
            return;
        }
        tracing::trace!("Final resolution: {}", resolution);

        let router = Arc::clone(&self.router);
        let origin = origin.to_string();
        self.workers
            .submit(async move {
                match router.channel_for(&origin) {
                    Some(channel) => {
                        monitoring::record_response();
                        if let Err(e) = channel
                            .respond(context.connection_id, context.request_id, &resolution)
                            .await
                        {
                            tracing::error!(
                                "Response delivery failed for connection {}: {}",
                                context.connection_id,
                                e
                            );
                        }
                    }
                    None => {
                        tracing::error!("No responder channel registered for origin '{}'", origin);
                    }
                }
            })
            .await;
    }

    async fn fetch_resolution(
        &self,
        context: &CallContext,
        origin: &str,
        method: &str,
        params: &str,
    ) -> String {
        if !self.resolver.is_configured() {
            tracing::error!("Resolver not configured - no resolutions loaded");
            return ErrorEnvelope::internal("Resolver not configured").to_payload();
        }

        let alias = match self.resolver.resolve_alias(method) {
            Some(alias) => alias,
            None => {
                tracing::error!("No alias found for method: {}", method);
                return ErrorEnvelope::not_supported().to_payload();
            }
        };

        if let Some(group) = self.resolver.permission_group(method) {
            tracing::trace!("Method '{}' requires permission group '{}'", method, group);
            match self
                .authenticator
                .check_permission_group(&context.app_id, &group)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::error!(
                        "AppId '{}' not allowed in permission group '{}'",
                        context.app_id,
                        group
                    );
                    return ErrorEnvelope::not_permitted().to_payload();
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to check permission group '{}' for appId '{}': {}",
                        group,
                        context.app_id,
                        e
                    );
                    return ErrorEnvelope::not_permitted().to_payload();
                }
            }
        }
        tracing::trace!("Resolved method '{}' to alias '{}'", method, alias);

        if self.resolver.has_event(method) {
            self.pre_process_event(context, &alias, method, origin, params)
                .await
        } else if self.resolver.has_com_rpc_request_support(method) {
            self.process_typed_request(context, &alias, method, params, origin)
                .await
        } else {
            self.process_generic_request(context, &alias, method, params, origin)
                .await
        }
    }

    async fn pre_process_event(
        &self,
        context: &CallContext,
        alias: &str,
        method: &str,
        origin: &str,
        params: &str,
    ) -> String {
        let params_obj: Value = match serde_json::from_str(params) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                tracing::error!("Event method '{}' called without parameters", method);
                return ErrorEnvelope::bad_request("Event methods require parameters").to_payload();
            }
        };

        let listen = match params_obj.get("listen") {
            Some(Value::Bool(listen)) => *listen,
            _ => {
                tracing::error!(
                    "Event method '{}' missing required boolean 'listen' parameter",
                    method
                );
                return ErrorEnvelope::bad_request("Missing required boolean 'listen' parameter")
                    .to_payload();
            }
        };

        tracing::trace!("Event method '{}' with listen: {}", method, listen);
        let subscriber = SubscriberContext::from_call(context, origin);
        if let Err(e) = self.hub.subscribe(subscriber, listen, alias, method).await {
            tracing::error!("Subscription bookkeeping failed for '{}': {}", method, e);
            return ErrorEnvelope::internal("Subscription failed").to_payload();
        }

        json!({"listening": listen, "event": method}).to_string()
    }

    async fn process_typed_request(
        &self,
        context: &CallContext,
        alias: &str,
        method: &str,
        params: &str,
        origin: &str,
    ) -> String {
        let final_params = self.update_context(context, method, params, origin, true);
        match self
            .bridge
            .invoke_typed(alias, context, method, &final_params)
            .await
        {
            Ok(resolution) => resolution,
            Err(GatekitError::CapabilityUnavailable(callsign)) => {
                tracing::error!("Bad configuration, {} not available as typed capability", callsign);
                ErrorEnvelope::not_available().to_payload()
            }
            Err(e) => {
                tracing::error!("Typed request failed for callsign {}: {}", alias, e);
                ErrorEnvelope::internal("Gateway request handler failed").to_payload()
            }
        }
    }

    async fn process_generic_request(
        &self,
        context: &CallContext,
        alias: &str,
        method: &str,
        params: &str,
        origin: &str,
    ) -> String {
        let final_params = self.update_context(context, method, params, origin, false);
        tracing::trace!("Final request params alias={} params={}", alias, final_params);

        match self.bridge.invoke_json_rpc(alias, &final_params).await {
            Ok(resolution) => {
                if resolution.is_empty() {
                    "null".to_string()
                } else {
                    resolution
                }
            }
            Err(GatekitError::UnknownCallsign(callsign)) => {
                tracing::error!("No plugin registered under callsign {}", callsign);
                ErrorEnvelope::not_available().to_payload()
            }
            Err(e) => {
                tracing::error!("Failed to retrieve resolution from downstream {}: {}", alias, e);
                ErrorEnvelope::internal("Failed with internal error").to_payload()
            }
        }
    }

    /// Apply the method's context-inclusion rule to the outbound params.
    ///
    /// Generic dispatch injects a `context` object with the caller identity.
    /// Typed dispatch wraps the original params and merges the static
    /// extras with the origin under `_additionalContext`; downstream
    /// consumers depend on those exact field names.
    fn update_context(
        &self,
        context: &CallContext,
        method: &str,
        params: &str,
        origin: &str,
        only_additional_context: bool,
    ) -> String {
        let (include, additional_context) = self.resolver.include_context(method);
        if !include {
            return params.to_string();
        }
        tracing::trace!("Method '{}' requires context inclusion", method);

        let params_obj = match serde_json::from_str::<Value>(params) {
            Ok(Value::Object(obj)) => obj,
            Ok(_) | Err(_) => {
                // Params are optional in JSON-RPC; injection starts from {}.
                tracing::warn!("Failed to parse original params as JSON object: {}", params);
                Map::new()
            }
        };

        if only_additional_context {
            match additional_context {
                Some(Value::Object(mut extras)) => {
                    extras.insert("origin".to_string(), Value::String(origin.to_string()));
                    json!({
                        "params": Value::Object(params_obj),
                        "_additionalContext": Value::Object(extras),
                    })
                    .to_string()
                }
                _ => {
                    tracing::error!("Additional context is not a JSON object for method: {}", method);
                    params.to_string()
                }
            }
        } else {
            let mut params_obj = params_obj;
            params_obj.insert(
                "context".to_string(),
                json!({
                    "appId": context.app_id,
                    "connectionId": context.connection_id,
                    "requestId": context.request_id,
                }),
            );
            Value::Object(params_obj).to_string()
        }
    }
}
