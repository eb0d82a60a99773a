// ABOUTME: In-memory capability implementations for tests and the demo binary
// ABOUTME: Static plugin broker, static authenticator, and recording responder/sink doubles

//! In-memory capability implementations.
//!
//! The gateway consumes everything external through the traits in
//! [`crate::traits`]. This module provides simple in-memory implementations
//! used by the test suites and by the demo binary: a plugin directory
//! backed by closures, an authenticator backed by maps, and recording
//! doubles for the responder and connection-sink seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::{GatekitError, Result};
use crate::traits::plugins::{
    EventEmitter, GatewayRequestHandler, NotificationHandler, PluginBroker, RpcLink,
};
use crate::traits::responder::ResponderChannel;
use crate::traits::sinks::ConnectionSink;
use crate::traits::Authenticator;

type RpcFn = dyn Fn(&str, &str) -> Result<String> + Send + Sync;
type TypedFn = dyn Fn(&CallContext, &str, &str) -> Result<String> + Send + Sync;

struct FnRpcLink {
    handler: Box<RpcFn>,
}

#[async_trait]
impl RpcLink for FnRpcLink {
    async fn invoke(&self, method: &str, params: &str) -> Result<String> {
        (self.handler)(method, params)
    }
}

struct FnRequestHandler {
    handler: Box<TypedFn>,
}

#[async_trait]
impl GatewayRequestHandler for FnRequestHandler {
    async fn handle_gateway_request(
        &self,
        context: &CallContext,
        method: &str,
        params: &str,
    ) -> Result<String> {
        (self.handler)(context, method, params)
    }
}

/// Plugin directory backed by per-callsign closures
#[derive(Default)]
pub struct StaticPluginBroker {
    rpc_links: HashMap<String, Arc<dyn RpcLink>>,
    request_handlers: HashMap<String, Arc<dyn GatewayRequestHandler>>,
    notification_handlers: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl StaticPluginBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generic JSON-RPC handler for a callsign
    pub fn register_rpc_link<F>(&mut self, callsign: &str, handler: F)
    where
        F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        self.rpc_links.insert(
            callsign.to_string(),
            Arc::new(FnRpcLink {
                handler: Box::new(handler),
            }),
        );
    }

    /// Register a typed gateway request handler for a callsign
    pub fn register_request_handler<F>(&mut self, callsign: &str, handler: F)
    where
        F: Fn(&CallContext, &str, &str) -> Result<String> + Send + Sync + 'static,
    {
        self.request_handlers.insert(
            callsign.to_string(),
            Arc::new(FnRequestHandler {
                handler: Box::new(handler),
            }),
        );
    }

    /// Register an event notifier capability for a callsign
    pub fn register_notification_handler(
        &mut self,
        callsign: &str,
        handler: Arc<dyn NotificationHandler>,
    ) {
        self.notification_handlers
            .insert(callsign.to_string(), handler);
    }
}

impl PluginBroker for StaticPluginBroker {
    fn rpc_link(&self, callsign: &str) -> Option<Arc<dyn RpcLink>> {
        self.rpc_links.get(callsign).cloned()
    }

    fn request_handler(&self, callsign: &str) -> Option<Arc<dyn GatewayRequestHandler>> {
        self.request_handlers.get(callsign).cloned()
    }

    fn notification_handler(&self, callsign: &str) -> Option<Arc<dyn NotificationHandler>> {
        self.notification_handlers.get(callsign).cloned()
    }
}

/// Notification handler that records registrations and captures the emitter
/// so a test can later fire events back through the gateway.
#[derive(Default)]
pub struct RecordingNotificationHandler {
    calls: Mutex<Vec<(String, bool)>>,
    emitter: Mutex<Option<Arc<dyn EventEmitter>>>,
}

impl RecordingNotificationHandler {
    /// Create a handler that accepts every registration
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(event, listen)` registrations, in call order
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    /// The emitter captured from the most recent registration
    pub fn emitter(&self) -> Option<Arc<dyn EventEmitter>> {
        self.emitter.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationHandler for RecordingNotificationHandler {
    async fn handle_event_notifier(
        &self,
        emitter: Arc<dyn EventEmitter>,
        event: &str,
        listen: bool,
    ) -> Result<bool> {
        self.calls.lock().unwrap().push((event.to_string(), listen));
        *self.emitter.lock().unwrap() = Some(emitter);
        Ok(listen)
    }
}

/// Authenticator backed by in-memory session and group tables
#[derive(Default)]
pub struct StaticAuthenticator {
    sessions: HashMap<String, String>,
    groups: HashMap<String, HashSet<String>>,
}

impl StaticAuthenticator {
    /// Create an authenticator with no sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolvable session token
    pub fn with_session(mut self, token: &str, app_id: &str) -> Self {
        self.sessions.insert(token.to_string(), app_id.to_string());
        self
    }

    /// Authorize an app id under a permission group
    pub fn with_group_member(mut self, group: &str, app_id: &str) -> Self {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(app_id.to_string());
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, session: &str) -> Result<String> {
        self.sessions
            .get(session)
            .cloned()
            .ok_or_else(|| GatekitError::security(format!("unknown session: {}", session)))
    }

    async fn check_permission_group(&self, app_id: &str, group: &str) -> Result<bool> {
        Ok(self
            .groups
            .get(group)
            .map(|members| members.contains(app_id))
            .unwrap_or(false))
    }
}

/// One delivery captured by [`RecordingResponder`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedDelivery {
    /// `respond(connection_id, request_id, payload)`
    Respond {
        /// Target connection
        connection_id: u32,
        /// Correlated request id
        request_id: u32,
        /// Raw resolution payload
        payload: String,
    },
    /// `emit(connection_id, method, payload)`
    Emit {
        /// Target connection
        connection_id: u32,
        /// Notification method
        method: String,
        /// Raw event payload
        payload: String,
    },
    /// `request(connection_id, request_id, method, params)`
    Request {
        /// Target connection
        connection_id: u32,
        /// Request id chosen by the gateway
        request_id: u32,
        /// Request method
        method: String,
        /// Raw params
        params: String,
    },
}

/// Responder double capturing every delivery for verification
#[derive(Default)]
pub struct RecordingResponder {
    deliveries: Mutex<Vec<RecordedDelivery>>,
}

impl RecordingResponder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Wait until at least `count` deliveries have been recorded.
    ///
    /// Panics after five seconds so a missing delivery fails the test
    /// instead of hanging it.
    pub async fn wait_for(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if self.deliveries.lock().unwrap().len() >= count {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {} deliveries, saw {:?}",
                    count,
                    self.deliveries.lock().unwrap()
                );
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    fn record(&self, delivery: RecordedDelivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }
}

#[async_trait]
impl ResponderChannel for RecordingResponder {
    async fn respond(&self, connection_id: u32, request_id: u32, payload: &str) -> Result<()> {
        self.record(RecordedDelivery::Respond {
            connection_id,
            request_id,
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn emit(&self, connection_id: u32, method: &str, payload: &str) -> Result<()> {
        self.record(RecordedDelivery::Emit {
            connection_id,
            method: method.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn request(
        &self,
        connection_id: u32,
        request_id: u32,
        method: &str,
        params: &str,
    ) -> Result<()> {
        self.record(RecordedDelivery::Request {
            connection_id,
            request_id,
            method: method.to_string(),
            params: params.to_string(),
        });
        Ok(())
    }
}

/// Connection sink recording up/down transitions
#[derive(Default)]
pub struct RecordingSink {
    transitions: Mutex<Vec<(String, u32, bool)>>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(app_id, connection_id, connected)` transitions
    pub fn transitions(&self) -> Vec<(String, u32, bool)> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    async fn on_app_connection_changed(&self, app_id: &str, connection_id: u32, connected: bool) {
        self.transitions
            .lock()
            .unwrap()
            .push((app_id.to_string(), connection_id, connected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_authenticator() {
        let auth = StaticAuthenticator::new()
            .with_session("tok-1", "app-1")
            .with_group_member("restricted", "app-1");

        assert_eq!(auth.authenticate("tok-1").await.unwrap(), "app-1");
        assert!(auth.authenticate("tok-2").await.is_err());
        assert!(auth.check_permission_group("app-1", "restricted").await.unwrap());
        assert!(!auth.check_permission_group("app-2", "restricted").await.unwrap());
    }

    #[tokio::test]
    async fn test_recording_responder_wait_for() {
        let responder = Arc::new(RecordingResponder::new());
        let waiter = Arc::clone(&responder);
        let handle = tokio::spawn(async move { waiter.wait_for(1).await });
        responder.respond(1, 2, "null").await.unwrap();
        handle.await.unwrap();
        assert_eq!(responder.deliveries().len(), 1);
    }
}
