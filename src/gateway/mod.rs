// ABOUTME: Gateway orchestration, the request dispatcher and the top-level assembly
// ABOUTME: GatewayBuilder wires resolver, hub, bridge, responder, and socket server together

//! Gateway orchestration.
//!
//! [`GatewayDispatcher`] drives individual requests;
//! [`Gateway`]/[`GatewayBuilder`] assemble the whole service: worker pool,
//! resolver, notification hub, responder channels, and the WebSocket
//! server, wired exactly as an embedding needs them.

pub mod dispatcher;

pub use dispatcher::GatewayDispatcher;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::bridge::PluginBridge;
use crate::config::settings::GatewayConfig;
use crate::constants::origins;
use crate::error::{GatekitError, Result};
use crate::notifications::{NotificationHub, OriginRouter};
use crate::resolver::Resolver;
use crate::server::common::SocketServerConfig;
use crate::server::mirror::TrafficMirror;
use crate::server::registry::{AppIdRegistry, ConnectionSinkRegistry, ConnectionTable};
use crate::server::responder::GatewayResponder;
use crate::server::websocket::GatewaySocketServer;
use crate::traits::plugins::{EventEmitter, PluginBroker};
use crate::traits::responder::ResponderChannel;
use crate::traits::sinks::ConnectionSink;
use crate::traits::Authenticator;
use crate::workers::WorkerPool;

/// Fully wired gateway service
pub struct Gateway {
    config: GatewayConfig,
    resolver: Arc<Resolver>,
    hub: Arc<NotificationHub>,
    responder: Arc<GatewayResponder>,
    router: Arc<OriginRouter>,
    sinks: Arc<ConnectionSinkRegistry>,
    app_ids: Arc<AppIdRegistry>,
    workers: Arc<WorkerPool>,
    server: GatewaySocketServer,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Start building a gateway
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// The active service settings
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The method resolver; exposed for hot reconfiguration
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// The notification hub; also the [`EventEmitter`] handed to plugins
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// The emitter capability plugins call to fire events
    pub fn emitter(&self) -> Arc<dyn EventEmitter> {
        Arc::clone(&self.hub) as Arc<dyn EventEmitter>
    }

    /// The public gateway responder channel
    pub fn responder(&self) -> &Arc<GatewayResponder> {
        &self.responder
    }

    /// The origin routing table
    pub fn router(&self) -> &Arc<OriginRouter> {
        &self.router
    }

    /// Connection currently carrying an app, if it is connected.
    ///
    /// Embeddings use this with [`Gateway::responder`] to push
    /// server-initiated requests at a known application.
    pub fn connection_for_app(&self, app_id: &str) -> Option<u32> {
        self.app_ids.connection_for_app(app_id)
    }

    /// Load the resolution tables per the service settings (regional
    /// selection plus platform country lookup).
    pub fn configure_resolutions(&self) -> Result<()> {
        self.resolver.configure_from(&self.config)
    }

    /// Load the resolution tables from an explicit ordered path list.
    pub fn configure_resolution_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Err(GatekitError::config("no configuration paths provided"));
        }
        self.resolver.configure(paths)
    }

    /// Register a connection lifecycle sink
    pub fn register_connection_sink(&self, sink: Arc<dyn ConnectionSink>) {
        self.sinks.register(sink);
    }

    /// Unregister a connection lifecycle sink
    pub fn unregister_connection_sink(&self, sink: &Arc<dyn ConnectionSink>) -> bool {
        self.sinks.unregister(sink)
    }

    /// Bind the server socket; returns the bound address.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        self.server.bind().await
    }

    /// Handle used to stop the accept loop from another task
    pub fn shutdown_handle(&self) -> Arc<tokio::sync::Notify> {
        self.server.shutdown_handle()
    }

    /// Run the accept loop until shutdown is requested.
    pub async fn run(&mut self) -> Result<()> {
        self.server.run().await
    }

    /// Bind and run in one call.
    pub async fn start(&mut self) -> Result<()> {
        self.server.start().await
    }

    /// Stop accepting, release upstream subscriptions, drain workers.
    pub async fn stop(&self) {
        self.shutdown_handle().notify_waiters();
        self.hub.shutdown().await;
        self.workers.shutdown().await;
    }
}

/// Builder assembling a [`Gateway`]
#[derive(Default)]
pub struct GatewayBuilder {
    config: Option<GatewayConfig>,
    authenticator: Option<Arc<dyn Authenticator>>,
    broker: Option<Arc<dyn PluginBroker>>,
    launch_delegate: Option<Arc<dyn ResponderChannel>>,
}

impl GatewayBuilder {
    /// Service settings; defaults apply when omitted
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The session/permission authority (mandatory)
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// The plugin directory (mandatory)
    pub fn broker(mut self, broker: Arc<dyn PluginBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Responder channel for the internal launch-delegate origin
    pub fn launch_delegate(mut self, channel: Arc<dyn ResponderChannel>) -> Self {
        self.launch_delegate = Some(channel);
        self
    }

    /// Wire everything together.
    pub fn build(self) -> Result<Gateway> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let authenticator = self
            .authenticator
            .ok_or_else(|| GatekitError::config("authenticator is required"))?;
        let broker = self
            .broker
            .ok_or_else(|| GatekitError::config("plugin broker is required"))?;

        let workers = Arc::new(WorkerPool::new(config.worker_count, config.job_queue_capacity));
        let resolver = Arc::new(Resolver::new());
        let connections = Arc::new(ConnectionTable::new());
        let app_ids = Arc::new(AppIdRegistry::new());
        let sinks = Arc::new(ConnectionSinkRegistry::new());
        let mirror = Arc::new(TrafficMirror::new(
            config.mirror_app_id.clone(),
            Arc::clone(&connections),
        ));

        let responder = GatewayResponder::new(
            Arc::clone(&connections),
            Arc::clone(&workers),
            Arc::clone(&mirror),
        );
        let router = Arc::new(OriginRouter::new());
        router.register(origins::GATEWAY, Arc::clone(&responder) as Arc<dyn ResponderChannel>);
        if let Some(delegate) = self.launch_delegate {
            router.register(origins::LAUNCH_DELEGATE, delegate);
        }

        let hub = NotificationHub::new(
            Arc::clone(&broker),
            Arc::clone(&router),
            Arc::clone(&resolver),
            Arc::clone(&workers),
        );

        let dispatcher = Arc::new(GatewayDispatcher::new(
            Arc::clone(&resolver),
            PluginBridge::new(Arc::clone(&broker)),
            Arc::clone(&hub),
            Arc::clone(&authenticator),
            Arc::clone(&router),
            Arc::clone(&workers),
        ));

        let server = GatewaySocketServer::new(
            SocketServerConfig::from(&config),
            authenticator,
            dispatcher,
            Arc::clone(&hub),
            connections,
            Arc::clone(&app_ids),
            Arc::clone(&sinks),
            Arc::clone(&workers),
            mirror,
        );

        Ok(Gateway {
            config,
            resolver,
            hub,
            responder,
            router,
            sinks,
            app_ids,
            workers,
            server,
        })
    }
}
