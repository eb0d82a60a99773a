// ABOUTME: Notification hub wiring the subscriber registry, upstream manager, and origin routing
// ABOUTME: Accepts downstream emits and fans them out to subscribed connections asynchronously

//! Event fanout.
//!
//! The [`NotificationHub`] is the meeting point of the subscription
//! subsystems: the dispatcher feeds subscribe/unsubscribe edges into it,
//! downstream plugins call back into it through the [`EventEmitter`]
//! capability, and deliveries leave through the per-origin responder
//! channels.
//!
//! `emit` returns as soon as the delivery job is queued; fanout itself runs
//! on the worker pool with a snapshot of the subscriber list, so no
//! registry lock is ever held across a socket write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;

use crate::bridge::parse_alias;
use crate::context::SubscriberContext;
use crate::error::Result;
use crate::monitoring;
use crate::resolver::Resolver;
use crate::subscriptions::{SubscriberMap, UpstreamSubscriptionManager};
use crate::traits::plugins::{EventEmitter, PluginBroker};
use crate::traits::responder::ResponderChannel;
use crate::workers::WorkerPool;

/// Table of responder channels keyed by origin callsign.
///
/// Origins are a registered table rather than a hard-coded pair: the two
/// built-in origins are wired at startup and an embedding may add more.
#[derive(Default)]
pub struct OriginRouter {
    channels: RwLock<HashMap<String, Arc<dyn ResponderChannel>>>,
}

impl OriginRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the channel carrying an origin's deliveries
    pub fn register(&self, origin: &str, channel: Arc<dyn ResponderChannel>) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.insert(origin.to_string(), channel);
        tracing::info!("Registered responder channel for origin '{}'", origin);
    }

    /// Channel for an origin, if registered
    pub fn channel_for(&self, origin: &str) -> Option<Arc<dyn ResponderChannel>> {
        self.channels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(origin)
            .cloned()
    }
}

/// Subscription bookkeeping plus event fanout
pub struct NotificationHub {
    subscribers: SubscriberMap,
    upstream: Arc<UpstreamSubscriptionManager>,
    router: Arc<OriginRouter>,
    resolver: Arc<Resolver>,
    workers: Arc<WorkerPool>,
    // Self-reference so the hub can hand itself out as the emitter
    // capability from plain `&self` methods.
    me: Weak<NotificationHub>,
}

impl NotificationHub {
    /// Create a hub over the given collaborators
    pub fn new(
        broker: Arc<dyn PluginBroker>,
        router: Arc<OriginRouter>,
        resolver: Arc<Resolver>,
        workers: Arc<WorkerPool>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            subscribers: SubscriberMap::new(),
            upstream: Arc::new(UpstreamSubscriptionManager::new(broker)),
            router,
            resolver,
            workers,
            me: me.clone(),
        })
    }

    fn emitter_capability(&self) -> Option<Arc<dyn EventEmitter>> {
        self.me.upgrade().map(|hub| hub as Arc<dyn EventEmitter>)
    }

    /// The subscriber registry, exposed for invariant checks
    pub fn registry(&self) -> &SubscriberMap {
        &self.subscribers
    }

    /// The upstream manager, exposed for invariant checks
    pub fn upstream(&self) -> &UpstreamSubscriptionManager {
        &self.upstream
    }

    /// The origin routing table
    pub fn router(&self) -> &OriginRouter {
        &self.router
    }

    /// Process a subscribe (`listen == true`) or unsubscribe edge.
    ///
    /// `event` is the application-facing method name (the registry key);
    /// `alias` is its resolved downstream target, parsed here into the
    /// upstream `(module, event)` pair. The registry mutation is applied
    /// synchronously — before the acknowledgment is written — while the
    /// upstream registration runs as a worker job.
    pub async fn subscribe(
        &self,
        context: SubscriberContext,
        listen: bool,
        alias: &str,
        event: &str,
    ) -> Result<()> {
        tracing::trace!(
            "Subscribe [requestId={} appId={} connectionId={}] register={}, module={}, event={}",
            context.request_id,
            context.app_id,
            context.connection_id,
            listen,
            alias,
            event
        );

        let (module, upstream_event) = {
            let (module, upstream_event) = parse_alias(alias);
            (module.to_string(), upstream_event.to_string())
        };

        if listen {
            let first_subscriber = !self.subscribers.exists(event);
            self.subscribers.add(event, context);
            if first_subscriber {
                self.spawn_upstream_edge(module, upstream_event, true).await;
            }
        } else {
            self.subscribers.remove(event, &context);
            if !self.subscribers.exists(event) {
                self.spawn_upstream_edge(module, upstream_event, false).await;
            }
        }
        Ok(())
    }

    /// Release every subscription a connection holds on an origin.
    ///
    /// Events whose last subscriber disappears have their upstream
    /// registration released as well.
    pub async fn cleanup(&self, connection_id: u32, origin: &str) {
        tracing::trace!("Cleanup [connectionId={} origin={}]", connection_id, origin);
        let emptied = self.subscribers.cleanup(connection_id, origin);
        for event in emptied {
            match self.upstream_pair_for(&event) {
                Some((module, upstream_event)) => {
                    self.spawn_upstream_edge(module, upstream_event, false).await;
                }
                None => {
                    tracing::warn!(
                        "No resolution for emptied event '{}', upstream registration left to expire",
                        event
                    );
                }
            }
        }
    }

    /// Release all upstream registrations; called on gateway shutdown.
    pub async fn shutdown(&self) {
        let Some(emitter) = self.emitter_capability() else {
            return;
        };
        self.upstream.shutdown(emitter).await;
    }

    fn upstream_pair_for(&self, event: &str) -> Option<(String, String)> {
        let alias = self.resolver.resolve_alias(event)?;
        let (module, upstream_event) = parse_alias(&alias);
        Some((module.to_string(), upstream_event.to_string()))
    }

    async fn spawn_upstream_edge(&self, module: String, event: String, listen: bool) {
        let upstream = Arc::clone(&self.upstream);
        let Some(emitter) = self.emitter_capability() else {
            return;
        };
        self.workers
            .submit(async move {
                let result = if listen {
                    upstream.subscribe(&module, &event, emitter).await
                } else {
                    upstream.unsubscribe(&module, &event, emitter).await
                };
                if let Err(e) = result {
                    tracing::error!(
                        "Upstream {} edge failed for {}:{}: {}",
                        if listen { "subscribe" } else { "unsubscribe" },
                        module,
                        event,
                        e
                    );
                }
            })
            .await;
    }
}

#[async_trait]
impl EventEmitter for NotificationHub {
    async fn emit(&self, event: &str, payload: &str, app_id: &str) -> Result<()> {
        tracing::trace!("Emit [event={} payload={} appId={}]", event, payload, app_id);
        monitoring::record_event_emitted();

        let targets: Vec<SubscriberContext> = self
            .subscribers
            .subscribers(event)
            .into_iter()
            .filter(|entry| app_id.is_empty() || entry.app_id == app_id)
            .collect();

        if targets.is_empty() {
            if !self.subscribers.exists(event) {
                tracing::warn!("No active listeners for event: {}", event);
            }
            return Ok(());
        }

        let router = Arc::clone(&self.router);
        let event = event.to_string();
        let payload = payload.to_string();
        self.workers
            .submit(async move {
                for entry in targets {
                    match router.channel_for(&entry.origin) {
                        Some(channel) => {
                            monitoring::record_event_delivery();
                            if let Err(e) = channel
                                .emit(entry.connection_id, &event, &payload)
                                .await
                            {
                                tracing::error!(
                                    "Event delivery failed for connection {}: {}",
                                    entry.connection_id,
                                    e
                                );
                            }
                        }
                        None => {
                            tracing::error!(
                                "No responder channel registered for origin '{}'",
                                entry.origin
                            );
                        }
                    }
                }
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::origins;
    use crate::testing::{
        RecordedDelivery, RecordingNotificationHandler, RecordingResponder, StaticPluginBroker,
    };
    use std::io::Write;
    use tempfile::TempDir;

    struct Fixture {
        hub: Arc<NotificationHub>,
        responder: Arc<RecordingResponder>,
        handler: Arc<RecordingNotificationHandler>,
        workers: Arc<WorkerPool>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"{"resolutions":{"audio.onChanged":{"alias":"org.rdk.Audio.onChanged","event":"onChanged"}}}"#,
        )
        .unwrap();

        let resolver = Arc::new(Resolver::new());
        resolver
            .configure(&[path.to_string_lossy().to_string()])
            .unwrap();

        let handler = Arc::new(RecordingNotificationHandler::new());
        let mut broker = StaticPluginBroker::new();
        broker.register_notification_handler("org.rdk.Audio", Arc::clone(&handler) as _);

        let responder = Arc::new(RecordingResponder::new());
        let router = Arc::new(OriginRouter::new());
        router.register(origins::GATEWAY, Arc::clone(&responder) as _);

        let workers = Arc::new(WorkerPool::new(2, 16));
        let hub = NotificationHub::new(
            Arc::new(broker),
            router,
            resolver,
            Arc::clone(&workers),
        );

        Fixture {
            hub,
            responder,
            handler,
            workers,
            _dir: dir,
        }
    }

    fn subscriber(connection_id: u32, app_id: &str, request_id: u32) -> SubscriberContext {
        SubscriberContext {
            request_id,
            connection_id,
            app_id: app_id.to_string(),
            origin: origins::GATEWAY.to_string(),
        }
    }

    async fn drain(workers: &Arc<WorkerPool>) {
        // Settle queued upstream/fanout jobs without shutting the pool down.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let _ = workers;
    }

    #[tokio::test]
    async fn test_first_subscriber_registers_upstream_once() {
        let fx = fixture();
        fx.hub
            .subscribe(subscriber(1, "a1", 9), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        fx.hub
            .subscribe(subscriber(2, "a2", 4), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        drain(&fx.workers).await;

        assert_eq!(fx.handler.calls(), vec![("onchanged".to_string(), true)]);
        assert!(fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"));
    }

    #[tokio::test]
    async fn test_last_unsubscribe_releases_upstream() {
        let fx = fixture();
        let first = subscriber(1, "a1", 9);
        let second = subscriber(2, "a2", 4);
        fx.hub
            .subscribe(first.clone(), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        fx.hub
            .subscribe(second.clone(), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        drain(&fx.workers).await;

        fx.hub
            .subscribe(first, false, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        drain(&fx.workers).await;
        assert!(fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"));

        fx.hub
            .subscribe(second, false, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        drain(&fx.workers).await;
        assert!(!fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"));
    }

    #[tokio::test]
    async fn test_emit_broadcasts_to_all_subscribers() {
        let fx = fixture();
        fx.hub
            .subscribe(subscriber(1, "a1", 9), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        fx.hub
            .subscribe(subscriber(2, "a2", 4), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();

        fx.hub.emit("audio.onChanged", r#"{"v":1}"#, "").await.unwrap();
        fx.responder.wait_for(2).await;

        let emits: Vec<u32> = fx
            .responder
            .deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                RecordedDelivery::Emit {
                    connection_id,
                    method,
                    payload,
                } => {
                    assert_eq!(method, "audio.onChanged");
                    assert_eq!(payload, r#"{"v":1}"#);
                    Some(connection_id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(emits.len(), 2);
        assert!(emits.contains(&1) && emits.contains(&2));
    }

    #[tokio::test]
    async fn test_targeted_emit_reaches_only_matching_app() {
        let fx = fixture();
        fx.hub
            .subscribe(subscriber(1, "a1", 9), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        fx.hub
            .subscribe(subscriber(2, "a2", 4), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();

        fx.hub.emit("audio.onChanged", r#"{"v":2}"#, "a1").await.unwrap();
        fx.responder.wait_for(1).await;
        drain(&fx.workers).await;

        let deliveries = fx.responder.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(
            &deliveries[0],
            RecordedDelivery::Emit { connection_id: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_warns_and_succeeds() {
        let fx = fixture();
        fx.hub.emit("audio.onChanged", "{}", "").await.unwrap();
        drain(&fx.workers).await;
        assert!(fx.responder.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_uses_the_subscriber_origin_channel() {
        let fx = fixture();
        let launcher_responder = Arc::new(RecordingResponder::new());
        fx.hub.router().register(
            crate::constants::origins::LAUNCH_DELEGATE,
            Arc::clone(&launcher_responder) as _,
        );

        // Same app, same event, two different back-channels.
        fx.hub
            .subscribe(subscriber(1, "a1", 9), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        let mut launcher_entry = subscriber(7, "a1", 3);
        launcher_entry.origin = crate::constants::origins::LAUNCH_DELEGATE.to_string();
        fx.hub
            .subscribe(launcher_entry, true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();

        fx.hub.emit("audio.onChanged", r#"{"v":5}"#, "").await.unwrap();
        fx.responder.wait_for(1).await;
        launcher_responder.wait_for(1).await;

        assert!(matches!(
            &fx.responder.deliveries()[0],
            RecordedDelivery::Emit { connection_id: 1, .. }
        ));
        assert!(matches!(
            &launcher_responder.deliveries()[0],
            RecordedDelivery::Emit { connection_id: 7, .. }
        ));
    }

    #[tokio::test]
    async fn test_upstream_active_iff_registry_has_subscribers() {
        let fx = fixture();
        let alias = "org.rdk.Audio.onChanged";
        let event = "audio.onChanged";

        // Interleave edges and check the invariant at every quiescent point.
        let a = subscriber(1, "a1", 1);
        let b = subscriber(2, "a2", 2);
        for (entry, listen) in [
            (a.clone(), true),
            (b.clone(), true),
            (a.clone(), false),
            (a.clone(), true),
            (b.clone(), false),
            (a.clone(), false),
        ] {
            fx.hub.subscribe(entry, listen, alias, event).await.unwrap();
            drain(&fx.workers).await;
            assert_eq!(
                fx.hub.registry().exists(event),
                fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"),
            );
        }
        assert!(!fx.hub.registry().exists(event));
    }

    #[tokio::test]
    async fn test_cleanup_releases_upstream_for_emptied_events() {
        let fx = fixture();
        fx.hub
            .subscribe(subscriber(1, "a1", 9), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        fx.hub
            .subscribe(subscriber(2, "a2", 4), true, "org.rdk.Audio.onChanged", "audio.onChanged")
            .await
            .unwrap();
        drain(&fx.workers).await;

        fx.hub.cleanup(1, origins::GATEWAY).await;
        drain(&fx.workers).await;
        assert!(fx.hub.registry().exists("audio.onChanged"));
        assert!(fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"));

        fx.hub.cleanup(2, origins::GATEWAY).await;
        drain(&fx.workers).await;
        assert!(!fx.hub.registry().exists("audio.onChanged"));
        assert!(!fx.hub.upstream().is_active("org.rdk.Audio", "onChanged"));
    }
}
