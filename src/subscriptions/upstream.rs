// ABOUTME: Upstream subscription manager deduplicating plugin event registrations
// ABOUTME: Exactly one active upstream registration per (module, event) regardless of app count

//! Upstream subscription management.
//!
//! However many applications listen to an event, the gateway registers
//! with the downstream plugin exactly once. This manager tracks the active
//! `(module, event)` pairs and drives the plugin's notification-handler
//! capability on the first subscriber and the last unsubscribe.
//!
//! The set lock is never held across a downstream call: state is probed,
//! the lock released, the plugin called, and the result recorded under a
//! fresh lock. Downstream failures leave the set unchanged — the subscriber
//! registry stays the source of truth and the next edge transition retries.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::traits::plugins::{EventEmitter, PluginBroker};

/// One active upstream registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamKey {
    /// Plugin callsign
    pub module: String,
    /// Plugin-local event name, lower-cased
    pub event: String,
}

impl UpstreamKey {
    /// Build a key, normalizing the event name
    pub fn new(module: &str, event: &str) -> Self {
        Self {
            module: module.to_string(),
            event: event.to_lowercase(),
        }
    }
}

/// Deduplicating manager for gateway-to-plugin event registrations
pub struct UpstreamSubscriptionManager {
    broker: Arc<dyn PluginBroker>,
    active: Mutex<Vec<UpstreamKey>>,
}

impl UpstreamSubscriptionManager {
    /// Create a manager over the given plugin directory
    pub fn new(broker: Arc<dyn PluginBroker>) -> Self {
        Self {
            broker,
            active: Mutex::new(Vec::new()),
        }
    }

    /// True when `(module, event)` is registered upstream
    pub fn is_active(&self, module: &str, event: &str) -> bool {
        let key = UpstreamKey::new(module, event);
        self.lock().contains(&key)
    }

    /// Snapshot of the active registrations
    pub fn active_pairs(&self) -> Vec<UpstreamKey> {
        self.lock().clone()
    }

    /// Register interest in `(module, event)` if not already active.
    pub async fn subscribe(
        &self,
        module: &str,
        event: &str,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<()> {
        let key = UpstreamKey::new(module, event);
        if self.lock().contains(&key) {
            tracing::trace!("Notification already registered: {}:{}", module, event);
            return Ok(());
        }

        match self.drive_notifier(module, &key.event, emitter, true).await {
            Ok(true) => {
                let mut active = self.lock();
                if !active.contains(&key) {
                    active.push(key);
                }
                Ok(())
            }
            Ok(false) => {
                tracing::error!("Plugin declined event registration for {}:{}", module, event);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Notification subscription failure for {}:{}: {}", module, event, e);
                Err(e)
            }
        }
    }

    /// Release the registration for `(module, event)` if active.
    pub async fn unsubscribe(
        &self,
        module: &str,
        event: &str,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<()> {
        let key = UpstreamKey::new(module, event);
        if !self.lock().contains(&key) {
            tracing::error!("Notification is not registered: {}:{}", module, event);
            return Ok(());
        }

        match self.drive_notifier(module, &key.event, emitter, false).await {
            Ok(_) => {
                self.lock().retain(|active| *active != key);
                Ok(())
            }
            Err(e) => {
                // Kept in the set; the next edge transition retries.
                tracing::error!(
                    "Notification unsubscription failure for {}:{}: {}",
                    module,
                    event,
                    e
                );
                Err(e)
            }
        }
    }

    /// Release every active registration; called on shutdown.
    pub async fn shutdown(&self, emitter: Arc<dyn EventEmitter>) {
        let pairs: Vec<UpstreamKey> = {
            let mut active = self.lock();
            active.drain(..).collect()
        };
        for key in pairs {
            if let Err(e) = self
                .drive_notifier(&key.module, &key.event, Arc::clone(&emitter), false)
                .await
            {
                tracing::error!("Shutdown unsubscribe failed for {}:{}: {}", key.module, key.event, e);
            }
        }
    }

    async fn drive_notifier(
        &self,
        module: &str,
        event: &str,
        emitter: Arc<dyn EventEmitter>,
        listen: bool,
    ) -> Result<bool> {
        let handler = match self.broker.notification_handler(module) {
            Some(handler) => handler,
            None => {
                tracing::error!("Notification handler not available for module={}", module);
                return Err(crate::error::GatekitError::CapabilityUnavailable(
                    module.to_string(),
                ));
            }
        };
        let status = handler.handle_event_notifier(emitter, event, listen).await?;
        tracing::trace!(
            "Notifier status for {}:{} is {}",
            module,
            event,
            if status { "true" } else { "false" }
        );
        Ok(status)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UpstreamKey>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
