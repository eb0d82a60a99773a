// ABOUTME: Per-event subscriber registry keyed by lower-cased event names
// ABOUTME: Add/remove/snapshot plus per-connection cleanup reporting emptied events

//! Subscriber registry.
//!
//! Maps each event name (the application-facing method, lower-cased) to the
//! list of subscriber entries interested in it. The registry is the source
//! of truth for subscription state: upstream registration decisions key off
//! whether an event is present here before/after a mutation.
//!
//! One mutex guards the whole map; it is held only for structural changes
//! and snapshot copies, never across a delivery.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::context::SubscriberContext;

/// Event-to-subscribers mapping
#[derive(Debug, Default)]
pub struct SubscriberMap {
    inner: Mutex<HashMap<String, Vec<SubscriberContext>>>,
}

impl SubscriberMap {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber entry for an event.
    ///
    /// Duplicate `(connection, app, request)` triples are allowed: each
    /// subscribe request owns its own entry.
    pub fn add(&self, event: &str, context: SubscriberContext) {
        let key = event.to_lowercase();
        let mut map = self.lock();
        map.entry(key).or_default().push(context);
    }

    /// Remove entries matching the `(connection, app, request)` triple.
    ///
    /// The event key is erased once its list empties.
    pub fn remove(&self, event: &str, context: &SubscriberContext) {
        let key = event.to_lowercase();
        let mut map = self.lock();
        if let Some(entries) = map.get_mut(&key) {
            entries.retain(|entry| {
                !(entry.connection_id == context.connection_id
                    && entry.app_id == context.app_id
                    && entry.request_id == context.request_id)
            });
            if entries.is_empty() {
                map.remove(&key);
            }
        }
    }

    /// True when the event has at least one subscriber
    pub fn exists(&self, event: &str) -> bool {
        self.lock().contains_key(&event.to_lowercase())
    }

    /// Snapshot of the subscribers for an event
    pub fn subscribers(&self, event: &str) -> Vec<SubscriberContext> {
        self.lock()
            .get(&event.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Remove every entry for `connection_id` arriving via `origin`.
    ///
    /// Returns the events whose subscriber lists became empty, so the
    /// caller can release the matching upstream subscriptions.
    pub fn cleanup(&self, connection_id: u32, origin: &str) -> Vec<String> {
        let mut emptied = Vec::new();
        let mut map = self.lock();
        map.retain(|event, entries| {
            entries.retain(|entry| {
                !(entry.connection_id == connection_id && entry.origin == origin)
            });
            if entries.is_empty() {
                emptied.push(event.clone());
                false
            } else {
                true
            }
        });
        emptied
    }

    /// Number of distinct events with subscribers
    pub fn event_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<SubscriberContext>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::origins;

    fn entry(connection_id: u32, app_id: &str, request_id: u32) -> SubscriberContext {
        SubscriberContext {
            request_id,
            connection_id,
            app_id: app_id.to_string(),
            origin: origins::GATEWAY.to_string(),
        }
    }

    #[test]
    fn test_add_remove_round_trip() {
        let map = SubscriberMap::new();
        assert!(!map.exists("audio.onChanged"));

        let context = entry(1, "app-1", 9);
        map.add("audio.onChanged", context.clone());
        assert!(map.exists("audio.onChanged"));

        map.remove("audio.onChanged", &context);
        assert!(!map.exists("audio.onChanged"));
        assert_eq!(map.event_count(), 0);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let map = SubscriberMap::new();
        map.add("Audio.OnChanged", entry(1, "app-1", 9));
        assert!(map.exists("audio.onchanged"));
        assert_eq!(map.subscribers("AUDIO.ONCHANGED").len(), 1);
    }

    #[test]
    fn test_duplicate_request_ids_create_distinct_entries() {
        let map = SubscriberMap::new();
        map.add("e", entry(1, "app-1", 9));
        map.add("e", entry(1, "app-1", 10));
        assert_eq!(map.subscribers("e").len(), 2);

        map.remove("e", &entry(1, "app-1", 9));
        let remaining = map.subscribers("e");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].request_id, 10);
    }

    #[test]
    fn test_cleanup_removes_only_matching_origin() {
        let map = SubscriberMap::new();
        map.add("e", entry(1, "app-1", 9));
        let mut launcher_entry = entry(1, "app-1", 11);
        launcher_entry.origin = origins::LAUNCH_DELEGATE.to_string();
        map.add("e", launcher_entry);
        map.add("f", entry(2, "app-2", 10));

        let emptied = map.cleanup(1, origins::GATEWAY);
        assert!(emptied.is_empty());
        assert_eq!(map.subscribers("e").len(), 1);
        assert_eq!(map.subscribers("e")[0].origin, origins::LAUNCH_DELEGATE);
    }

    #[test]
    fn test_cleanup_reports_emptied_events() {
        let map = SubscriberMap::new();
        map.add("e", entry(1, "app-1", 9));
        map.add("f", entry(1, "app-1", 10));
        map.add("f", entry(2, "app-2", 11));

        let mut emptied = map.cleanup(1, origins::GATEWAY);
        emptied.sort();
        assert_eq!(emptied, vec!["e"]);
        assert!(!map.exists("e"));
        assert!(map.exists("f"));

        let emptied = map.cleanup(2, origins::GATEWAY);
        assert_eq!(emptied, vec!["f"]);
        assert_eq!(map.event_count(), 0);
    }
}
