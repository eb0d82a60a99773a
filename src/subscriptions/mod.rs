// ABOUTME: Subscription state for the gateway
// ABOUTME: The per-event subscriber registry and the deduplicated upstream manager

//! Subscription state.
//!
//! [`registry::SubscriberMap`] owns every application subscription;
//! [`upstream::UpstreamSubscriptionManager`] keeps exactly one plugin-side
//! registration alive per `(module, event)` with at least one subscriber.

pub mod registry;
pub mod upstream;

pub use registry::SubscriberMap;
pub use upstream::{UpstreamKey, UpstreamSubscriptionManager};
