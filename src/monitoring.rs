// ABOUTME: Metric names and recording helpers for the gateway
// ABOUTME: Thin layer over the metrics facade; an embedding installs its own recorder

//! Gateway metrics.
//!
//! All instrumentation goes through the `metrics` facade so an embedding
//! can install whatever recorder its platform provides. Without a recorder
//! every call is a no-op.

/// Requests read off connections and handed to the dispatcher
pub const REQUESTS_TOTAL: &str = "gatekit_requests_total";
/// Terminal resolutions delivered back to applications
pub const RESPONSES_TOTAL: &str = "gatekit_responses_total";
/// Events accepted from downstream plugins
pub const EVENTS_EMITTED_TOTAL: &str = "gatekit_events_emitted_total";
/// Event deliveries fanned out to subscribers
pub const EVENT_DELIVERIES_TOTAL: &str = "gatekit_event_deliveries_total";
/// Jobs submitted to the worker pool
pub const JOBS_SUBMITTED_TOTAL: &str = "gatekit_jobs_submitted_total";
/// Jobs completed by the worker pool
pub const JOBS_COMPLETED_TOTAL: &str = "gatekit_jobs_completed_total";
/// Currently authenticated connections
pub const CONNECTIONS_ACTIVE: &str = "gatekit_connections_active";

/// Record a request handed to the dispatcher
pub fn record_request() {
    metrics::counter!(REQUESTS_TOTAL).increment(1);
}

/// Record a terminal resolution delivered to an application
pub fn record_response() {
    metrics::counter!(RESPONSES_TOTAL).increment(1);
}

/// Record an event accepted from a downstream plugin
pub fn record_event_emitted() {
    metrics::counter!(EVENTS_EMITTED_TOTAL).increment(1);
}

/// Record one fanout delivery
pub fn record_event_delivery() {
    metrics::counter!(EVENT_DELIVERIES_TOTAL).increment(1);
}

/// Record a job submitted to the worker pool
pub fn record_job_submitted() {
    metrics::counter!(JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a job completed by the worker pool
pub fn record_job_completed() {
    metrics::counter!(JOBS_COMPLETED_TOTAL).increment(1);
}

/// Track the authenticated connection count
pub fn record_connection_change(connected: bool) {
    let gauge = metrics::gauge!(CONNECTIONS_ACTIVE);
    if connected {
        gauge.increment(1.0);
    } else {
        gauge.decrement(1.0);
    }
}
