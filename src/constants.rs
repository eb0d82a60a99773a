// ABOUTME: Constants and default values for the gatekit gateway
// ABOUTME: Centralizes network defaults, resource limits, timeouts, config paths, and origin callsigns

//! Constants and default values for the gatekit gateway.
//!
//! This module centralizes all hard-coded values: network defaults, resource
//! limits, timeout values, well-known configuration paths, and the origin
//! callsigns used to route responses back to applications.

use std::time::Duration;

/// Network defaults
pub mod network {
    /// Default loopback connector the gateway binds to.
    ///
    /// The gateway is only reachable from local applications, so the default
    /// never binds a routable interface.
    pub const DEFAULT_CONNECTOR: &str = "127.0.0.1:3473";

    /// Query parameter carrying the session token during the WebSocket
    /// handshake.
    pub const SESSION_QUERY_KEY: &str = "session";
}

/// Resource limits
pub mod limits {
    /// Capacity of the per-connection queue holding messages that arrive
    /// before authentication completes. On overflow the oldest entry is
    /// dropped and answered with a synthetic error response.
    pub const PENDING_QUEUE_CAPACITY: usize = 10;

    /// Number of workers draining the gateway job queue.
    pub const DEFAULT_WORKER_COUNT: usize = 2;

    /// Capacity of the worker job queue. Submission awaits a free slot once
    /// the queue is full; it never grows unbounded.
    pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 64;

    /// Capacity of each connection's outbound write channel.
    pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;
}

/// Timeout values
pub mod timeouts {
    use super::*;

    /// How long the accept loop waits for the WebSocket handshake to
    /// complete before giving up on a connection.
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Grace period for draining in-flight jobs on shutdown.
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

    /// How long the client waits for a correlated response.
    pub const CLIENT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Well-known configuration paths
pub mod paths {
    /// Base resolution table, always present on the device image.
    pub const DEFAULT_RESOLUTION_PATH: &str = "/etc/gatekit/resolution.base.json";

    /// Regional selection file mapping country codes to resolution layers.
    pub const REGIONAL_SELECTION_PATH: &str = "/etc/gatekit/resolutions.json";

    /// Vendor platform config; its top-level `country` key wins over the
    /// build config when both are present.
    pub const VENDOR_CONFIG_PATH: &str = "/etc/gatekit/vendor.json";

    /// Build-time platform config, consulted after the vendor config.
    pub const BUILD_CONFIG_PATH: &str = "/etc/gatekit/build.json";

    /// Key read from the vendor/build config files.
    pub const COUNTRY_KEY: &str = "country";
}

/// Origin callsigns selecting the back-channel that carries a reply
pub mod origins {
    /// The public application gateway: replies go out on the WebSocket
    /// connection the request arrived on.
    pub const GATEWAY: &str = "gateway";

    /// The internal launch delegate: replies are handed to the in-process
    /// launcher channel instead of the public socket.
    pub const LAUNCH_DELEGATE: &str = "launcher";
}

/// Wire-visible method names the gateway itself emits
pub mod methods {
    /// Notification mirrored to the observer connection for every request,
    /// response, and notification on other connections.
    pub const OBSERVER_UPDATE: &str = "observer.update";

    /// Notification mirrored to the observer connection on connection
    /// up/down transitions.
    pub const OBSERVER_CONNECTION: &str = "observer.connection";
}
