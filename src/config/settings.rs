// ABOUTME: Gateway service settings loaded from a JSON file plus GATEKIT_ environment overrides
// ABOUTME: Covers the connector address, worker sizing, platform config paths, and optional features

//! Gateway service settings.
//!
//! [`GatewayConfig`] carries everything the embedding supplies about the
//! runtime environment: the loopback connector to bind, worker pool sizing,
//! where the platform config files live, and the optional traffic-mirror /
//! enhanced-logging toggles. Settings are loaded from an optional JSON file
//! with `GATEKIT_`-prefixed environment variables layered on top, so a
//! deployment can override any single field without editing the file.

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::constants::{limits, network, paths};
use crate::error::{GatekitError, Result};

/// Runtime settings for the gateway service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Loopback address the WebSocket server binds, `host:port`
    pub connector: String,
    /// Number of workers draining the job queue
    pub worker_count: usize,
    /// Capacity of the job queue feeding the workers
    pub job_queue_capacity: usize,
    /// Regional selection file
    pub regional_selection_path: String,
    /// Base resolution table used when no regional selection applies
    pub default_resolution_path: String,
    /// Vendor platform config carrying the `country` key
    pub vendor_config_path: String,
    /// Build platform config carrying the `country` key
    pub build_config_path: String,
    /// Log full inbound frames (app id, ids, method, params) at debug level
    pub enhanced_logging: bool,
    /// App id whose connection receives mirrored traffic, when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_app_id: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connector: network::DEFAULT_CONNECTOR.to_string(),
            worker_count: limits::DEFAULT_WORKER_COUNT,
            job_queue_capacity: limits::DEFAULT_JOB_QUEUE_CAPACITY,
            regional_selection_path: paths::REGIONAL_SELECTION_PATH.to_string(),
            default_resolution_path: paths::DEFAULT_RESOLUTION_PATH.to_string(),
            vendor_config_path: paths::VENDOR_CONFIG_PATH.to_string(),
            build_config_path: paths::BUILD_CONFIG_PATH.to_string(),
            enhanced_logging: false,
            mirror_app_id: None,
        }
    }
}

impl GatewayConfig {
    /// Load settings from an optional JSON file plus `GATEKIT_` environment
    /// overrides. Environment values win over file values; file values win
    /// over defaults.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Json::file(path));
        }
        figment
            .merge(Env::prefixed("GATEKIT_"))
            .extract()
            .map_err(|e| GatekitError::config(format!("failed to load gateway config: {}", e)))
    }

    /// Validate settings that would otherwise fail deep inside startup.
    pub fn validate(&self) -> Result<()> {
        if self.connector.is_empty() {
            return Err(GatekitError::config("connector cannot be empty"));
        }
        if self.worker_count == 0 {
            return Err(GatekitError::config("worker_count cannot be 0"));
        }
        if self.job_queue_capacity == 0 {
            return Err(GatekitError::config("job_queue_capacity cannot be 0"));
        }
        Ok(())
    }
}
