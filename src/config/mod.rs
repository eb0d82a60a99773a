// ABOUTME: Configuration module for the gatekit gateway
// ABOUTME: Resolution tables, regional selection, service settings, and layered loading

//! Configuration for the gatekit gateway.
//!
//! Two kinds of configuration meet here: the *resolution* configuration
//! (what method maps to what downstream target, regionally layered) and the
//! *service* configuration (where to bind, how many workers, where the
//! platform files live).

pub mod loader;
pub mod regions;
pub mod resolution;
pub mod settings;

pub use regions::{Region, RegionalSelection};
pub use resolution::{MergeStats, RawResolution, Resolution, ResolutionFile, ResolutionTable};
pub use settings::GatewayConfig;
