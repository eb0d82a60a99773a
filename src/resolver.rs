// ABOUTME: Method resolver mapping application-facing methods to downstream routing metadata
// ABOUTME: Publishes immutable table snapshots so lookups never contend with reconfiguration

//! Method resolution.
//!
//! The [`Resolver`] owns the merged resolution table and answers the
//! dispatcher's questions about a method: its downstream alias, whether it
//! is an event hook, whether it needs a permission group, whether context
//! is injected, and which bridge mode carries it.
//!
//! Reconfiguration is rare and lookups are hot, so the table is published
//! as an immutable `Arc` snapshot: [`Resolver::configure`] builds a fresh
//! table off to the side and swaps the pointer, readers clone the `Arc`
//! and never observe a half-merged table.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::config::loader;
use crate::config::resolution::{Resolution, ResolutionTable};
use crate::config::settings::GatewayConfig;
use crate::error::Result;

/// Configurable method-to-alias resolver
#[derive(Debug, Default)]
pub struct Resolver {
    table: RwLock<Arc<ResolutionTable>>,
}

impl Resolver {
    /// Create an unconfigured resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and publish a fresh table from the given file paths.
    ///
    /// Later paths override earlier ones per method key. The previous table
    /// stays live until the new one is complete; a failed load leaves the
    /// current table untouched.
    pub fn configure(&self, config_paths: &[String]) -> Result<()> {
        let table = loader::load_resolution_table(config_paths)?;
        tracing::info!(
            "Configuration complete, {} resolutions published (later paths take precedence)",
            table.len()
        );
        self.publish(table);
        Ok(())
    }

    /// Configure from the gateway settings: regional selection expands to
    /// the layer list, which is then loaded as in [`Resolver::configure`].
    pub fn configure_from(&self, config: &GatewayConfig) -> Result<()> {
        let paths = loader::select_resolution_paths(config);
        self.configure(&paths)
    }

    /// Drop every resolution; the resolver reports unconfigured afterwards.
    pub fn clear(&self) {
        self.publish(ResolutionTable::new());
        tracing::info!("Cleared all resolutions");
    }

    /// True once at least one resolution is loaded
    pub fn is_configured(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Current table snapshot
    pub fn snapshot(&self) -> Arc<ResolutionTable> {
        self.table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, table: ResolutionTable) {
        let mut guard = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(table);
    }

    /// Full row for a method, case-insensitive
    pub fn resolution(&self, method: &str) -> Option<Resolution> {
        self.snapshot().get(method).cloned()
    }

    /// Downstream alias for a method; `None` means unknown method
    pub fn resolve_alias(&self, method: &str) -> Option<String> {
        self.snapshot().get(method).map(|row| row.alias.clone())
    }

    /// True when the method is an event subscription hook
    pub fn has_event(&self, method: &str) -> bool {
        self.snapshot()
            .get(method)
            .map(|row| !row.event.is_empty())
            .unwrap_or(false)
    }

    /// Context-inclusion flag plus the static extras, when configured
    pub fn include_context(&self, method: &str) -> (bool, Option<Value>) {
        match self.snapshot().get(method) {
            Some(row) => (row.include_context, row.additional_context.clone()),
            None => (false, None),
        }
    }

    /// True when the method dispatches through the typed capability path
    pub fn has_com_rpc_request_support(&self, method: &str) -> bool {
        self.snapshot()
            .get(method)
            .map(|row| row.use_com_rpc)
            .unwrap_or(false)
    }

    /// Permission group required by the method, when any
    pub fn permission_group(&self, method: &str) -> Option<String> {
        self.snapshot()
            .get(method)
            .map(|row| row.permission_group.clone())
            .filter(|group| !group.is_empty())
    }
}
