// ABOUTME: Resolution table row types and the JSON file format they are parsed from
// ABOUTME: Handles field defaulting rules and case-insensitive method keying

//! Resolution table types.
//!
//! A resolution file is `{"resolutions": {"<method>": {..}, ..}}`. Each row
//! binds an application-facing method to a downstream alias plus routing
//! metadata. Method keys are case-insensitive and stored lower-cased; a
//! later-loaded file replaces earlier rows wholesale, per method key.
//!
//! `includeContext` and `useComRpc` default to "an `additionalContext`
//! object is present" when omitted, which keeps the common typed-capability
//! rows terse.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row as written in a resolution file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawResolution {
    /// Downstream target, `<callsign>[.<method>]`
    #[serde(default)]
    pub alias: String,
    /// Upstream event name; non-empty marks the method as an event hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Permission group required of the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_group: Option<String>,
    /// Static extras injected when context inclusion is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<Value>,
    /// Inject caller context into outbound params
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_context: Option<bool>,
    /// Dispatch through the typed capability path instead of generic JSON-RPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_com_rpc: Option<bool>,
}

/// A resolution file: method name to raw row.
///
/// The `resolutions` object is mandatory; a file without it fails to parse
/// and is skipped by the loader.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolutionFile {
    /// Method rows keyed by the name applications send
    pub resolutions: HashMap<String, RawResolution>,
}

/// One fully-defaulted row of the merged resolver table
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Downstream target, `<callsign>[.<method>]`
    pub alias: String,
    /// Upstream event name, empty for non-event methods
    pub event: String,
    /// Permission group, empty when unrestricted
    pub permission_group: String,
    /// Static extras for context injection
    pub additional_context: Option<Value>,
    /// Inject caller context into outbound params
    pub include_context: bool,
    /// Dispatch through the typed capability path
    pub use_com_rpc: bool,
}

impl From<RawResolution> for Resolution {
    fn from(raw: RawResolution) -> Self {
        // Flag defaults key off a *structured* additionalContext; a stray
        // scalar does not silently flip the dispatch mode.
        let has_additional_context = raw
            .additional_context
            .as_ref()
            .map(Value::is_object)
            .unwrap_or(false);
        Self {
            alias: raw.alias,
            event: raw.event.unwrap_or_default(),
            permission_group: raw.permission_group.unwrap_or_default(),
            additional_context: raw.additional_context,
            include_context: raw.include_context.unwrap_or(has_additional_context),
            use_com_rpc: raw.use_com_rpc.unwrap_or(has_additional_context),
        }
    }
}

/// Merged resolver table with lower-cased method keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionTable {
    rows: HashMap<String, Resolution>,
}

/// Per-file merge statistics, logged by the loader
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MergeStats {
    /// Rows taken from the file
    pub loaded: usize,
    /// Rows that replaced an existing entry
    pub overridden: usize,
}

impl ResolutionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed file into the table; later files win per method key.
    pub fn merge_file(&mut self, file: ResolutionFile) -> MergeStats {
        let mut stats = MergeStats::default();
        for (method, raw) in file.resolutions {
            let key = method.to_lowercase();
            if self.rows.insert(key, raw.into()).is_some() {
                stats.overridden += 1;
            }
            stats.loaded += 1;
        }
        stats
    }

    /// Case-insensitive row lookup
    pub fn get(&self, method: &str) -> Option<&Resolution> {
        self.rows.get(&method.to_lowercase())
    }

    /// Number of rows in the table
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows are loaded
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
