// ABOUTME: Layered resolution config loading with regional selection and platform country lookup
// ABOUTME: Later files override earlier ones; the load succeeds if any file parses

//! Resolution config loading.
//!
//! Startup resolves the effective layer list in three steps:
//!
//! 1. the effective country comes from the vendor config, else the build
//!    config, else the selection file's `defaultCountryCode`;
//! 2. the regional selection file expands the country to an ordered list of
//!    resolution paths; a missing or unparseable selection file falls back
//!    to the single base resolution path;
//! 3. each path is parsed and merged in order, later paths overriding
//!    earlier ones per method key. Individual file failures are logged and
//!    skipped; the load fails only when no file contributed rows.

use std::fs;

use serde_json::Value;

use crate::config::regions::RegionalSelection;
use crate::config::resolution::{ResolutionFile, ResolutionTable};
use crate::config::settings::GatewayConfig;
use crate::constants::paths;
use crate::error::{GatekitError, Result};

/// Read a top-level string key from a JSON file; `None` if any step fails.
fn read_json_string_key(file_path: &str, key: &str, tag: &str) -> Option<String> {
    if file_path.is_empty() {
        return None;
    }
    let content = match fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(_) => {
            tracing::info!("{} file not found: {}", tag, file_path);
            return None;
        }
    };
    let json: Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to parse {} JSON {}: {}", tag, file_path, e);
            return None;
        }
    };
    match json.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => {
            tracing::info!("{} '{}' read: {}", tag, key, value);
            Some(value.to_string())
        }
        _ => {
            tracing::warn!("No '{}' field found in {}: {}", key, tag, file_path);
            None
        }
    }
}

/// Effective country code from the platform config files.
///
/// The vendor config wins over the build config; `None` defers to the
/// selection file's `defaultCountryCode`.
pub fn read_country(config: &GatewayConfig) -> Option<String> {
    read_json_string_key(&config.vendor_config_path, paths::COUNTRY_KEY, "Vendor config")
        .or_else(|| {
            read_json_string_key(&config.build_config_path, paths::COUNTRY_KEY, "Build config")
        })
}

/// Expand the regional selection into the ordered resolution layer list.
pub fn select_resolution_paths(config: &GatewayConfig) -> Vec<String> {
    let fallback = vec![config.default_resolution_path.clone()];

    let content = match fs::read_to_string(&config.regional_selection_path) {
        Ok(content) => content,
        Err(_) => {
            tracing::warn!(
                "Failed to open resolutions config file: {}, falling back to default config",
                config.regional_selection_path
            );
            return fallback;
        }
    };

    let selection: RegionalSelection = match serde_json::from_str(&content) {
        Ok(selection) => selection,
        Err(e) => {
            tracing::error!(
                "Failed to parse regional resolutions config file {}: {}",
                config.regional_selection_path,
                e
            );
            return fallback;
        }
    };

    let country = match read_country(config) {
        Some(country) => country,
        None => {
            let default_country = selection.default_country_code.clone().unwrap_or_default();
            if default_country.is_empty() {
                tracing::warn!("No country found in platform config and no default in selection");
            } else {
                tracing::info!("Using default country code from config: {}", default_country);
            }
            default_country
        }
    };

    let selected = selection.paths_for_country(&country);
    if selected.is_empty() {
        tracing::warn!(
            "No configuration paths found for country '{}', using fallback: {}",
            country,
            config.default_resolution_path
        );
        return fallback;
    }

    tracing::info!(
        "Loading {} configuration paths for country '{}'",
        selected.len(),
        country
    );
    selected
}

/// Parse one resolution file into its raw form.
fn load_resolution_file(path: &str) -> Result<ResolutionFile> {
    let content = fs::read_to_string(path)
        .map_err(|e| GatekitError::config(format!("failed to open config file {}: {}", path, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| GatekitError::config(format!("failed to parse {}: {}", path, e)))
}

/// Merge the given files, in order, into one resolution table.
///
/// Fails only when no file loads; partial layer failures keep the load
/// alive so a bad regional overlay cannot take down the base table.
pub fn load_resolution_table(config_paths: &[String]) -> Result<ResolutionTable> {
    let mut table = ResolutionTable::new();
    let mut any_loaded = false;

    for (index, path) in config_paths.iter().enumerate() {
        tracing::info!(
            "Processing config path {}/{}: {}",
            index + 1,
            config_paths.len(),
            path
        );
        match load_resolution_file(path) {
            Ok(file) => {
                let stats = table.merge_file(file);
                tracing::info!(
                    "Loaded {} resolutions from {} ({} new, {} overridden). Total resolutions: {}",
                    stats.loaded,
                    path,
                    stats.loaded - stats.overridden,
                    stats.overridden,
                    table.len()
                );
                any_loaded = true;
            }
            Err(e) => {
                tracing::error!("Failed to load configuration from {}: {}", path, e);
            }
        }
    }

    if !any_loaded {
        return Err(GatekitError::config(
            "failed to load configuration from any provided path",
        ));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_last_writer_wins_across_files() {
        let dir = TempDir::new().unwrap();
        let first = write_file(
            &dir,
            "a.json",
            r#"{"resolutions":{"device.name":{"alias":"Base.getName","permissionGroup":"g"}}}"#,
        );
        let second = write_file(
            &dir,
            "b.json",
            r#"{"resolutions":{"Device.Name":{"alias":"Region.getName"}}}"#,
        );

        let table = load_resolution_table(&[first, second]).unwrap();
        let row = table.get("device.name").unwrap();
        assert_eq!(row.alias, "Region.getName");
        assert_eq!(row.permission_group, "");
    }

    #[test]
    fn test_bad_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "good.json", r#"{"resolutions":{"a.b":{"alias":"X.y"}}}"#);
        let bad = write_file(&dir, "bad.json", "{not json");

        let table = load_resolution_table(&[bad, good]).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_all_files_failing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let bad = write_file(&dir, "bad.json", "{not json");
        let missing = dir.path().join("missing.json").to_string_lossy().to_string();
        assert!(load_resolution_table(&[bad, missing]).is_err());
    }

    #[test]
    fn test_file_without_resolutions_object_fails_that_file() {
        let dir = TempDir::new().unwrap();
        let empty = write_file(&dir, "empty.json", "{}");
        assert!(load_resolution_table(&[empty]).is_err());
    }

    #[test]
    fn test_reload_same_files_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.json",
            r#"{"resolutions":{"a.b":{"alias":"X.y","event":"onY"}}}"#,
        );
        let paths = vec![path];
        let first = load_resolution_table(&paths).unwrap();
        let second = load_resolution_table(&paths).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_selection_file_falls_back_to_base_path() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig {
            regional_selection_path: dir
                .path()
                .join("missing.json")
                .to_string_lossy()
                .to_string(),
            default_resolution_path: "/base.json".to_string(),
            vendor_config_path: String::new(),
            build_config_path: String::new(),
            ..GatewayConfig::default()
        };
        assert_eq!(select_resolution_paths(&config), vec!["/base.json"]);
    }

    #[test]
    fn test_vendor_country_selects_region() {
        let dir = TempDir::new().unwrap();
        let vendor = write_file(&dir, "vendor.json", r#"{"country":"gb"}"#);
        let selection = write_file(
            &dir,
            "resolutions.json",
            r#"{"defaultCountryCode":"US",
                "regions":[{"countryCodes":["US"],"paths":["/us.json"]},
                           {"countryCodes":["GB"],"paths":["/gb.json","/gb-extra.json"]}]}"#,
        );
        let config = GatewayConfig {
            regional_selection_path: selection,
            vendor_config_path: vendor,
            build_config_path: String::new(),
            ..GatewayConfig::default()
        };
        assert_eq!(
            select_resolution_paths(&config),
            vec!["/gb.json", "/gb-extra.json"]
        );
    }

    #[test]
    fn test_default_country_used_when_platform_config_absent() {
        let dir = TempDir::new().unwrap();
        let selection = write_file(
            &dir,
            "resolutions.json",
            r#"{"defaultCountryCode":"US",
                "regions":[{"countryCodes":["US"],"paths":["/us.json"]}]}"#,
        );
        let config = GatewayConfig {
            regional_selection_path: selection,
            vendor_config_path: String::new(),
            build_config_path: String::new(),
            ..GatewayConfig::default()
        };
        assert_eq!(select_resolution_paths(&config), vec!["/us.json"]);
    }
}
