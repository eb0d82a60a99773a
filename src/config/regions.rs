// ABOUTME: Regional selection config mapping country codes to resolution file layers
// ABOUTME: Case-insensitive country matching with a default-country fallback

//! Regional resolution selection.
//!
//! Devices ship one regional selection file listing, per region, the
//! ordered resolution layers to load. The effective country code picks the
//! region; when it matches nothing the `defaultCountryCode` region is
//! tried once before the caller falls back to the base resolution path.

use serde::{Deserialize, Serialize};

/// One region: a set of country codes sharing resolution layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// ISO-2 country codes selecting this region, matched case-insensitively
    #[serde(default)]
    pub country_codes: Vec<String>,
    /// Ordered resolution file paths; later paths override earlier ones
    #[serde(default)]
    pub paths: Vec<String>,
}

impl Region {
    /// Case-insensitive membership test
    pub fn has_country_code(&self, country: &str) -> bool {
        self.country_codes
            .iter()
            .any(|code| code.eq_ignore_ascii_case(country))
    }
}

/// The regional selection file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionalSelection {
    /// Country tried when the effective country matches no region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_country_code: Option<String>,
    /// Regions in file order; the first match wins
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl RegionalSelection {
    /// Resolution layers for a country.
    ///
    /// Returns the first matching region's paths. When `country` matches
    /// nothing, the default country is tried once (unless it equals the
    /// country that already failed). An empty vector means no region
    /// applies and the caller should fall back to the base path.
    pub fn paths_for_country(&self, country: &str) -> Vec<String> {
        for region in &self.regions {
            if region.has_country_code(country) {
                tracing::info!(
                    "Found {} paths for country '{}'",
                    region.paths.len(),
                    country
                );
                return region.paths.clone();
            }
        }

        if let Some(default_code) = self.default_country_code.as_deref() {
            if !country.is_empty()
                && !default_code.is_empty()
                && !country.eq_ignore_ascii_case(default_code)
            {
                tracing::warn!(
                    "Country '{}' not found, trying default country '{}'",
                    country,
                    default_code
                );
                return self.paths_for_country(default_code);
            }
        }

        Vec::new()
    }
}
