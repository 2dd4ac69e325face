//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema shared by every hazard.**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Persisted model bundles record the version and hash; a bundle trained
//! against another layout is refused at load time.

use std::collections::HashMap;

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Weather (0-10) ===
    "temperature",
    "humidity",
    "pressure",
    "wind_speed",
    "wind_direction",
    "rainfall_1h",
    "rainfall_24h",
    "rainfall_7d",
    "rainfall_30d",
    "temperature_change_24h",
    "pressure_change_24h",

    // === Geography (11-18) ===
    "elevation",
    "slope",
    "aspect",
    "distance_to_water",
    "distance_to_coast",
    "soil_type",
    "soil_moisture",
    "vegetation_index",

    // === Seismic (19-23) ===
    "seismic_activity_7d",
    "seismic_activity_30d",
    "fault_distance",
    "tectonic_stress",
    "historical_earthquake_count",

    // === Hydrology (24-28) ===
    "river_level",
    "river_flow_rate",
    "groundwater_level",
    "dam_capacity",
    "upstream_rainfall",

    // === Atmosphere (29-33) ===
    "sea_surface_temp",
    "atmospheric_pressure_gradient",
    "wind_shear",
    "moisture_content",
    "coriolis_effect",

    // === Temporal (34-37) ===
    "month",
    "season",
    "day_of_year",
    "is_monsoon_season",

    // === History (38-41) ===
    "historical_disaster_count_1y",
    "historical_disaster_count_5y",
    "days_since_last_disaster",
    "avg_disaster_severity",
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 42;

static LAYOUT_HASH: Lazy<u32> = Lazy::new(compute_layout_hash);

static FEATURE_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    FEATURE_LAYOUT
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i))
        .collect()
});

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the version byte and every name (NUL separated), in order
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when a stored layout doesn't match the running binary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("feature layout mismatch: expected v{expected_version} ({expected_hash:08x}), got v{actual_version} ({actual_hash:08x})")]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if version != FEATURE_VERSION || hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: version,
            actual_hash: hash,
        });
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_INDEX.get(name).copied()
}

pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count_matches_layout() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_names_are_unique() {
        assert_eq!(FEATURE_INDEX.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_layout_hash_is_stable() {
        assert_eq!(compute_layout_hash(), layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());

        let err = validate_layout(FEATURE_VERSION + 1, layout_hash()).unwrap_err();
        assert_eq!(err.actual_version, FEATURE_VERSION + 1);

        let err = validate_layout(FEATURE_VERSION, !layout_hash()).unwrap_err();
        assert_eq!(err.expected_hash, layout_hash());
    }

    #[test]
    fn test_feature_lookup() {
        assert_eq!(feature_index("temperature"), Some(0));
        assert_eq!(feature_index("elevation"), Some(11));
        assert_eq!(feature_index("seismic_activity_7d"), Some(19));
        assert_eq!(feature_index("avg_disaster_severity"), Some(41));
        assert_eq!(feature_index("cpu_percent"), None);

        assert_eq!(feature_name(24), Some("river_level"));
        assert_eq!(feature_name(FEATURE_COUNT), None);
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::current();
        assert_eq!(info.feature_count, FEATURE_COUNT);
        assert_eq!(info.feature_names[34], "month");
    }
}
