//! Hazard Types
//!
//! Closed set. No dynamic registration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardType {
    Flood,
    Cyclone,
    Earthquake,
    Landslide,
    Wildfire,
}

impl HazardType {
    pub const ALL: [HazardType; 5] = [
        HazardType::Flood,
        HazardType::Cyclone,
        HazardType::Earthquake,
        HazardType::Landslide,
        HazardType::Wildfire,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardType::Flood => "flood",
            HazardType::Cyclone => "cyclone",
            HazardType::Earthquake => "earthquake",
            HazardType::Landslide => "landslide",
            HazardType::Wildfire => "wildfire",
        }
    }

    /// Position in `ALL`, used to index fixed per-hazard tables
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HazardType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HazardType::ALL
            .iter()
            .copied()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| EngineError::UnknownHazard(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for hazard in HazardType::ALL {
            assert_eq!(hazard.as_str().parse::<HazardType>().unwrap(), hazard);
        }
    }

    #[test]
    fn test_unknown_hazard() {
        match "tsunami".parse::<HazardType>() {
            Err(EngineError::UnknownHazard(name)) => assert_eq!(name, "tsunami"),
            other => panic!("expected UnknownHazard, got {:?}", other),
        }
        assert!("Flood".parse::<HazardType>().is_err());
    }

    #[test]
    fn test_index_matches_all() {
        for (i, hazard) in HazardType::ALL.iter().enumerate() {
            assert_eq!(hazard.index(), i);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&HazardType::Wildfire).unwrap(), "\"wildfire\"");
    }
}
