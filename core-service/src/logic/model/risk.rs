//! Risk Classifier - probability → risk level
//!
//! Buckets are closed on the lower edge and open on the upper edge:
//! [0, 0.2) low, [0.2, 0.5) medium, [0.5, 0.8) high, [0.8, 1] critical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const MEDIUM_THRESHOLD: f64 = 0.2;
pub const HIGH_THRESHOLD: f64 = 0.5;
pub const CRITICAL_THRESHOLD: f64 = 0.8;

/// Ordered: `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Total over [0, 1]; anything else (NaN included) is `OutOfRange`
    pub fn classify(probability: f64) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(EngineError::OutOfRange(probability));
        }

        Ok(if probability < MEDIUM_THRESHOLD {
            RiskLevel::Low
        } else if probability < HIGH_THRESHOLD {
            RiskLevel::Medium
        } else if probability < CRITICAL_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
