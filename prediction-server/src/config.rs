//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Root of the per-hazard model bundles
    pub model_dir: PathBuf,

    /// Period of the scheduled full retrain, `None` when disabled
    pub retrain_interval: Option<Duration>,

    /// Period of the monitoring tick
    pub monitor_interval: Duration,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            model_dir: hazard_core::constants::get_model_dir(),

            retrain_interval: match seconds("RETRAIN_INTERVAL_SECS", 86_400) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },

            monitor_interval: Duration::from_secs(seconds("MONITOR_INTERVAL_SECS", 1_800).max(1)),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn seconds(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
