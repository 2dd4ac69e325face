//! Background jobs
//!
//! Both loops are ordinary engine callers. The periodic retrain goes through
//! `HazardEngine::retrain`, so a hazard already retraining (e.g. from
//! `POST /retrain`) is skipped for this round instead of trained twice.

use std::sync::Arc;
use std::time::Duration;

use hazard_core::{EngineError, HazardEngine};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::Config;

/// Start the configured loops
pub fn spawn(engine: Arc<HazardEngine>, config: &Config) -> Vec<JoinHandle<()>> {
    let mut jobs = vec![tokio::spawn(monitor_loop(engine.clone(), config.monitor_interval))];

    match config.retrain_interval {
        Some(period) => jobs.push(tokio::spawn(retrain_loop(engine, period))),
        None => tracing::info!("Scheduled retraining disabled"),
    }
    jobs
}

async fn retrain_loop(engine: Arc<HazardEngine>, period: Duration) {
    tracing::info!("Scheduled retraining every {:?}", period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately; models are fresh from start-up
    ticker.tick().await;

    loop {
        ticker.tick().await;
        run_retrain(engine.clone()).await;
    }
}

/// One scheduled round over every hazard
pub async fn run_retrain(engine: Arc<HazardEngine>) {
    tracing::info!("Scheduled retrain starting");

    let outcomes = match tokio::task::spawn_blocking(move || engine.retrain_all()).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            tracing::error!("Scheduled retrain task failed: {}", e);
            return;
        }
    };

    for (hazard, result) in outcomes {
        match result {
            Ok(accuracy) => tracing::info!("[{}] Scheduled retrain done, accuracy {:.4}", hazard, accuracy),
            Err(EngineError::RetrainInProgress(_)) => {
                tracing::info!("[{}] Retrain already running, skipped", hazard)
            }
            Err(e) => tracing::error!("[{}] Scheduled retrain failed: {}", hazard, e),
        }
    }
}

async fn monitor_loop(engine: Arc<HazardEngine>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let status = engine.status();
        tracing::info!(
            "Monitoring: {}/{} models loaded, {} retraining",
            status.models_loaded,
            status.hazards.len(),
            status.busy.len()
        );
    }
}
