//! Hazard Risk Prediction Server
//!
//! JSON-over-HTTP binding of the ensemble scoring engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  HAZARD PREDICTION SERVER                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌─────────────────┐  ┌───────────────────┐ │
//! │  │  API      │  │  Feature        │  │  Scheduler        │ │
//! │  │  (Axum)   │  │  Provider       │  │  (retrain/monitor)│ │
//! │  └─────┬─────┘  └────────┬────────┘  └─────────┬─────────┘ │
//! │        └─────────────────┼─────────────────────┘           │
//! │                          ▼                                  │
//! │                  ┌───────────────┐                         │
//! │                  │ HazardEngine  │ ──► model bundles        │
//! │                  └───────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod models;
mod handlers;
mod scheduler;
mod error;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    routing::{get, post},
};
use hazard_core::{
    FileArtifactStore, HazardEngine, SyntheticFeatureProvider, SyntheticTrainingData, TrainingConfig,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "hazard_server=debug,hazard_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();

    tracing::info!("Hazard Prediction Server starting ({})...", config.environment);
    tracing::info!("Model directory: {}", config.model_dir.display());

    let engine = Arc::new(HazardEngine::new(
        Arc::new(FileArtifactStore::new(config.model_dir.clone())),
        Arc::new(SyntheticTrainingData::new()),
        TrainingConfig::from_env(),
    ));

    // Load stored models, train whatever is missing
    let startup = engine.clone();
    let report = tokio::task::spawn_blocking(move || startup.ensure_models()).await?;
    for (hazard, reason) in &report.failed {
        tracing::warn!("[{}] Not available: {}", hazard, reason);
    }
    tracing::info!(
        "Models ready: {} loaded, {} trained, {} unavailable",
        report.loaded.len(),
        report.trained.len(),
        report.failed.len()
    );

    // Build application state
    let state = AppState {
        engine: engine.clone(),
        features: Arc::new(SyntheticFeatureProvider::from_entropy()),
        config: config.clone(),
    };

    scheduler::spawn(engine, &config);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HazardEngine>,
    pub features: Arc<SyntheticFeatureProvider>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let cors = if state.config.is_production() {
        CorsLayer::new().allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/predict/batch", post(handlers::predict::predict_batch))
        .route("/model/accuracy", get(handlers::model::accuracy))
        .route("/retrain", post(handlers::model::retrain))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
