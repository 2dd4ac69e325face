use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use hazard_core::{
    DataError, HazardEngine, HazardType, LabeledSet, MemoryArtifactStore, SyntheticFeatureProvider,
    SyntheticTrainingData, TrainingConfig, TrainingDataProvider, FEATURE_LAYOUT,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::Config;
use crate::{create_router, AppState};

fn test_config() -> Config {
    Config {
        port: 0,
        model_dir: std::env::temp_dir(),
        retrain_interval: None,
        monitor_interval: Duration::from_secs(60),
        environment: "test".to_string(),
    }
}

fn router(engine: Arc<HazardEngine>) -> Router {
    create_router(AppState {
        engine,
        features: Arc::new(SyntheticFeatureProvider::new(11)),
        config: test_config(),
    })
}

/// Router over an in-memory engine with flood and cyclone trained
fn app() -> (Router, Arc<HazardEngine>) {
    let engine = Arc::new(HazardEngine::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(SyntheticTrainingData::new()),
        TrainingConfig::small(400),
    ));
    engine.train(HazardType::Flood).unwrap();
    engine.train(HazardType::Cyclone).unwrap();

    (router(engine.clone()), engine)
}

/// Synthetic data that holds every training run until the gate opens
struct GatedData {
    inner: SyntheticTrainingData,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl TrainingDataProvider for GatedData {
    fn labeled_set(&self, hazard: HazardType, samples: usize, seed: u64) -> Result<LabeledSet, DataError> {
        let (open, cvar) = &*self.gate;
        let guard = open.lock().unwrap();
        let _open = cvar
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap();
        self.inner.labeled_set(hazard, samples, seed)
    }
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_loaded_models() {
    let (app, _) = app();

    let (status, body) = send(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models_loaded"], 2);
    assert_eq!(body["hazards"]["flood"], "trained");
    assert_eq!(body["hazards"]["wildfire"], "empty");
}

#[tokio::test]
async fn test_predict_with_provider_features() {
    let (app, _) = app();

    let (status, body) = send(
        app,
        "POST",
        "/predict",
        Some(json!({"latitude": 19.07, "longitude": 72.87, "disaster_types": ["flood", "cyclone"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let p = body["predictions"]["flood"]["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert!(body["predictions"]["cyclone"]["model_predictions"]["neural_network"].is_number());
    assert!(body["overall_risk"].is_string());
    assert!(body["weather_conditions"]["temperature"].is_number());
}

#[tokio::test]
async fn test_predict_untrained_hazard_is_unavailable() {
    let (app, _) = app();

    let (status, body) = send(
        app,
        "POST",
        "/predict",
        Some(json!({"latitude": 0.0, "longitude": 0.0, "disaster_types": ["earthquake"]})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn test_predict_unknown_hazard() {
    let (app, _) = app();

    let (status, body) = send(
        app,
        "POST",
        "/predict",
        Some(json!({"latitude": 0.0, "longitude": 0.0, "disaster_types": ["volcano"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("volcano"));
}

#[tokio::test]
async fn test_predict_rejects_incomplete_features() {
    let (app, _) = app();
    let mut features: serde_json::Map<String, Value> =
        FEATURE_LAYOUT.iter().map(|name| (name.to_string(), json!(1.0))).collect();
    features.remove("river_level");

    let (status, body) = send(
        app,
        "POST",
        "/predict",
        Some(json!({"latitude": 0.0, "longitude": 0.0, "disaster_types": ["flood"], "features": features})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("river_level"));
}

#[tokio::test]
async fn test_predict_rejects_bad_latitude() {
    let (app, _) = app();

    let (status, _) = send(app, "POST", "/predict", Some(json!({"latitude": 95.0, "longitude": 0.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_isolates_bad_locations() {
    let (app, _) = app();

    let (status, body) = send(
        app,
        "POST",
        "/predict/batch",
        Some(json!({
            "locations": [
                {"latitude": 10.0, "longitude": 20.0},
                {"latitude": -120.0, "longitude": 20.0},
                {"latitude": 30.0, "longitude": 40.0}
            ],
            "disaster_types": ["flood"]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["failed"], 1);
    let results = body["results"].as_array().unwrap();
    assert!(results[0]["predictions"]["flood"].is_object());
    assert!(results[1]["error"].is_string());
    assert_eq!(results[1]["location"]["latitude"], -120.0);
    assert_eq!(results[2]["location"]["latitude"], 30.0);
    assert!(results[2]["overall_risk"].is_string());
}

#[tokio::test]
async fn test_accuracy_lists_trained_hazards() {
    let (app, _) = app();

    let (status, body) = send(app, "GET", "/model/accuracy", None).await;

    assert_eq!(status, StatusCode::OK);
    let accuracies = body["accuracies"].as_object().unwrap();
    assert_eq!(accuracies.len(), 2);
    assert!(accuracies["flood"]["learners"]["random_forest"].is_number());
    assert!(accuracies["cyclone"]["metrics"]["f1"].is_number());
}

#[tokio::test]
async fn test_retrain_single_hazard() {
    let (app, engine) = app();

    let (status, body) = send(app, "POST", "/retrain", Some(json!({"disaster_type": "wildfire"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["results"]["wildfire"]["accuracy"].is_number());
    assert!(engine.registry().is_trained(HazardType::Wildfire));
}

#[tokio::test]
async fn test_retrain_unknown_hazard() {
    let (app, _) = app();

    let (status, _) = send(app, "POST", "/retrain", Some(json!({"disaster_type": "tsunami"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retrain_rejects_malformed_body() {
    let (app, engine) = app();

    let (status, body) = send(app, "POST", "/retrain", Some(json!({"disaster_type": 5}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid retrain request"));
    assert!(!engine.registry().is_trained(HazardType::Wildfire));
}

#[tokio::test]
async fn test_retrain_without_body_retrains_all() {
    let (app, engine) = app();

    let (status, body) = send(app, "POST", "/retrain", None).await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_object().unwrap();
    assert_eq!(results.len(), HazardType::ALL.len());
    assert!(results.values().all(|r| r["accuracy"].is_number()));
    assert_eq!(engine.registry().trained_count(), HazardType::ALL.len());
}

#[tokio::test]
async fn test_retrain_while_busy_is_conflict() {
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let engine = Arc::new(HazardEngine::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(GatedData { inner: SyntheticTrainingData::new(), gate: gate.clone() }),
        TrainingConfig::small(400),
    ));

    let running = engine.clone();
    let first = std::thread::spawn(move || running.retrain(HazardType::Flood));
    let started = Instant::now();
    while !engine.is_busy(HazardType::Flood) {
        assert!(started.elapsed() < Duration::from_secs(10), "first retrain never started");
        std::thread::sleep(Duration::from_millis(5));
    }

    let (status, body) = send(router(engine.clone()), "POST", "/retrain", Some(json!({"disaster_type": "flood"}))).await;

    let (open, cvar) = &*gate;
    *open.lock().unwrap() = true;
    cvar.notify_all();

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
    assert!(first.join().unwrap().is_ok());
}
