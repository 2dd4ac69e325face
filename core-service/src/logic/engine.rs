//! Hazard Engine - Scoring façade
//!
//! The single entry point for servers, the CLI and the scheduler.
//! Scoring reads registry snapshots and never mutates shared state;
//! lifecycle operations go through `ModelLifecycle` and its per-hazard guard.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::constants::get_model_dir;
use crate::error::EngineResult;
use crate::logic::features::{validate, FeatureVector, LayoutInfo, RawFeatures};
use crate::logic::hazard::HazardType;
use crate::logic::lifecycle::storage::{ArtifactStore, FileArtifactStore};
use crate::logic::lifecycle::{LoadReport, ModelLifecycle, TrainingConfig, TrainingDataProvider};
use crate::logic::model::LearnerSuite;
use crate::logic::registry::{HazardAccuracy, HazardModelRecord, ModelRegistry};
use crate::logic::scoring::{score, Assessment, BatchItem, BatchOutcome, PredictionResult};
use crate::logic::synthetic::SyntheticTrainingData;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardState {
    Empty,
    Trained,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub models_loaded: usize,
    pub hazards: BTreeMap<HazardType, HazardState>,
    /// Hazards with a train, retrain or load in flight
    pub busy: Vec<HazardType>,
    pub layout: LayoutInfo,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct HazardEngine {
    registry: Arc<ModelRegistry>,
    lifecycle: ModelLifecycle,
}

impl HazardEngine {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        data: Arc<dyn TrainingDataProvider>,
        config: TrainingConfig,
    ) -> Self {
        let suite = LearnerSuite::from_params(&config.learners);
        Self::with_suite(store, data, config, suite)
    }

    /// Custom trainers per slot
    pub fn with_suite(
        store: Arc<dyn ArtifactStore>,
        data: Arc<dyn TrainingDataProvider>,
        config: TrainingConfig,
        suite: LearnerSuite,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::new());
        let lifecycle = ModelLifecycle::new(registry.clone(), store, data, suite, config);
        Self { registry, lifecycle }
    }

    /// File store under `HAZARD_MODEL_DIR`, synthetic training data, env config
    pub fn from_env() -> Self {
        let model_dir = get_model_dir();
        log::info!("Model directory: {}", model_dir.display());
        Self::new(
            Arc::new(FileArtifactStore::new(model_dir)),
            Arc::new(SyntheticTrainingData::new()),
            TrainingConfig::from_env(),
        )
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TrainingConfig {
        self.lifecycle.config()
    }

    /// Publish a record built outside the lifecycle (embedding, tests)
    pub fn install(&self, record: HazardModelRecord) {
        let hazard = record.hazard();
        self.registry.publish(record);
        log::info!("[{}] Record installed", hazard);
    }

    // ------------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------------

    pub fn predict(&self, features: &RawFeatures, hazard: HazardType) -> EngineResult<PredictionResult> {
        // lookup first: an untrained hazard reports ModelNotTrained even for bad features
        let record = self.registry.get(hazard)?;
        let vector = validate(features)?;
        score(&vector, &record)
    }

    pub fn predict_by_name(&self, features: &RawFeatures, hazard: &str) -> EngineResult<PredictionResult> {
        self.predict(features, hazard.parse()?)
    }

    pub fn predict_vector(&self, vector: &FeatureVector, hazard: HazardType) -> EngineResult<PredictionResult> {
        let record = self.registry.get(hazard)?;
        score(vector, &record)
    }

    /// Score one location against several hazards. Fails as a whole if any hazard fails.
    pub fn assess(&self, features: &RawFeatures, hazards: &[HazardType]) -> EngineResult<Assessment> {
        let vector = validate(features)?;

        let mut predictions = BTreeMap::new();
        for &hazard in hazards {
            predictions.insert(hazard, self.predict_vector(&vector, hazard)?);
        }
        Ok(Assessment::new(predictions))
    }

    /// Per-item isolation: a bad item yields an error entry, the rest are scored
    pub fn predict_batch(&self, items: &[BatchItem], hazards: &[HazardType]) -> Vec<BatchOutcome> {
        items
            .iter()
            .map(|item| {
                let result = self.assess(&item.features, hazards);
                if let Err(e) = &result {
                    log::debug!(
                        "Batch item ({}, {}) failed: {}",
                        item.location.latitude,
                        item.location.longitude,
                        e
                    );
                }
                BatchOutcome { location: item.location, result }
            })
            .collect()
    }

    /// Per-learner and ensemble accuracy for every trained hazard
    pub fn get_accuracies(&self) -> BTreeMap<HazardType, HazardAccuracy> {
        HazardType::ALL
            .iter()
            .filter_map(|&h| self.registry.snapshot(h).map(|r| (h, r.accuracy_report())))
            .collect()
    }

    pub fn status(&self) -> EngineStatus {
        let hazards = HazardType::ALL
            .iter()
            .map(|&h| {
                let state = if self.registry.is_trained(h) { HazardState::Trained } else { HazardState::Empty };
                (h, state)
            })
            .collect();

        EngineStatus {
            models_loaded: self.registry.trained_count(),
            hazards,
            busy: HazardType::ALL.iter().copied().filter(|&h| self.lifecycle.is_busy(h)).collect(),
            layout: LayoutInfo::current(),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn train(&self, hazard: HazardType) -> EngineResult<f64> {
        self.lifecycle.train(hazard)
    }

    pub fn persist(&self, hazard: HazardType) -> EngineResult<()> {
        self.lifecycle.persist(hazard)
    }

    pub fn load(&self, hazard: HazardType) -> EngineResult<()> {
        self.lifecycle.load(hazard)
    }

    pub fn retrain(&self, hazard: HazardType) -> EngineResult<f64> {
        self.lifecycle.retrain(hazard)
    }

    pub fn load_all(&self) -> LoadReport {
        self.lifecycle.load_all()
    }

    pub fn train_all(&self) -> Vec<(HazardType, EngineResult<f64>)> {
        self.lifecycle.train_all()
    }

    pub fn retrain_all(&self) -> Vec<(HazardType, EngineResult<f64>)> {
        self.lifecycle.retrain_all()
    }

    pub fn ensure_models(&self) -> LoadReport {
        self.lifecycle.ensure_models()
    }

    pub fn is_busy(&self, hazard: HazardType) -> bool {
        self.lifecycle.is_busy(hazard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use serde_json::{json, Map, Value};

    use crate::error::{ContractError, EngineError};
    use crate::logic::features::FEATURE_LAYOUT;
    use crate::logic::lifecycle::storage::MemoryArtifactStore;
    use crate::logic::model::RiskLevel;
    use crate::logic::scoring::Location;
    use crate::logic::test_support::{counted_record, fixed_record};

    fn engine() -> HazardEngine {
        HazardEngine::new(
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(SyntheticTrainingData::new()),
            TrainingConfig::small(600),
        )
    }

    fn full_features() -> Map<String, Value> {
        FEATURE_LAYOUT.iter().map(|name| (name.to_string(), json!(1.0))).collect()
    }

    #[test]
    fn test_predict_untrained_hazard() {
        let engine = engine();
        let result = engine.predict(&RawFeatures::Named(full_features()), HazardType::Flood);
        assert!(matches!(result, Err(EngineError::ModelNotTrained(HazardType::Flood))));
    }

    #[test]
    fn test_untrained_lookup_precedes_validation() {
        let engine = engine();
        let mut features = full_features();
        features.remove("humidity");

        let result = engine.predict(&RawFeatures::Named(features), HazardType::Flood);
        assert!(matches!(result, Err(EngineError::ModelNotTrained(HazardType::Flood))));
    }

    #[test]
    fn test_predict_vector_uses_installed_record() {
        let engine = engine();
        engine.install(fixed_record(HazardType::Earthquake, 0.9));
        let vector = validate(&RawFeatures::Named(full_features())).unwrap();

        let result = engine.predict_vector(&vector, HazardType::Earthquake).unwrap();
        assert!((result.probability - 0.9).abs() < 1e-12);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert!(matches!(
            engine.predict_vector(&vector, HazardType::Flood),
            Err(EngineError::ModelNotTrained(HazardType::Flood))
        ));
    }

    #[test]
    fn test_predict_by_unknown_name() {
        let engine = engine();
        let result = engine.predict_by_name(&RawFeatures::Named(full_features()), "volcano");
        assert!(matches!(result, Err(EngineError::UnknownHazard(_))));
    }

    #[test]
    fn test_missing_field_invokes_no_learner() {
        let engine = engine();
        let (record, calls) = counted_record(HazardType::Flood, [0.5; 4], [0.25; 4]);
        engine.install(record);

        let mut features = full_features();
        features.remove("river_level");
        let result = engine.predict(&RawFeatures::Named(features), HazardType::Flood);

        assert!(matches!(
            result,
            Err(EngineError::Contract(ContractError::MissingField { ref field })) if field == "river_level"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        engine.predict(&RawFeatures::Named(full_features()), HazardType::Flood).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_assess_takes_max_category() {
        let engine = engine();
        engine.install(fixed_record(HazardType::Flood, 0.1));
        engine.install(fixed_record(HazardType::Wildfire, 0.9));

        let assessment = engine
            .assess(&RawFeatures::Named(full_features()), &[HazardType::Flood, HazardType::Wildfire])
            .unwrap();

        assert_eq!(assessment.predictions.len(), 2);
        assert_eq!(assessment.get(HazardType::Flood).unwrap().risk_level, RiskLevel::Low);
        assert_eq!(assessment.overall_risk, Some(RiskLevel::Critical));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let engine = engine();
        engine.install(fixed_record(HazardType::Cyclone, 0.3));

        let mut broken = full_features();
        broken.insert("humidity".to_string(), json!("wet"));

        let items = vec![
            BatchItem { location: Location { latitude: 1.0, longitude: 2.0 }, features: RawFeatures::Named(full_features()) },
            BatchItem { location: Location { latitude: 3.0, longitude: 4.0 }, features: RawFeatures::Named(broken) },
            BatchItem { location: Location { latitude: 5.0, longitude: 6.0 }, features: RawFeatures::Named(full_features()) },
        ];

        let outcomes = engine.predict_batch(&items, &[HazardType::Cyclone]);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(EngineError::Contract(_))));
        assert_eq!(outcomes[1].location.latitude, 3.0);
        assert_eq!(outcomes[2].result.as_ref().unwrap().overall_risk, Some(RiskLevel::Medium));
    }

    #[test]
    fn test_train_then_predict() {
        let engine = engine();
        let accuracy = engine.train(HazardType::Earthquake).unwrap();
        assert!((0.0..=1.0).contains(&accuracy));

        let result = engine.predict(&RawFeatures::Named(full_features()), HazardType::Earthquake).unwrap();
        assert!((0.0..=1.0).contains(&result.probability));
        assert_eq!(result.risk_level, RiskLevel::classify(result.probability).unwrap());
        assert_eq!(result.confidence, accuracy);

        let accuracies = engine.get_accuracies();
        assert_eq!(accuracies.len(), 1);
        let weights: f64 = accuracies[&HazardType::Earthquake].weights.values().sum();
        assert!((weights - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_status() {
        let engine = engine();
        engine.install(fixed_record(HazardType::Landslide, 0.5));

        let status = engine.status();

        assert_eq!(status.models_loaded, 1);
        assert_eq!(status.hazards[&HazardType::Landslide], HazardState::Trained);
        assert_eq!(status.hazards[&HazardType::Flood], HazardState::Empty);
        assert!(status.busy.is_empty());
        assert_eq!(status.layout.feature_count, FEATURE_LAYOUT.len());
    }
}
