//! Artifact Storage - Durable model bundles
//!
//! A bundle is everything `load` needs to rebuild a `HazardModelRecord`:
//! four learner artifacts, the scaler, the weights and accuracies.
//!
//! On disk (`FileArtifactStore`):
//! ```text
//! <root>/<hazard>/
//!     manifest.json          layout version/hash + sha256 of every file
//!     random_forest.json
//!     extra_trees.json
//!     gradient_boosting.json
//!     neural_network.json
//!     scaler.json
//!     ensemble.json          weights, accuracies, metrics
//! ```
//! A bundle is written into a staging directory and renamed into place.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::logic::features::layout::{layout_hash, validate_layout, LayoutMismatchError, FEATURE_COUNT, FEATURE_VERSION};
use crate::logic::hazard::HazardType;
use crate::logic::model::{BaseLearner, EnsembleWeights, LearnerArtifact, LearnerKind, StandardScaler, LEARNER_COUNT};
use crate::logic::registry::{HazardModelRecord, TrainingMetrics};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing stored for this hazard. Distinct from every other failure.
    #[error("no stored bundle for {0}")]
    NotFound(HazardType),

    #[error("corrupt bundle: {0}")]
    Corrupt(String),

    #[error("incompatible bundle: {0}")]
    Incompatible(#[from] LayoutMismatchError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    fn io(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io { path: path.to_path_buf(), source }
    }
}

// ============================================================================
// BUNDLE
// ============================================================================

/// Weights, accuracies and metrics of one trained hazard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    pub weights: EnsembleWeights,
    pub accuracies: [f64; LEARNER_COUNT],
    pub ensemble_accuracy: f64,
    pub metrics: TrainingMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub hazard: HazardType,
    pub layout_version: u8,
    pub layout_hash: u32,
    /// Slot order
    pub learners: Vec<LearnerArtifact>,
    pub scaler: StandardScaler,
    pub ensemble: EnsembleSummary,
}

impl ModelBundle {
    pub fn from_record(record: &HazardModelRecord) -> Result<Self, StoreError> {
        let learners = record
            .learners()
            .iter()
            .map(|learner| {
                learner.to_artifact().ok_or_else(|| {
                    StoreError::Serialization(format!("{} learner has no persistable form", learner.kind()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            hazard: record.hazard(),
            layout_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            learners,
            scaler: record.scaler().clone(),
            ensemble: EnsembleSummary {
                weights: *record.weights(),
                accuracies: *record.accuracies(),
                ensemble_accuracy: record.ensemble_accuracy(),
                metrics: record.metrics().clone(),
            },
        })
    }

    /// Validate and rebuild a live record
    pub fn into_record(self) -> Result<HazardModelRecord, StoreError> {
        validate_layout(self.layout_version, self.layout_hash)?;

        if self.learners.len() != LEARNER_COUNT {
            return Err(StoreError::Corrupt(format!(
                "{} learner artifacts, expected {}",
                self.learners.len(),
                LEARNER_COUNT
            )));
        }

        let mut learners: Vec<Arc<dyn BaseLearner>> = Vec::with_capacity(LEARNER_COUNT);
        for (slot, artifact) in self.learners.into_iter().enumerate() {
            let expected = LearnerKind::SLOTS[slot];
            if artifact.kind() != expected {
                return Err(StoreError::Corrupt(format!(
                    "slot {} holds {}, expected {}",
                    slot,
                    artifact.kind(),
                    expected
                )));
            }
            learners.push(artifact.into_learner(FEATURE_COUNT).map_err(StoreError::Corrupt)?);
        }
        let learners: [Arc<dyn BaseLearner>; LEARNER_COUNT] = learners
            .try_into()
            .map_err(|_| StoreError::Corrupt("learner slot count changed".to_string()))?;

        self.scaler.check(FEATURE_COUNT).map_err(StoreError::Corrupt)?;

        let summary = self.ensemble;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !summary.accuracies.iter().all(|a| in_unit(*a)) || !in_unit(summary.ensemble_accuracy) {
            return Err(StoreError::Corrupt("accuracy outside [0, 1]".to_string()));
        }

        Ok(HazardModelRecord::new(
            self.hazard,
            learners,
            summary.weights,
            summary.accuracies,
            summary.ensemble_accuracy,
            self.scaler,
            summary.metrics,
        ))
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable bundle storage keyed by hazard
pub trait ArtifactStore: Send + Sync + fmt::Debug {
    fn write(&self, hazard: HazardType, bundle: &ModelBundle) -> Result<(), StoreError>;

    /// `StoreError::NotFound` when nothing was ever written for `hazard`
    fn read(&self, hazard: HazardType) -> Result<ModelBundle, StoreError>;
}

// ============================================================================
// FILE STORE
// ============================================================================

const MANIFEST_FILE: &str = "manifest.json";
const SCALER_FILE: &str = "scaler.json";
const ENSEMBLE_FILE: &str = "ensemble.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    hazard: HazardType,
    layout_version: u8,
    layout_hash: u32,
    written_at: DateTime<Utc>,
    /// file name → sha256 hex
    files: BTreeMap<String, String>,
}

fn learner_file(kind: LearnerKind) -> String {
    format!("{}.json", kind.as_str())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hazard_dir(&self, hazard: HazardType) -> PathBuf {
        self.root.join(hazard.as_str())
    }

    fn write_staged(&self, dir: &Path, bundle: &ModelBundle) -> Result<(), StoreError> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::with_capacity(LEARNER_COUNT + 2);
        for (slot, artifact) in bundle.learners.iter().enumerate() {
            files.push((learner_file(LearnerKind::SLOTS[slot]), encode(artifact)?));
        }
        files.push((SCALER_FILE.to_string(), encode(&bundle.scaler)?));
        files.push((ENSEMBLE_FILE.to_string(), encode(&bundle.ensemble)?));

        let mut checksums = BTreeMap::new();
        for (name, bytes) in &files {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(StoreError::io(&path))?;
            checksums.insert(name.clone(), sha256_hex(bytes));
        }

        let manifest = Manifest {
            hazard: bundle.hazard,
            layout_version: bundle.layout_version,
            layout_hash: bundle.layout_hash,
            written_at: Utc::now(),
            files: checksums,
        };
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, encode(&manifest)?).map_err(StoreError::io(&path))?;
        Ok(())
    }

    fn read_checked<T: DeserializeOwned>(&self, dir: &Path, manifest: &Manifest, name: &str) -> Result<T, StoreError> {
        let expected = manifest
            .files
            .get(name)
            .ok_or_else(|| StoreError::Corrupt(format!("{} is not listed in the manifest", name)))?;

        let path = dir.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Corrupt(format!("{} is missing", name)));
            }
            Err(e) => return Err(StoreError::io(&path)(e)),
        };

        if sha256_hex(&bytes) != *expected {
            return Err(StoreError::Corrupt(format!("checksum mismatch for {}", name)));
        }

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(format!("{}: {}", name, e)))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn write(&self, hazard: HazardType, bundle: &ModelBundle) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(StoreError::io(&self.root))?;

        let staging = self.root.join(format!(".{}.staging-{}", hazard, Uuid::new_v4()));
        fs::create_dir(&staging).map_err(StoreError::io(&staging))?;

        if let Err(e) = self.write_staged(&staging, bundle) {
            remove_leftover(&staging);
            return Err(e);
        }

        let live = self.hazard_dir(hazard);
        let retired = if live.exists() {
            let old = self.root.join(format!("{}{}", retired_prefix(hazard), Uuid::new_v4()));
            if let Err(e) = fs::rename(&live, &old) {
                remove_leftover(&staging);
                return Err(StoreError::io(&live)(e));
            }
            Some(old)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, &live) {
            if let Some(old) = &retired {
                if let Err(restore) = fs::rename(old, &live) {
                    log::warn!("Could not restore {} from {}: {}", live.display(), old.display(), restore);
                }
            }
            remove_leftover(&staging);
            return Err(StoreError::io(&live)(e));
        }

        if let Some(old) = retired {
            remove_leftover(&old);
        }

        log::debug!("Wrote {} bundle to {}", hazard, live.display());
        Ok(())
    }

    fn read(&self, hazard: HazardType) -> Result<ModelBundle, StoreError> {
        let live = self.hazard_dir(hazard);
        match self.read_dir(hazard, &live) {
            Err(StoreError::NotFound(_)) => {}
            other => return other,
        }

        // A writer may sit between retiring the live bundle and renaming the new one in
        for old in self.retired_dirs(hazard) {
            if let Ok(bundle) = self.read_dir(hazard, &old) {
                log::debug!("Read {} bundle from retired {}", hazard, old.display());
                return Ok(bundle);
            }
        }
        self.read_dir(hazard, &live)
    }
}

impl FileArtifactStore {
    fn read_dir(&self, hazard: HazardType, dir: &Path) -> Result<ModelBundle, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::NotFound(hazard));
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_bytes = match fs::read(&manifest_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Corrupt(format!("{} is missing", MANIFEST_FILE)));
            }
            Err(e) => return Err(StoreError::io(&manifest_path)(e)),
        };
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", MANIFEST_FILE, e)))?;

        if manifest.hazard != hazard {
            return Err(StoreError::Corrupt(format!(
                "manifest is for {}, expected {}",
                manifest.hazard, hazard
            )));
        }
        validate_layout(manifest.layout_version, manifest.layout_hash)?;

        let learners = LearnerKind::SLOTS
            .iter()
            .map(|kind| self.read_checked(dir, &manifest, &learner_file(*kind)))
            .collect::<Result<Vec<LearnerArtifact>, _>>()?;

        Ok(ModelBundle {
            hazard,
            layout_version: manifest.layout_version,
            layout_hash: manifest.layout_hash,
            learners,
            scaler: self.read_checked(dir, &manifest, SCALER_FILE)?,
            ensemble: self.read_checked(dir, &manifest, ENSEMBLE_FILE)?,
        })
    }

    /// Bundles moved aside by an in-flight `write`
    fn retired_dirs(&self, hazard: HazardType) -> Vec<PathBuf> {
        let prefix = retired_prefix(hazard);
        match fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
                .map(|e| e.path())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn retired_prefix(hazard: HazardType) -> String {
    format!(".{}.old-", hazard)
}

fn remove_leftover(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store. Bundles are kept as JSON text so reads go through the
/// same serialization as the file store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    bundles: Mutex<HashMap<HazardType, String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hazard: HazardType) -> bool {
        self.bundles.lock().contains_key(&hazard)
    }

    pub fn remove(&self, hazard: HazardType) -> bool {
        self.bundles.lock().remove(&hazard).is_some()
    }

    /// Store raw text as-is, e.g. to simulate a damaged bundle
    pub fn insert_raw(&self, hazard: HazardType, json: impl Into<String>) {
        self.bundles.lock().insert(hazard, json.into());
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn write(&self, hazard: HazardType, bundle: &ModelBundle) -> Result<(), StoreError> {
        let json = serde_json::to_string(bundle).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.bundles.lock().insert(hazard, json);
        Ok(())
    }

    fn read(&self, hazard: HazardType) -> Result<ModelBundle, StoreError> {
        let guard = self.bundles.lock();
        let json = guard.get(&hazard).ok_or(StoreError::NotFound(hazard))?;
        serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}
