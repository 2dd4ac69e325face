//! Gradient Boosting - Log-loss boosted regression trees
//!
//! raw(x) = base + η · Σ tree_k(x), P = σ(raw).
//! Each round fits a Newton tree to the gradient p - y and hessian p(1 - p).

use std::sync::Arc;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::learner::{check_fit_input, BaseLearner, FitError, LearnerArtifact, LearnerKind, LearnerTrainer};
use super::tree::{grow, BinnedMatrix, Criterion, GrowParams, SplitRule, Stat, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// L2 penalty on leaf values
    pub lambda: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 4,
            learning_rate: 0.1,
            lambda: 1.0,
            min_samples_leaf: 5,
        }
    }
}

impl BoostingParams {
    pub fn small(self) -> Self {
        Self {
            n_rounds: 20,
            learning_rate: 0.3,
            ..self
        }
    }
}

#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    n_features: usize,
    /// Prior log-odds
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl BoostedTrees {
    fn raw_score(&self, feature_value: impl Fn(usize) -> f64 + Copy) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict_with(feature_value)).sum::<f64>()
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "gradient_boosting expects {} features, layout has {}",
                self.n_features, n_features
            ));
        }
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err("gradient_boosting has non-finite parameters".to_string());
        }
        if let Some(i) = self.trees.iter().position(|t| !t.is_well_formed(n_features)) {
            return Err(format!("gradient_boosting tree {} is malformed", i));
        }
        Ok(())
    }
}

impl BaseLearner for BoostedTrees {
    fn kind(&self) -> LearnerKind {
        LearnerKind::GradientBoosting
    }

    fn probability_of_positive(&self, x: &[f64]) -> f64 {
        sigmoid(self.raw_score(|f| x[f]))
    }

    fn to_artifact(&self) -> Option<LearnerArtifact> {
        Some(LearnerArtifact::Boosting(self.clone()))
    }
}

// ============================================================================
// TRAINER
// ============================================================================

#[derive(Debug, Clone)]
pub struct BoostingTrainer {
    params: BoostingParams,
}

impl BoostingTrainer {
    pub fn new(params: BoostingParams) -> Self {
        Self { params }
    }
}

impl LearnerTrainer for BoostingTrainer {
    fn kind(&self) -> LearnerKind {
        LearnerKind::GradientBoosting
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[u8], seed: u64) -> Result<Arc<dyn BaseLearner>, FitError> {
        check_fit_input(&x, y)?;

        let (n_rows, n_features) = x.dim();
        let binned = BinnedMatrix::from_rows(x);

        let prior = (y.iter().map(|&v| v as f64).sum::<f64>() / n_rows as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();
        let mut raw = vec![base_score; n_rows];

        let grow_params = GrowParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2 * self.params.min_samples_leaf.max(1),
            min_samples_leaf: self.params.min_samples_leaf.max(1),
            max_features: 0,
            split_rule: SplitRule::Best,
            criterion: Criterion::Newton { lambda: self.params.lambda },
        };

        // Only consulted for feature sampling, which is off (max_features = 0)
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(self.params.n_rounds);
        let mut stats = vec![Stat::default(); n_rows];

        for round in 0..self.params.n_rounds {
            for (i, stat) in stats.iter_mut().enumerate() {
                let p = sigmoid(raw[i]);
                *stat = Stat {
                    n: 1.0,
                    a: p - y[i] as f64,
                    b: (p * (1.0 - p)).max(1e-12),
                };
            }

            let mut rows: Vec<usize> = (0..n_rows).collect();
            let tree = grow(&binned, &stats, &mut rows, grow_params, &mut rng);

            for (i, row) in x.outer_iter().enumerate() {
                raw[i] += self.params.learning_rate * tree.predict_with(|f| row[f]);
            }

            if raw.iter().any(|r| !r.is_finite()) {
                return Err(FitError::Diverged(format!("non-finite score after round {}", round)));
            }
            trees.push(tree);
        }

        Ok(Arc::new(BoostedTrees {
            n_features,
            base_score,
            learning_rate: self.params.learning_rate,
            trees,
        }))
    }
}
