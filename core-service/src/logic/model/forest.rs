//! Tree Ensembles - Random forest and extremely randomized trees
//!
//! Both average leaf positive fractions over independently grown Gini trees.
//! Random forest: bootstrap rows, best split among √d features.
//! Extra trees: all rows, one random threshold per candidate feature.

use std::sync::Arc;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::learner::{check_fit_input, BaseLearner, FitError, LearnerArtifact, LearnerKind, LearnerTrainer};
use super::tree::{grow, BinnedMatrix, Criterion, GrowParams, SplitRule, Stat, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub split_rule: SplitRule,
}

impl ForestParams {
    pub fn random_forest() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 2,
            bootstrap: true,
            split_rule: SplitRule::Best,
        }
    }

    pub fn extra_trees() -> Self {
        Self {
            n_trees: 100,
            max_depth: 14,
            min_samples_leaf: 1,
            bootstrap: false,
            split_rule: SplitRule::Random,
        }
    }

    /// Same algorithm, fewer and shallower trees
    pub fn small(self) -> Self {
        Self {
            n_trees: 10,
            max_depth: 6,
            ..self
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    kind: LearnerKind,
    n_features: usize,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if !matches!(self.kind, LearnerKind::RandomForest | LearnerKind::ExtraTrees) {
            return Err(format!("{} is not a tree ensemble", self.kind));
        }
        if self.n_features != n_features {
            return Err(format!("{} expects {} features, layout has {}", self.kind, self.n_features, n_features));
        }
        if self.trees.is_empty() {
            return Err(format!("{} has no trees", self.kind));
        }
        if let Some(i) = self.trees.iter().position(|t| !t.is_well_formed(n_features)) {
            return Err(format!("{} tree {} is malformed", self.kind, i));
        }
        Ok(())
    }
}

impl BaseLearner for TreeEnsemble {
    fn kind(&self) -> LearnerKind {
        self.kind
    }

    fn probability_of_positive(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        sum / self.trees.len() as f64
    }

    fn to_artifact(&self) -> Option<LearnerArtifact> {
        Some(LearnerArtifact::Forest(self.clone()))
    }
}

// ============================================================================
// TRAINER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ForestTrainer {
    kind: LearnerKind,
    params: ForestParams,
}

impl ForestTrainer {
    pub fn new(kind: LearnerKind, params: ForestParams) -> Self {
        Self { kind, params }
    }
}

impl LearnerTrainer for ForestTrainer {
    fn kind(&self) -> LearnerKind {
        self.kind
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[u8], seed: u64) -> Result<Arc<dyn BaseLearner>, FitError> {
        check_fit_input(&x, y)?;

        let (n_rows, n_features) = x.dim();
        let binned = BinnedMatrix::from_rows(x);
        let stats: Vec<Stat> = y
            .iter()
            .map(|&label| Stat { n: 1.0, a: label as f64, b: 0.0 })
            .collect();

        let grow_params = GrowParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2 * self.params.min_samples_leaf.max(1),
            min_samples_leaf: self.params.min_samples_leaf.max(1),
            max_features: ((n_features as f64).sqrt().round() as usize).max(1),
            split_rule: self.params.split_rule,
            criterion: Criterion::Gini,
        };

        let n_trees = self.params.n_trees.max(1);
        let mut trees = Vec::with_capacity(n_trees);
        for t in 0..n_trees {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
            let mut rows: Vec<usize> = if self.params.bootstrap {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            trees.push(grow(&binned, &stats, &mut rows, grow_params, &mut rng));
        }

        log::debug!(
            "{}: {} trees, mean depth {:.1}",
            self.kind,
            trees.len(),
            trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(Arc::new(TreeEnsemble { kind: self.kind, n_features, trees }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Two features; label = x0 + x1 > 1
    fn diagonal_data(n: usize) -> (Array2<f64>, Vec<u8>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64 / n as f64;
            if j == 0 { t } else { ((i * 7) % n) as f64 / n as f64 }
        });
        let y = (0..n).map(|i| (x[[i, 0]] + x[[i, 1]] > 1.0) as u8).collect();
        (x, y)
    }

    fn accuracy(model: &dyn BaseLearner, x: &Array2<f64>, y: &[u8]) -> f64 {
        let correct = x
            .outer_iter()
            .zip(y)
            .filter(|(row, &label)| {
                let p = model.probability_of_positive(&row.to_vec());
                (p > 0.5) == (label == 1)
            })
            .count();
        correct as f64 / y.len() as f64
    }

    #[test]
    fn test_random_forest_learns_diagonal() {
        let (x, y) = diagonal_data(400);
        let trainer = ForestTrainer::new(LearnerKind::RandomForest, ForestParams::random_forest().small());

        let model = trainer.fit(x.view(), &y, 42).unwrap();

        assert_eq!(model.kind(), LearnerKind::RandomForest);
        assert!(accuracy(model.as_ref(), &x, &y) > 0.85);
    }

    #[test]
    fn test_extra_trees_learns_diagonal() {
        let (x, y) = diagonal_data(400);
        let trainer = ForestTrainer::new(LearnerKind::ExtraTrees, ForestParams::extra_trees().small());

        let model = trainer.fit(x.view(), &y, 42).unwrap();

        assert_eq!(model.kind(), LearnerKind::ExtraTrees);
        assert!(accuracy(model.as_ref(), &x, &y) > 0.85);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = diagonal_data(200);
        let trainer = ForestTrainer::new(LearnerKind::RandomForest, ForestParams::random_forest().small());
        let model = trainer.fit(x.view(), &y, 1).unwrap();

        for row in x.outer_iter() {
            let p = model.probability_of_positive(&row.to_vec());
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = diagonal_data(200);
        let trainer = ForestTrainer::new(LearnerKind::RandomForest, ForestParams::random_forest().small());

        let a = trainer.fit(x.view(), &y, 9).unwrap().to_artifact();
        let b = trainer.fit(x.view(), &y, 9).unwrap().to_artifact();

        assert_eq!(a, b);
    }

    #[test]
    fn test_artifact_check_rejects_wrong_width() {
        let (x, y) = diagonal_data(100);
        let trainer = ForestTrainer::new(LearnerKind::ExtraTrees, ForestParams::extra_trees().small());
        let artifact = trainer.fit(x.view(), &y, 3).unwrap().to_artifact().unwrap();

        assert!(artifact.clone().into_learner(2).is_ok());
        assert!(artifact.into_learner(3).is_err());
    }
}
