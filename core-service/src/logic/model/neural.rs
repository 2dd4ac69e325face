//! Neural Network - One hidden layer MLP
//!
//! x → ReLU(W1·x + b1) → σ(w2·h + b2)
//! Mini-batch SGD on binary cross-entropy with L2 decay. Expects scaled input.

use std::sync::Arc;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::boosting::sigmoid;
use super::learner::{check_fit_input, BaseLearner, FitError, LearnerArtifact, LearnerKind, LearnerTrainer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub l2: f64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden: 32,
            epochs: 20,
            learning_rate: 0.05,
            batch_size: 64,
            l2: 1e-4,
        }
    }
}

impl MlpParams {
    pub fn small(self) -> Self {
        Self {
            hidden: 16,
            epochs: 10,
            batch_size: 32,
            ..self
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    n_features: usize,
    hidden: usize,
    /// hidden × n_features, row-major
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl Mlp {
    fn init(n_features: usize, hidden: usize, rng: &mut StdRng) -> Result<Self, FitError> {
        // He initialization for the ReLU layer
        let std1 = (2.0 / n_features as f64).sqrt();
        let std2 = (1.0 / hidden as f64).sqrt();
        let normal1 = Normal::new(0.0, std1).map_err(|e| FitError::Diverged(e.to_string()))?;
        let normal2 = Normal::new(0.0, std2).map_err(|e| FitError::Diverged(e.to_string()))?;

        Ok(Self {
            n_features,
            hidden,
            w1: (0..hidden * n_features).map(|_| normal1.sample(rng)).collect(),
            b1: vec![0.0; hidden],
            w2: (0..hidden).map(|_| normal2.sample(rng)).collect(),
            b2: 0.0,
        })
    }

    /// Fills `h` with hidden activations and returns P(positive)
    fn forward(&self, x: impl Fn(usize) -> f64, h: &mut [f64]) -> f64 {
        let mut z2 = self.b2;
        for j in 0..self.hidden {
            let row = &self.w1[j * self.n_features..(j + 1) * self.n_features];
            let z: f64 = self.b1[j] + row.iter().enumerate().map(|(k, w)| w * x(k)).sum::<f64>();
            h[j] = z.max(0.0);
            z2 += self.w2[j] * h[j];
        }
        sigmoid(z2)
    }

    fn is_finite(&self) -> bool {
        self.b2.is_finite()
            && self.w1.iter().chain(&self.b1).chain(&self.w2).all(|v| v.is_finite())
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "neural_network expects {} features, layout has {}",
                self.n_features, n_features
            ));
        }
        if self.hidden == 0
            || self.w1.len() != self.hidden * self.n_features
            || self.b1.len() != self.hidden
            || self.w2.len() != self.hidden
        {
            return Err("neural_network weight shapes are inconsistent".to_string());
        }
        if !self.is_finite() {
            return Err("neural_network has non-finite weights".to_string());
        }
        Ok(())
    }
}

impl BaseLearner for Mlp {
    fn kind(&self) -> LearnerKind {
        LearnerKind::NeuralNetwork
    }

    fn probability_of_positive(&self, x: &[f64]) -> f64 {
        let mut h = vec![0.0; self.hidden];
        self.forward(|k| x[k], &mut h)
    }

    fn to_artifact(&self) -> Option<LearnerArtifact> {
        Some(LearnerArtifact::Neural(self.clone()))
    }
}

// ============================================================================
// TRAINER
// ============================================================================

#[derive(Debug, Clone)]
pub struct MlpTrainer {
    params: MlpParams,
}

impl MlpTrainer {
    pub fn new(params: MlpParams) -> Self {
        Self { params }
    }
}

impl LearnerTrainer for MlpTrainer {
    fn kind(&self) -> LearnerKind {
        LearnerKind::NeuralNetwork
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[u8], seed: u64) -> Result<Arc<dyn BaseLearner>, FitError> {
        check_fit_input(&x, y)?;

        let (n_rows, d) = x.dim();
        let hidden = self.params.hidden.max(1);
        let batch_size = self.params.batch_size.max(1);
        let lr = self.params.learning_rate;
        let l2 = self.params.l2;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut net = Mlp::init(d, hidden, &mut rng)?;

        let mut order: Vec<usize> = (0..n_rows).collect();
        let mut h = vec![0.0; hidden];
        let mut g_w1 = vec![0.0; hidden * d];
        let mut g_b1 = vec![0.0; hidden];
        let mut g_w2 = vec![0.0; hidden];

        for epoch in 0..self.params.epochs {
            order.shuffle(&mut rng);

            for batch in order.chunks(batch_size) {
                g_w1.iter_mut().for_each(|g| *g = 0.0);
                g_b1.iter_mut().for_each(|g| *g = 0.0);
                g_w2.iter_mut().for_each(|g| *g = 0.0);
                let mut g_b2 = 0.0;

                for &i in batch {
                    let row = x.row(i);
                    let p = net.forward(|k| row[k], &mut h);
                    let dz2 = p - y[i] as f64;

                    g_b2 += dz2;
                    for j in 0..hidden {
                        g_w2[j] += dz2 * h[j];
                        if h[j] > 0.0 {
                            let dz1 = dz2 * net.w2[j];
                            g_b1[j] += dz1;
                            let g_row = &mut g_w1[j * d..(j + 1) * d];
                            for (k, g) in g_row.iter_mut().enumerate() {
                                *g += dz1 * row[k];
                            }
                        }
                    }
                }

                let scale = lr / batch.len() as f64;
                for (w, g) in net.w1.iter_mut().zip(&g_w1) {
                    *w -= scale * g + lr * l2 * *w;
                }
                for (b, g) in net.b1.iter_mut().zip(&g_b1) {
                    *b -= scale * g;
                }
                for (w, g) in net.w2.iter_mut().zip(&g_w2) {
                    *w -= scale * g + lr * l2 * *w;
                }
                net.b2 -= scale * g_b2;
            }

            if !net.is_finite() {
                return Err(FitError::Diverged(format!("non-finite weights after epoch {}", epoch)));
            }
        }

        Ok(Arc::new(net))
    }
}
