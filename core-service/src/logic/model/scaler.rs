//! Standard Scaler
//!
//! z = (x - mean) / std, with population std. A zero-variance column gets
//! std = 1 so the transform stays finite.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `x`. Returns `None` for an empty matrix.
    pub fn fit(x: ArrayView2<'_, f64>) -> Option<Self> {
        let mean = x.mean_axis(Axis(0))?;
        let std = x.std_axis(Axis(0), 0.0);

        let scale = std
            .iter()
            .map(|&s| if s > 0.0 && s.is_finite() { s } else { 1.0 })
            .collect();

        Some(Self { mean: mean.to_vec(), scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// A row of the wrong width is a `Shape` error
    pub fn transform_row(&self, x: &[f64]) -> Result<Vec<f64>, ContractError> {
        if x.len() != self.mean.len() {
            return Err(ContractError::Shape { expected: self.mean.len(), actual: x.len() });
        }
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for mut row in out.outer_iter_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.mean.len() != n_features || self.scale.len() != n_features {
            return Err(format!(
                "scaler has {} / {} columns, layout has {}",
                self.mean.len(),
                self.scale.len(),
                n_features
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) || self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("scaler has non-finite or non-positive parameters".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();

        assert_eq!(scaler.mean, vec![2.0, 10.0]);
        // zero variance column keeps unit scale
        assert_eq!(scaler.scale, vec![1.0, 1.0]);

        let z = scaler.transform(x.view());
        assert_eq!(z, array![[-1.0, 0.0], [1.0, 0.0]]);
        assert_eq!(scaler.transform_row(&[5.0, 12.0]).unwrap(), vec![3.0, 2.0]);
        assert_eq!(
            scaler.transform_row(&[5.0]),
            Err(ContractError::Shape { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_population_std() {
        let x = array![[0.0], [4.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        assert_eq!(scaler.scale, vec![2.0]);
    }

    #[test]
    fn test_empty_matrix() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(x.view()).is_none());
    }

    #[test]
    fn test_check() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.check(2).is_ok());
        assert!(scaler.check(3).is_err());
    }
}
