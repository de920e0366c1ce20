//! Per-feature standardization

use crate::models::{FeatureVector, FEATURE_COUNT};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Means and population standard deviations fitted on a training set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub means: [f64; FEATURE_COUNT],
    pub stds: [f64; FEATURE_COUNT],
}

impl NormalizationParams {
    /// Fit on `samples`; `None` when there are no samples
    pub fn fit(samples: &[FeatureVector]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;

        let mut means = [0.0; FEATURE_COUNT];
        for sample in samples {
            for (mean, value) in means.iter_mut().zip(sample.to_array()) {
                *mean += value;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stds = [0.0; FEATURE_COUNT];
        for sample in samples {
            for (i, value) in sample.to_array().into_iter().enumerate() {
                stds[i] += (value - means[i]).powi(2);
            }
        }
        stds.iter_mut().for_each(|s| *s = (*s / n).sqrt());

        Some(Self { means, stds })
    }

    /// Standardize one vector; zero-variance features map to 0
    pub fn apply(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = features.to_array();
        for (i, value) in out.iter_mut().enumerate() {
            *value = if self.stds[i] == 0.0 {
                0.0
            } else {
                (*value - self.means[i]) / self.stds[i]
            };
        }
        out
    }

    /// Standardize a batch into an `n x FEATURE_COUNT` matrix
    pub fn apply_batch(&self, samples: &[FeatureVector]) -> Array2<f64> {
        Array2::from_shape_fn((samples.len(), FEATURE_COUNT), |(row, col)| {
            self.apply(&samples[row])[col]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<FeatureVector> {
        vec![
            FeatureVector::from([10.0, 40.0, 0.0, 10.0, 3.0]),
            FeatureVector::from([20.0, 60.0, 30.0, 10.0, 12.0]),
            FeatureVector::from([30.0, 80.0, 60.0, 10.0, 21.0]),
        ]
    }

    #[test]
    fn test_fit_population_std() {
        let params = NormalizationParams::fit(&samples()).unwrap();
        assert_eq!(params.means, [20.0, 60.0, 30.0, 10.0, 12.0]);
        let expected = (200.0f64 / 3.0).sqrt();
        assert!((params.stds[0] - expected).abs() < 1e-12);
        assert_eq!(params.stds[3], 0.0);
    }

    #[test]
    fn test_mean_normalizes_to_zero() {
        let params = NormalizationParams::fit(&samples()).unwrap();
        let mean = FeatureVector::from(params.means);
        for value in params.apply(&mean) {
            assert!(value.abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_std_forced_to_zero() {
        let params = NormalizationParams::fit(&samples()).unwrap();
        let odd = FeatureVector::from([20.0, 60.0, 30.0, 99.0, 12.0]);
        assert_eq!(params.apply(&odd)[3], 0.0);
    }

    #[test]
    fn test_apply_batch_matches_apply() {
        let data = samples();
        let params = NormalizationParams::fit(&data).unwrap();
        let batch = params.apply_batch(&data);
        assert_eq!(batch.dim(), (3, FEATURE_COUNT));
        for (row, sample) in data.iter().enumerate() {
            let single = params.apply(sample);
            for col in 0..FEATURE_COUNT {
                assert_eq!(batch[[row, col]], single[col]);
            }
        }
    }

    #[test]
    fn test_empty_fit() {
        assert!(NormalizationParams::fit(&[]).is_none());
    }
}
