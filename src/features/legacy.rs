//! Compact 6-feature extraction for the secondary classifier path

use crate::error::FocusError;
use crate::features::hrv::nn50;
use crate::features::spectral;
use crate::features::stats;
use crate::types::{FeatureSchema, FeatureVector};

/// Feature names in schema order
pub const LEGACY6_FEATURE_NAMES: [&str; 6] = [
    "mean_hr",
    "std_hr",
    "rmssd",
    "sdnn",
    "pnn50",
    "lf_hf_ratio",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFeatureExtractor;

impl LegacyFeatureExtractor {
    pub fn extract(intervals_ms: &[f64]) -> Result<FeatureVector, FocusError> {
        if intervals_ms.is_empty() {
            return Err(FocusError::InsufficientData(
                "no beat intervals to extract features from".to_string(),
            ));
        }

        let heart_rates: Vec<f64> = intervals_ms
            .iter()
            .filter(|v| **v > 0.0)
            .map(|v| 60_000.0 / v)
            .collect();

        let mut values = vec![
            stats::mean(&heart_rates),
            stats::sample_std(&heart_rates),
            stats::rmssd(intervals_ms),
            stats::sample_std(intervals_ms),
            nn50(intervals_ms).1,
            spectral::band_powers(intervals_ms).lf_hf_ratio(),
        ];
        for value in values.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }

        Ok(FeatureVector::new(FeatureSchema::Legacy6, values))
    }
}
