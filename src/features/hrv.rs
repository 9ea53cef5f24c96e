//! 24-feature HRV extraction
//!
//! Produces nine time-domain, eleven frequency-domain and four statistical
//! features from a cleaned beat-interval sequence (ms). Degenerate windows
//! degrade individual features to zero; only an empty sequence is an error.

use crate::error::FocusError;
use crate::features::spectral::{self, BandPowers};
use crate::features::stats;
use crate::types::{FeatureSchema, FeatureVector};

/// Successive difference threshold for NN50 (ms)
pub const NN50_THRESHOLD_MS: f64 = 50.0;

/// Feature names in schema order
pub const HRV24_FEATURE_NAMES: [&str; 24] = [
    // Time domain
    "mean_rr",
    "std_rr",
    "min_rr",
    "max_rr",
    "range_rr",
    "rmssd",
    "sdnn",
    "nn50",
    "pnn50",
    // Frequency domain
    "vlf_power",
    "lf_power",
    "hf_power",
    "uhf_power",
    "total_power",
    "lf_hf_ratio",
    "vlf_pct",
    "lf_pct",
    "hf_pct",
    "uhf_pct",
    "lf_nu",
    // Statistical
    "skewness",
    "kurtosis",
    "median_rr",
    "iqr_rr",
];

/// Extractor for the 24-feature schema
#[derive(Debug, Clone, Copy, Default)]
pub struct HrvFeatureExtractor;

impl HrvFeatureExtractor {
    pub fn extract(intervals_ms: &[f64]) -> Result<FeatureVector, FocusError> {
        if intervals_ms.is_empty() {
            return Err(FocusError::InsufficientData(
                "no beat intervals to extract features from".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(HRV24_FEATURE_NAMES.len());
        values.extend(time_domain(intervals_ms));
        values.extend(frequency_domain(intervals_ms));
        values.extend(statistical(intervals_ms));

        // Anything non-finite from pathological input is neutralized
        for value in values.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }

        Ok(FeatureVector::new(FeatureSchema::Hrv24, values))
    }
}

/// Count and percentage of successive differences above the NN50 threshold
pub(crate) fn nn50(intervals_ms: &[f64]) -> (f64, f64) {
    let diffs = stats::successive_diffs(intervals_ms);
    if diffs.is_empty() {
        return (0.0, 0.0);
    }
    let count = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_MS).count() as f64;
    (count, count / diffs.len() as f64 * 100.0)
}

fn time_domain(intervals: &[f64]) -> [f64; 9] {
    if intervals.len() < 2 {
        return [0.0; 9];
    }

    let mean = stats::mean(intervals);
    let std = stats::sample_std(intervals);
    let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let rmssd = stats::rmssd(intervals);
    let (nn50, pnn50) = nn50(intervals);

    [mean, std, min, max, max - min, rmssd, std, nn50, pnn50]
}

fn frequency_domain(intervals: &[f64]) -> [f64; 11] {
    let powers: BandPowers = spectral::band_powers(intervals);
    let total = powers.total();
    if total <= 0.0 {
        return [0.0; 11];
    }

    [
        powers.vlf,
        powers.lf,
        powers.hf,
        powers.uhf,
        total,
        powers.lf_hf_ratio(),
        powers.percent_of_total(powers.vlf),
        powers.percent_of_total(powers.lf),
        powers.percent_of_total(powers.hf),
        powers.percent_of_total(powers.uhf),
        powers.lf_normalized(),
    ]
}

fn statistical(intervals: &[f64]) -> [f64; 4] {
    [
        stats::skewness(intervals),
        stats::excess_kurtosis(intervals),
        stats::median(intervals),
        stats::iqr_truncated(intervals),
    ]
}
