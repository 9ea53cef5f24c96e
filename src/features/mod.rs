//! Feature extraction
//!
//! This module turns cleaned beat-interval sequences into fixed-order feature
//! vectors for the classifier:
//! - 24-feature HRV schema (time, frequency and statistical domains)
//! - 6-feature legacy schema for the secondary classifier path

pub mod hrv;
pub mod legacy;
pub mod spectral;
pub mod stats;

pub use hrv::{HrvFeatureExtractor, HRV24_FEATURE_NAMES};
pub use legacy::{LegacyFeatureExtractor, LEGACY6_FEATURE_NAMES};

use crate::error::FocusError;
use crate::types::{FeatureSchema, FeatureVector};

/// Extract the feature vector for a schema
pub fn extract(schema: FeatureSchema, intervals_ms: &[f64]) -> Result<FeatureVector, FocusError> {
    match schema {
        FeatureSchema::Hrv24 => HrvFeatureExtractor::extract(intervals_ms),
        FeatureSchema::Legacy6 => LegacyFeatureExtractor::extract(intervals_ms),
    }
}
