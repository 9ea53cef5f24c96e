//! Engine configuration
//!
//! Every field has a default, so a partial JSON document (or none at all) is a
//! valid configuration.

use crate::artifact::ArtifactFilter;
use crate::error::FocusError;
use crate::fusion::{DualModality, LabelBands};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Which fusion strategy produces the focus score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ScoringConfig {
    /// Interpolate the dominant label's probability within its score band
    ProbabilityBands,
    /// Weighted blend of biosignal and behaviour scores
    DualModality(DualModality),
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig::ProbabilityBands
    }
}

/// Configuration for a focus engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Span of the sliding window (seconds)
    pub window_duration_secs: f64,
    /// Cadence between inferences (seconds)
    pub hop_duration_secs: f64,
    /// Minimum intervals surviving artifact rejection to run inference
    pub min_valid_samples: usize,
    pub enable_smoothing: bool,
    /// Weight of the new score in the EMA (0-1]
    pub smoothing_lambda: f64,
    /// Motion above which a window is discarded (g)
    pub motion_threshold_g: f64,
    /// Hours between baseline recalibrations
    pub baseline_update_interval_hours: f64,
    /// Buffered samples needed before a baseline personalizes
    pub baseline_min_samples: usize,
    /// Heart rates outside this range are rejected at ingestion (bpm)
    pub min_heart_rate_bpm: f64,
    pub max_heart_rate_bpm: f64,
    pub artifact: ArtifactFilter,
    pub label_bands: LabelBands,
    pub scoring: ScoringConfig,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            window_duration_secs: 60.0,
            hop_duration_secs: 5.0,
            min_valid_samples: 30,
            enable_smoothing: true,
            smoothing_lambda: 0.9,
            motion_threshold_g: 2.0,
            baseline_update_interval_hours: 24.0,
            baseline_min_samples: 100,
            min_heart_rate_bpm: 30.0,
            max_heart_rate_bpm: 220.0,
            artifact: ArtifactFilter::default(),
            label_bands: LabelBands::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl FocusConfig {
    /// Parse and validate a configuration
    pub fn from_json(json: &str) -> Result<Self, FocusError> {
        let config: FocusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, FocusError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), FocusError> {
        let invalid = |msg: &str| Err(FocusError::InvalidConfig(msg.to_string()));

        if !(self.window_duration_secs > 0.0) || !self.window_duration_secs.is_finite() {
            return invalid("window_duration_secs must be positive");
        }
        if !(self.hop_duration_secs > 0.0) || self.hop_duration_secs > self.window_duration_secs {
            return invalid("hop_duration_secs must be positive and no longer than the window");
        }
        if self.min_valid_samples == 0 {
            return invalid("min_valid_samples must be at least 1");
        }
        if !(self.smoothing_lambda > 0.0 && self.smoothing_lambda <= 1.0) {
            return invalid("smoothing_lambda must be in (0, 1]");
        }
        if !(self.motion_threshold_g >= 0.0) {
            return invalid("motion_threshold_g must be non-negative");
        }
        if self.baseline_min_samples < 2 {
            return invalid("baseline_min_samples must be at least 2");
        }
        if !(self.baseline_update_interval_hours >= 0.0) {
            return invalid("baseline_update_interval_hours must be non-negative");
        }
        if !(self.min_heart_rate_bpm > 0.0 && self.min_heart_rate_bpm < self.max_heart_rate_bpm) {
            return invalid("heart-rate bounds must satisfy 0 < min < max");
        }
        let a = &self.artifact;
        if !(a.min_interval_ms > 0.0 && a.min_interval_ms < a.max_interval_ms)
            || !(a.max_successive_diff_ms > 0.0)
        {
            return invalid("artifact bounds must satisfy 0 < min < max and a positive jump limit");
        }
        self.label_bands.validate()?;
        if let ScoringConfig::DualModality(dual) = &self.scoring {
            dual.validate()?;
        }
        Ok(())
    }

    pub fn window_duration(&self) -> Duration {
        seconds(self.window_duration_secs)
    }

    pub fn hop_duration(&self) -> Duration {
        seconds(self.hop_duration_secs)
    }

    pub fn baseline_update_interval(&self) -> Duration {
        seconds(self.baseline_update_interval_hours * 3600.0)
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
