//! Score fusion
//!
//! Maps classifier output to a bounded 0-100 focus score. Two strategies share
//! one interface:
//! - probability bands: the dominant label's probability is interpolated
//!   within that label's score band
//! - dual modality: a weighted blend of a biosignal score and a host-supplied
//!   behaviour score, thresholded into High/Medium/Low
//!
//! Either way the result is smoothed with an exponential moving average that
//! remembers exactly one previous score.

use crate::config::{FocusConfig, ScoringConfig};
use crate::error::{ClassifierError, FocusError};
use crate::types::{ClassProbabilities, FocusLabel, FocusLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Score range assigned to a label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub low: f64,
    pub high: f64,
}

impl ScoreBand {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Linear position of `probability` within the band
    pub fn interpolate(&self, probability: f64) -> f64 {
        self.low + probability * (self.high - self.low)
    }
}

/// Per-label score bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<FocusLabel, ScoreBand>",
    from = "BTreeMap<FocusLabel, ScoreBand>"
)]
pub struct LabelBands {
    bands: [ScoreBand; FocusLabel::COUNT],
}

impl Default for LabelBands {
    fn default() -> Self {
        let mut bands = [ScoreBand::new(0.0, 100.0); FocusLabel::COUNT];
        bands[FocusLabel::Focused.index()] = ScoreBand::new(70.0, 100.0);
        bands[FocusLabel::Bored.index()] = ScoreBand::new(30.0, 50.0);
        bands[FocusLabel::Anxious.index()] = ScoreBand::new(20.0, 40.0);
        bands[FocusLabel::Overload.index()] = ScoreBand::new(0.0, 20.0);
        bands[FocusLabel::TimePressure.index()] = ScoreBand::new(40.0, 70.0);
        bands[FocusLabel::Distracted.index()] = ScoreBand::new(0.0, 40.0);
        Self { bands }
    }
}

impl LabelBands {
    pub fn band(&self, label: FocusLabel) -> ScoreBand {
        self.bands[label.index()]
    }

    pub fn set(&mut self, label: FocusLabel, band: ScoreBand) {
        self.bands[label.index()] = band;
    }

    /// Banded score (0-100) for a label at the given probability
    pub fn score(&self, label: FocusLabel, probability: f64) -> f64 {
        self.band(label).interpolate(probability).clamp(0.0, 100.0)
    }

    pub fn validate(&self) -> Result<(), FocusError> {
        for label in FocusLabel::ALL {
            let band = self.band(label);
            let ok = band.low.is_finite()
                && band.high.is_finite()
                && 0.0 <= band.low
                && band.low <= band.high
                && band.high <= 100.0;
            if !ok {
                return Err(FocusError::InvalidConfig(format!(
                    "score band for '{label}' must satisfy 0 <= low <= high <= 100"
                )));
            }
        }
        Ok(())
    }
}

impl From<LabelBands> for BTreeMap<FocusLabel, ScoreBand> {
    fn from(bands: LabelBands) -> Self {
        FocusLabel::ALL
            .iter()
            .map(|&label| (label, bands.band(label)))
            .collect()
    }
}

impl From<BTreeMap<FocusLabel, ScoreBand>> for LabelBands {
    fn from(map: BTreeMap<FocusLabel, ScoreBand>) -> Self {
        let mut bands = LabelBands::default();
        for (label, band) in map {
            bands.set(label, band);
        }
        bands
    }
}

/// Inputs available to a fusion strategy for one cycle
#[derive(Debug, Clone, Copy)]
pub struct FusionInput<'a> {
    pub probabilities: &'a ClassProbabilities,
    pub dominant: FocusLabel,
    pub confidence: f64,
    /// Host-supplied behaviour score (0-1)
    pub behavior_score: Option<f64>,
}

/// A way of turning classifier output into a 0-100 score
pub trait FusionStrategy: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    /// Weight of the new score in the moving average
    fn smoothing_factor(&self) -> f64;

    /// Unsmoothed score (0-100)
    fn raw_score(&self, input: &FusionInput<'_>) -> f64;

    /// Coarse level for a smoothed score, if the strategy reports one
    fn level(&self, _score: f64) -> Option<FocusLevel> {
        None
    }
}

/// Interpolate the dominant label's probability within its band
#[derive(Debug, Clone)]
pub struct ProbabilityBands {
    pub bands: LabelBands,
    pub lambda: f64,
}

impl FusionStrategy for ProbabilityBands {
    fn name(&self) -> &'static str {
        "probability_bands"
    }

    fn smoothing_factor(&self) -> f64 {
        self.lambda
    }

    fn raw_score(&self, input: &FusionInput<'_>) -> f64 {
        self.bands.score(input.dominant, input.confidence)
    }
}

/// Parameters of the weighted biosignal + behaviour blend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualModality {
    pub biosignal_weight: f64,
    pub behavior_weight: f64,
    /// Weight of the new score in the moving average
    pub smoothing_factor: f64,
    /// Fused values at or above this are High (0-1)
    pub high_threshold: f64,
    /// Fused values at or above this are Medium (0-1)
    pub low_threshold: f64,
}

impl Default for DualModality {
    fn default() -> Self {
        Self {
            biosignal_weight: 0.6,
            behavior_weight: 0.4,
            smoothing_factor: 0.7,
            high_threshold: 0.7,
            low_threshold: 0.4,
        }
    }
}

impl DualModality {
    pub fn validate(&self) -> Result<(), FocusError> {
        let weights_ok = self.biosignal_weight >= 0.0
            && self.behavior_weight >= 0.0
            && (self.biosignal_weight + self.behavior_weight - 1.0).abs() < 1e-6;
        if !weights_ok {
            return Err(FocusError::InvalidConfig(
                "biosignal_weight and behavior_weight must be non-negative and sum to 1".to_string(),
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(FocusError::InvalidConfig(
                "dual-modality smoothing_factor must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 <= self.low_threshold
            && self.low_threshold <= self.high_threshold
            && self.high_threshold <= 1.0)
        {
            return Err(FocusError::InvalidConfig(
                "thresholds must satisfy 0 <= low <= high <= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Weighted blend of two 0-1 scores
    pub fn combine(&self, biosignal: f64, behavior: f64) -> f64 {
        (self.biosignal_weight * biosignal + self.behavior_weight * behavior).clamp(0.0, 1.0)
    }

    pub fn level_of(&self, fused: f64) -> FocusLevel {
        if fused >= self.high_threshold {
            FocusLevel::High
        } else if fused >= self.low_threshold {
            FocusLevel::Medium
        } else {
            FocusLevel::Low
        }
    }
}

/// Dual-modality strategy; the biosignal score comes from the banded classifier output
#[derive(Debug, Clone)]
pub struct DualModalityStrategy {
    pub params: DualModality,
    pub bands: LabelBands,
}

impl FusionStrategy for DualModalityStrategy {
    fn name(&self) -> &'static str {
        "dual_modality"
    }

    fn smoothing_factor(&self) -> f64 {
        self.params.smoothing_factor
    }

    fn raw_score(&self, input: &FusionInput<'_>) -> f64 {
        let biosignal = self.bands.score(input.dominant, input.confidence) / 100.0;
        // Without a behaviour reading the biosignal stands alone
        let behavior = input
            .behavior_score
            .filter(|b| b.is_finite())
            .map(|b| b.clamp(0.0, 1.0))
            .unwrap_or(biosignal);
        self.params.combine(biosignal, behavior) * 100.0
    }

    fn level(&self, score: f64) -> Option<FocusLevel> {
        Some(self.params.level_of(score / 100.0))
    }
}

/// Exponential moving average with a single remembered value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSmoother {
    lambda: f64,
    previous: Option<f64>,
}

impl EmaSmoother {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            previous: None,
        }
    }

    /// `lambda * new + (1 - lambda) * previous`, or `new` on the first call
    pub fn apply(&mut self, value: f64) -> f64 {
        let smoothed = match self.previous {
            Some(previous) => self.lambda * value + (1.0 - self.lambda) * previous,
            None => value,
        };
        self.previous = Some(smoothed);
        smoothed
    }

    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Outcome of fusing one classifier output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub dominant: FocusLabel,
    pub confidence: f64,
    pub raw_score: f64,
    pub score: f64,
    pub level: Option<FocusLevel>,
}

/// Strategy plus smoothing memory; one per engine
#[derive(Debug)]
pub struct ScoreFusion {
    strategy: Box<dyn FusionStrategy>,
    smoother: EmaSmoother,
    enable_smoothing: bool,
}

impl ScoreFusion {
    pub fn new(strategy: Box<dyn FusionStrategy>, enable_smoothing: bool) -> Self {
        let smoother = EmaSmoother::new(strategy.smoothing_factor());
        Self {
            strategy,
            smoother,
            enable_smoothing,
        }
    }

    pub fn from_config(config: &FocusConfig) -> Self {
        let strategy: Box<dyn FusionStrategy> = match &config.scoring {
            ScoringConfig::ProbabilityBands => Box::new(ProbabilityBands {
                bands: config.label_bands,
                lambda: config.smoothing_lambda,
            }),
            ScoringConfig::DualModality(params) => Box::new(DualModalityStrategy {
                params: *params,
                bands: config.label_bands,
            }),
        };
        Self::new(strategy, config.enable_smoothing)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Score classifier output and advance the smoothing memory
    pub fn fuse(
        &mut self,
        probabilities: &ClassProbabilities,
        behavior_score: Option<f64>,
    ) -> Result<FusedScore, ClassifierError> {
        probabilities.validate()?;
        let (dominant, confidence) = probabilities.dominant().ok_or_else(|| {
            ClassifierError::MalformedOutput("no label has positive probability".to_string())
        })?;

        let input = FusionInput {
            probabilities,
            dominant,
            confidence,
            behavior_score,
        };
        let raw_score = self.strategy.raw_score(&input).clamp(0.0, 100.0);
        let score = if self.enable_smoothing {
            self.smoother.apply(raw_score).clamp(0.0, 100.0)
        } else {
            raw_score
        };

        Ok(FusedScore {
            dominant,
            confidence,
            raw_score,
            score,
            level: self.strategy.level(score),
        })
    }

    pub fn previous_score(&self) -> Option<f64> {
        self.smoother.previous()
    }

    /// Forget the smoothing memory
    pub fn reset(&mut self) {
        self.smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focused(p: f64) -> ClassProbabilities {
        ClassProbabilities::from_pairs([
            (FocusLabel::Focused, p),
            (FocusLabel::Bored, (1.0 - p) / 2.0),
            (FocusLabel::Anxious, (1.0 - p) / 2.0),
        ])
    }

    #[test]
    fn test_probability_band_score() {
        let mut fusion = ScoreFusion::from_config(&FocusConfig::default());
        let probs = ClassProbabilities::from_pairs([
            (FocusLabel::Focused, 0.9),
            (FocusLabel::Bored, 0.05),
            (FocusLabel::Anxious, 0.03),
            (FocusLabel::Overload, 0.02),
        ]);
        let fused = fusion.fuse(&probs, None).unwrap();

        assert_eq!(fused.dominant, FocusLabel::Focused);
        assert_eq!(fused.confidence, 0.9);
        assert!((fused.raw_score - 97.0).abs() < 1e-9);
        // First inference is not smoothed
        assert_eq!(fused.score, fused.raw_score);
        assert_eq!(fused.level, None);
    }

    #[test]
    fn test_default_bands() {
        let bands = LabelBands::default();
        assert_eq!(bands.score(FocusLabel::Bored, 0.5), 40.0);
        assert_eq!(bands.score(FocusLabel::Anxious, 1.0), 40.0);
        assert_eq!(bands.score(FocusLabel::Overload, 0.25), 5.0);
        assert_eq!(bands.score(FocusLabel::TimePressure, 0.5), 55.0);
        assert_eq!(bands.score(FocusLabel::Distracted, 0.5), 20.0);
    }

    #[test]
    fn test_smoothing_applies_from_second_inference() {
        let mut fusion = ScoreFusion::from_config(&FocusConfig::default());
        let first = fusion.fuse(&focused(1.0), None).unwrap();
        assert_eq!(first.score, 100.0);

        let overload = ClassProbabilities::from_pairs([(FocusLabel::Overload, 1.0)]);
        let second = fusion.fuse(&overload, None).unwrap();
        assert_eq!(second.raw_score, 20.0);
        assert!((second.score - (0.9 * 20.0 + 0.1 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_convergence() {
        let lambda: f64 = 0.9;
        let mut fusion = ScoreFusion::from_config(&FocusConfig::default());
        let start = fusion.fuse(&focused(1.0), None).unwrap().score;

        let target_probs =
            ClassProbabilities::from_pairs([(FocusLabel::Bored, 0.6), (FocusLabel::Anxious, 0.4)]);
        let target = LabelBands::default().score(FocusLabel::Bored, 0.6);

        let iterations = (1e-3_f64.ln() / (1.0 - lambda).ln()).ceil() as usize;
        let mut score = start;
        for _ in 0..iterations {
            score = fusion.fuse(&target_probs, None).unwrap().score;
        }
        // Remaining gap shrinks by (1 - lambda) per step
        let gap = (score - target).abs() / (start - target).abs();
        assert!(gap <= 1e-3 + 1e-12, "relative gap {gap}");
    }

    #[test]
    fn test_smoothing_disabled() {
        let config = FocusConfig {
            enable_smoothing: false,
            ..Default::default()
        };
        let mut fusion = ScoreFusion::from_config(&config);
        fusion.fuse(&focused(1.0), None).unwrap();
        let overload = ClassProbabilities::from_pairs([(FocusLabel::Overload, 1.0)]);
        assert_eq!(fusion.fuse(&overload, None).unwrap().score, 20.0);
    }

    #[test]
    fn test_reset_forgets_previous() {
        let mut fusion = ScoreFusion::from_config(&FocusConfig::default());
        fusion.fuse(&focused(1.0), None).unwrap();
        assert!(fusion.previous_score().is_some());
        fusion.reset();
        assert!(fusion.previous_score().is_none());
    }

    #[test]
    fn test_malformed_output_rejected() {
        let mut fusion = ScoreFusion::from_config(&FocusConfig::default());
        assert!(fusion.fuse(&ClassProbabilities::new(), None).is_err());
        assert!(fusion.previous_score().is_none());
    }

    #[test]
    fn test_dual_modality_blend() {
        let params = DualModality::default();
        let config = FocusConfig {
            scoring: ScoringConfig::DualModality(params),
            ..Default::default()
        };
        let mut fusion = ScoreFusion::from_config(&config);
        assert_eq!(fusion.strategy_name(), "dual_modality");

        // Focused at 1.0 -> biosignal 1.0; behaviour 0.5
        let fused = fusion.fuse(&focused(1.0), Some(0.5)).unwrap();
        assert!((fused.raw_score - 80.0).abs() < 1e-9);
        assert_eq!(fused.level, Some(FocusLevel::High));

        // Separate smoothing factor (0.7)
        let overload = ClassProbabilities::from_pairs([(FocusLabel::Overload, 1.0)]);
        let fused = fusion.fuse(&overload, Some(0.0)).unwrap();
        // biosignal 0.2, behaviour 0 -> 12
        assert!((fused.raw_score - 12.0).abs() < 1e-9);
        assert!((fused.score - (0.7 * 12.0 + 0.3 * 80.0)).abs() < 1e-9);
        assert_eq!(fused.level, Some(FocusLevel::Low));
    }

    #[test]
    fn test_dual_modality_without_behavior() {
        let strategy = DualModalityStrategy {
            params: DualModality::default(),
            bands: LabelBands::default(),
        };
        let probs = focused(0.5);
        let input = FusionInput {
            probabilities: &probs,
            dominant: FocusLabel::Focused,
            confidence: 0.5,
            behavior_score: None,
        };
        assert!((strategy.raw_score(&input) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_levels() {
        let params = DualModality::default();
        assert_eq!(params.level_of(0.7), FocusLevel::High);
        assert_eq!(params.level_of(0.55), FocusLevel::Medium);
        assert_eq!(params.level_of(0.39), FocusLevel::Low);
        assert!((params.combine(0.5, 1.0) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_band_validation() {
        let mut bands = LabelBands::default();
        assert!(bands.validate().is_ok());
        bands.set(FocusLabel::Bored, ScoreBand::new(60.0, 50.0));
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_bands_json_partial_override() {
        let bands: LabelBands =
            serde_json::from_str(r#"{"focused": {"low": 60.0, "high": 90.0}}"#).unwrap();
        assert_eq!(bands.band(FocusLabel::Focused), ScoreBand::new(60.0, 90.0));
        assert_eq!(bands.band(FocusLabel::Bored), ScoreBand::new(30.0, 50.0));
    }
}
