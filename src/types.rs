//! Core types for the Synheart Focus pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: heart-rate samples, feature vectors, classifier probabilities and
//! the focus result handed to subscribers.

use crate::baseline::BaselineState;
use crate::error::{ClassifierError, FocusError};
use crate::features::{HRV24_FEATURE_NAMES, LEGACY6_FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single heart-rate reading from the wearable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Heart rate (beats per minute)
    #[serde(alias = "bpm")]
    pub heart_rate_bpm: f64,
    /// Accelerometer magnitude at the time of the reading (g)
    #[serde(default, alias = "motion")]
    pub motion_g: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, heart_rate_bpm: f64) -> Self {
        Self {
            timestamp,
            heart_rate_bpm,
            motion_g: 0.0,
        }
    }

    pub fn with_motion(mut self, motion_g: f64) -> Self {
        self.motion_g = motion_g;
        self
    }
}

/// Cognitive state labels known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLabel {
    #[serde(alias = "Focused")]
    Focused,
    #[serde(alias = "Bored")]
    Bored,
    #[serde(alias = "Anxious")]
    Anxious,
    #[serde(alias = "Overload")]
    Overload,
    #[serde(alias = "time pressure", alias = "TimePressure")]
    TimePressure,
    #[serde(alias = "Distracted")]
    Distracted,
}

impl FocusLabel {
    pub const COUNT: usize = 6;

    pub const ALL: [FocusLabel; FocusLabel::COUNT] = [
        FocusLabel::Focused,
        FocusLabel::Bored,
        FocusLabel::Anxious,
        FocusLabel::Overload,
        FocusLabel::TimePressure,
        FocusLabel::Distracted,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusLabel::Focused => "focused",
            FocusLabel::Bored => "bored",
            FocusLabel::Anxious => "anxious",
            FocusLabel::Overload => "overload",
            FocusLabel::TimePressure => "time_pressure",
            FocusLabel::Distracted => "distracted",
        }
    }
}

impl fmt::Display for FocusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FocusLabel {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "focused" => Ok(FocusLabel::Focused),
            "bored" => Ok(FocusLabel::Bored),
            "anxious" => Ok(FocusLabel::Anxious),
            "overload" => Ok(FocusLabel::Overload),
            "timepressure" => Ok(FocusLabel::TimePressure),
            "distracted" => Ok(FocusLabel::Distracted),
            _ => Err(FocusError::InvalidInput(format!("unknown label '{s}'"))),
        }
    }
}

/// Classifier output: one probability per known label
///
/// Labels the model does not emit stay at zero. Serialized as a
/// label → probability map containing the non-zero entries.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<FocusLabel, f64>",
    from = "BTreeMap<FocusLabel, f64>"
)]
pub struct ClassProbabilities {
    values: [f64; FocusLabel::COUNT],
}

impl ClassProbabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (FocusLabel, f64)>,
    {
        let mut probabilities = Self::new();
        for (label, p) in pairs {
            probabilities.set(label, p);
        }
        probabilities
    }

    pub fn set(&mut self, label: FocusLabel, probability: f64) {
        self.values[label.index()] = probability;
    }

    pub fn get(&self, label: FocusLabel) -> f64 {
        self.values[label.index()]
    }

    /// Non-zero entries in label order
    pub fn iter(&self) -> impl Iterator<Item = (FocusLabel, f64)> + '_ {
        FocusLabel::ALL
            .iter()
            .map(move |&label| (label, self.get(label)))
            .filter(|(_, p)| *p != 0.0)
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Arg-max label and its probability; ties resolve to label order
    pub fn dominant(&self) -> Option<(FocusLabel, f64)> {
        let mut best: Option<(FocusLabel, f64)> = None;
        for label in FocusLabel::ALL {
            let p = self.get(label);
            if p <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_p)) if best_p >= p => {}
                _ => best = Some((label, p)),
            }
        }
        best
    }

    /// Reject outputs that cannot be interpreted as a distribution
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if let Some(label) = FocusLabel::ALL
            .iter()
            .find(|l| !self.get(**l).is_finite() || self.get(**l) < 0.0)
        {
            return Err(ClassifierError::MalformedOutput(format!(
                "probability for '{}' is {}",
                label,
                self.get(*label)
            )));
        }
        if self.sum() <= 0.0 {
            return Err(ClassifierError::MalformedOutput(
                "all probabilities are zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<ClassProbabilities> for BTreeMap<FocusLabel, f64> {
    fn from(probabilities: ClassProbabilities) -> Self {
        probabilities.iter().collect()
    }
}

impl From<BTreeMap<FocusLabel, f64>> for ClassProbabilities {
    fn from(map: BTreeMap<FocusLabel, f64>) -> Self {
        ClassProbabilities::from_pairs(map)
    }
}

/// Feature layouts understood by the extractors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    /// 24 time, frequency and statistical HRV features
    Hrv24,
    /// Compact 6-feature layout for the secondary classifier path
    Legacy6,
}

impl FeatureSchema {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Hrv24 => &HRV24_FEATURE_NAMES,
            FeatureSchema::Legacy6 => &LEGACY6_FEATURE_NAMES,
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Resolve the schema whose ordered names match exactly
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        [FeatureSchema::Hrv24, FeatureSchema::Legacy6]
            .into_iter()
            .find(|schema| {
                schema.len() == names.len()
                    && schema
                        .names()
                        .iter()
                        .zip(names)
                        .all(|(expected, actual)| *expected == actual.as_ref())
            })
    }
}

/// Fixed-order feature values produced once per emitted window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema: FeatureSchema,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema: FeatureSchema, values: Vec<f64>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self { schema, values }
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.schema.names()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names()
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.names()
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }
}

/// Describes the model behind the classifier boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier
    pub id: String,
    /// Checksum of the model asset
    pub checksum: String,
    /// Ordered feature names the model expects
    pub feature_names: Vec<String>,
    /// Ordered class names the model emits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_names: Option<Vec<String>>,
}

impl ModelDescriptor {
    /// Descriptor for a model consuming the given schema in canonical order
    pub fn for_schema(id: &str, checksum: &str, schema: FeatureSchema) -> Self {
        Self {
            id: id.to_string(),
            checksum: checksum.to_string(),
            feature_names: schema.names().iter().map(|n| n.to_string()).collect(),
            class_names: None,
        }
    }

    pub fn with_class_names(mut self, labels: &[FocusLabel]) -> Self {
        self.class_names = Some(labels.iter().map(|l| l.as_str().to_string()).collect());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, FocusError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn schema(&self) -> Result<FeatureSchema, FocusError> {
        FeatureSchema::from_names(&self.feature_names).ok_or_else(|| {
            FocusError::InvalidInput(format!(
                "model '{}' expects {} features that match no known schema",
                self.id,
                self.feature_names.len()
            ))
        })
    }

    /// Parsed class labels, if the descriptor lists them
    pub fn class_labels(&self) -> Result<Option<Vec<FocusLabel>>, FocusError> {
        self.class_names
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|n| n.parse::<FocusLabel>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
    }
}

/// Coarse focus level reported by the dual-modality strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusLevel {
    High,
    Medium,
    Low,
}

/// Baseline-relative view of the current window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineContext {
    /// Window mean heart rate as a z-score against the subject baseline
    pub hr_z: f64,
    /// Window RMSSD as a z-score against the subject baseline
    pub hrv_z: f64,
    pub hr_state: BaselineState,
    pub hrv_state: BaselineState,
    /// Confidence in the baseline (0-1)
    pub confidence: f64,
}

/// Provenance attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub checksum: String,
    pub feature_schema: FeatureSchema,
    /// Name of the fusion strategy that produced the score
    pub strategy: String,
    pub engine_id: String,
    pub producer: String,
    pub version: String,
}

/// Snapshot emitted once per successful inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusResult {
    /// Timestamp of the latest sample in the window
    pub timestamp: DateTime<Utc>,
    pub dominant_label: FocusLabel,
    /// Smoothed focus score (0-100)
    pub focus_score: f64,
    /// Score before smoothing (0-100)
    pub raw_score: f64,
    /// Probability of the dominant label (0-1)
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
    pub features: FeatureVector,
    /// Signal quality of the window (0-1), diagnostic only
    pub quality_score: f64,
    /// Number of intervals that survived artifact rejection
    pub valid_intervals: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_level: Option<FocusLevel>,
    pub baseline: BaselineContext,
    pub model: ModelMetadata,
}
