//! Signal pipeline
//!
//! This module runs everything up to the classifier boundary. Each accepted
//! heart-rate sample flows through:
//! 1. TimeSeriesWindow - buffer and hop cadence
//! 2. ArtifactFilter - reject implausible or motion-corrupted intervals
//! 3. SubjectBaseline - per-subject normalization context
//! 4. Feature extraction - 24 or 6 features depending on the model schema

use crate::artifact::{bpm_to_interval_ms, ArtifactFilter};
use crate::baseline::SubjectBaseline;
use crate::config::FocusConfig;
use crate::error::FocusError;
use crate::features::{self, stats};
use crate::types::{BaselineContext, FeatureSchema, FeatureVector, Sample};
use crate::window::TimeSeriesWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cadence state of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No samples yet
    Idle,
    /// Buffering until the stream spans a full window
    Collecting,
    /// Emitting on every hop
    Ready,
}

/// A window that is ready for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedCycle {
    /// Latest sample timestamp in the window
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub quality_score: f64,
    /// Intervals that survived artifact rejection
    pub valid_intervals: usize,
    /// Intervals in the window before rejection
    pub total_intervals: usize,
    pub mean_heart_rate_bpm: f64,
    pub rmssd_ms: f64,
    pub baseline: BaselineContext,
}

/// Stateful window → filter → baseline → features pipeline
#[derive(Debug, Clone)]
pub struct SignalPipeline {
    config: FocusConfig,
    schema: FeatureSchema,
    window: TimeSeriesWindow<Sample>,
    filter: ArtifactFilter,
    baseline: SubjectBaseline,
}

impl SignalPipeline {
    pub fn new(config: FocusConfig, schema: FeatureSchema) -> Result<Self, FocusError> {
        config.validate()?;
        Ok(Self {
            window: TimeSeriesWindow::new(config.window_duration(), config.hop_duration()),
            filter: config.artifact,
            baseline: SubjectBaseline::new(
                config.baseline_min_samples,
                config.baseline_update_interval(),
            ),
            schema,
            config,
        })
    }

    /// Check a sample against the ingestion bounds
    pub fn validate_sample(&self, sample: &Sample) -> Result<(), FocusError> {
        let bpm = sample.heart_rate_bpm;
        if !bpm.is_finite()
            || bpm < self.config.min_heart_rate_bpm
            || bpm > self.config.max_heart_rate_bpm
        {
            return Err(FocusError::InvalidInput(format!(
                "heart rate {bpm} bpm outside [{}, {}]",
                self.config.min_heart_rate_bpm, self.config.max_heart_rate_bpm
            )));
        }
        if !sample.motion_g.is_finite() || sample.motion_g < 0.0 {
            return Err(FocusError::InvalidInput(format!(
                "motion magnitude {} g is not a finite non-negative number",
                sample.motion_g
            )));
        }
        Ok(())
    }

    /// Ingest a sample and return a prepared cycle when the cadence fires and
    /// enough intervals survive artifact rejection.
    ///
    /// Invalid samples are rejected without touching any state.
    pub fn push(&mut self, sample: Sample) -> Result<Option<PreparedCycle>, FocusError> {
        self.validate_sample(&sample)?;

        let hr_state = self.baseline.hr.state();
        self.baseline.hr.add_sample(sample.heart_rate_bpm, sample.timestamp);
        if hr_state != self.baseline.hr.state() {
            info!(state = ?self.baseline.hr.state(), "heart-rate baseline state changed");
        }

        let Some(snapshot) = self.window.push(sample.timestamp, sample) else {
            return Ok(None);
        };

        let intervals: Vec<f64> = snapshot
            .values()
            .map(|s| bpm_to_interval_ms(s.heart_rate_bpm))
            .collect();
        let motion_g = snapshot.latest().map(|s| s.motion_g).unwrap_or(0.0);
        let threshold = self.config.motion_threshold_g;

        let quality_score = self.filter.quality_score(&intervals, motion_g, threshold);
        let kept = self.filter.filter(&intervals, motion_g, threshold);

        if kept.len() < self.config.min_valid_samples {
            debug!(
                kept = kept.len(),
                total = intervals.len(),
                motion_g,
                "skipping cycle: not enough valid intervals"
            );
            return Ok(None);
        }

        let features = match features::extract(self.schema, &kept) {
            Ok(features) => features,
            Err(FocusError::InsufficientData(reason)) => {
                debug!(%reason, "skipping cycle");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let heart_rates: Vec<f64> = kept.iter().map(|ibi| 60_000.0 / ibi).collect();
        let mean_heart_rate_bpm = stats::mean(&heart_rates);
        let rmssd_ms = stats::rmssd(&kept);

        let baseline = BaselineContext {
            hr_z: self.baseline.hr.normalize(mean_heart_rate_bpm),
            hrv_z: self.baseline.hrv.normalize(rmssd_ms),
            hr_state: self.baseline.hr.state(),
            hrv_state: self.baseline.hrv.state(),
            confidence: self.baseline.confidence(snapshot.end),
        };

        Ok(Some(PreparedCycle {
            timestamp: snapshot.end,
            features,
            quality_score,
            valid_intervals: kept.len(),
            total_intervals: intervals.len(),
            mean_heart_rate_bpm,
            rmssd_ms,
            baseline,
        }))
    }

    /// Feed a classified cycle's HRV into the subject baseline
    pub fn commit(&mut self, cycle: &PreparedCycle) {
        let hrv_state = self.baseline.hrv.state();
        self.baseline.hrv.add_sample(cycle.rmssd_ms, cycle.timestamp);
        if hrv_state != self.baseline.hrv.state() {
            info!(state = ?self.baseline.hrv.state(), "HRV baseline state changed");
        }
    }

    pub fn state(&self) -> EngineState {
        if self.window.is_primed() {
            EngineState::Ready
        } else if self.window.first_timestamp().is_some() {
            EngineState::Collecting
        } else {
            EngineState::Idle
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn baseline(&self) -> &SubjectBaseline {
        &self.baseline
    }

    pub fn baseline_mut(&mut self) -> &mut SubjectBaseline {
        &mut self.baseline
    }

    pub fn buffered_samples(&self) -> usize {
        self.window.len()
    }

    /// Clear the window and baseline sample history; learned baselines stay
    pub fn reset(&mut self) {
        self.window.reset();
        self.baseline.clear_history();
    }
}
