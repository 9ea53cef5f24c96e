//! Per-subject adaptive baselines
//!
//! This module learns a subject's own mean and spread for heart rate and HRV so
//! windows can be interpreted relative to the person rather than the
//! population. Until enough data has been seen the population defaults apply.

use crate::error::FocusError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

/// Population heart-rate mean (bpm)
pub const POPULATION_HR_MEAN: f64 = 72.0;
/// Population heart-rate standard deviation (bpm)
pub const POPULATION_HR_STD: f64 = 12.0;
/// Population HRV mean (ms)
pub const POPULATION_HRV_MEAN: f64 = 45.0;
/// Population HRV standard deviation (ms)
pub const POPULATION_HRV_STD: f64 = 18.0;

/// Default number of buffered samples before personalization
pub const DEFAULT_MIN_SAMPLES: usize = 100;
/// Default hours between recalibrations
pub const DEFAULT_UPDATE_INTERVAL_HOURS: f64 = 24.0;

/// Hours after which the recency part of the confidence reaches zero
const CONFIDENCE_HORIZON_HOURS: f64 = 48.0;

/// Personalization progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineState {
    /// Population defaults, nothing buffered
    Population,
    /// Population defaults, collecting subject samples
    Personalizing,
    /// Learned subject statistics
    Personalized,
}

/// Persistable baseline statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std: f64,
    /// Samples absorbed since the last population reset
    pub sample_count: usize,
    /// When the statistics were last recomputed
    pub last_update: Option<DateTime<Utc>>,
}

impl BaselineStats {
    pub fn population(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std,
            sample_count: 0,
            last_update: None,
        }
    }
}

/// Mean/std tracker with population fallback and periodic recalibration
#[derive(Debug, Clone)]
pub struct AdaptiveBaseline {
    population: BaselineStats,
    stats: BaselineStats,
    state: BaselineState,
    buffer: VecDeque<f64>,
    first_buffered_at: Option<DateTime<Utc>>,
    min_samples: usize,
    update_interval: Duration,
}

impl AdaptiveBaseline {
    pub fn new(
        population_mean: f64,
        population_std: f64,
        min_samples: usize,
        update_interval: Duration,
    ) -> Self {
        let population = BaselineStats::population(population_mean, population_std);
        Self {
            population,
            stats: population,
            state: BaselineState::Population,
            buffer: VecDeque::with_capacity(min_samples),
            first_buffered_at: None,
            min_samples,
            update_interval,
        }
    }

    /// Heart-rate baseline with population defaults
    pub fn heart_rate(min_samples: usize, update_interval: Duration) -> Self {
        Self::new(
            POPULATION_HR_MEAN,
            POPULATION_HR_STD,
            min_samples,
            update_interval,
        )
    }

    /// HRV baseline with population defaults
    pub fn hrv(min_samples: usize, update_interval: Duration) -> Self {
        Self::new(
            POPULATION_HRV_MEAN,
            POPULATION_HRV_STD,
            min_samples,
            update_interval,
        )
    }

    /// Buffer a sample; returns true when it triggered a recalibration
    pub fn add_sample(&mut self, value: f64, at: DateTime<Utc>) -> bool {
        if !value.is_finite() {
            return false;
        }

        self.buffer.push_back(value);
        self.stats.sample_count += 1;
        self.first_buffered_at.get_or_insert(at);
        if self.state == BaselineState::Population {
            self.state = BaselineState::Personalizing;
        }

        let reference = self.stats.last_update.or(self.first_buffered_at);
        let elapsed_ok = reference.is_some_and(|r| at - r >= self.update_interval);
        // A spread needs two samples, whatever min_samples says
        if self.buffer.len() >= self.min_samples.max(2) && elapsed_ok {
            self.recalibrate(at);
            return true;
        }
        false
    }

    /// Recalibrate now, ignoring the update interval.
    ///
    /// Needs at least two buffered samples to estimate a spread.
    pub fn force_update(&mut self, at: DateTime<Utc>) -> bool {
        if self.buffer.len() < 2 {
            return false;
        }
        self.recalibrate(at);
        true
    }

    /// Forget everything learned and return to population defaults
    pub fn reset_to_population(&mut self) {
        self.stats = self.population;
        self.state = BaselineState::Population;
        self.buffer.clear();
        self.first_buffered_at = None;
    }

    /// Drop buffered samples but keep learned statistics
    pub fn clear_history(&mut self) {
        self.buffer.clear();
        self.first_buffered_at = None;
        if self.state == BaselineState::Personalizing {
            self.state = BaselineState::Population;
        }
    }

    /// Z-score against the current baseline; 0 when the spread is zero
    pub fn normalize(&self, value: f64) -> f64 {
        if self.stats.std == 0.0 || !self.stats.std.is_finite() {
            return 0.0;
        }
        (value - self.stats.mean) / self.stats.std
    }

    /// Confidence in the baseline (0-1) from data volume and recency
    pub fn confidence(&self, now: DateTime<Utc>) -> f64 {
        let volume = if self.min_samples == 0 {
            1.0
        } else {
            (self.stats.sample_count as f64 / (2.0 * self.min_samples as f64)).clamp(0.0, 1.0)
        };
        let recency = match self.stats.last_update {
            Some(last) => {
                let hours = (now - last).num_milliseconds() as f64 / 3_600_000.0;
                (1.0 - hours / CONFIDENCE_HORIZON_HOURS).clamp(0.0, 1.0)
            }
            None => 0.0,
        };
        0.7 * volume + 0.3 * recency
    }

    pub fn state(&self) -> BaselineState {
        self.state
    }

    pub fn mean(&self) -> f64 {
        self.stats.mean
    }

    pub fn std(&self) -> f64 {
        self.stats.std
    }

    pub fn sample_count(&self) -> usize {
        self.stats.sample_count
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.stats.last_update
    }

    pub fn snapshot(&self) -> BaselineStats {
        self.stats
    }

    /// Resume from persisted statistics
    pub fn restore(&mut self, stats: BaselineStats) {
        self.stats = stats;
        self.buffer.clear();
        self.first_buffered_at = None;
        self.state = if stats.last_update.is_some() {
            BaselineState::Personalized
        } else {
            BaselineState::Population
        };
    }

    fn recalibrate(&mut self, at: DateTime<Utc>) {
        let n = self.buffer.len() as f64;
        let mean = self.buffer.iter().sum::<f64>() / n;
        let var = self.buffer.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

        self.stats.mean = mean;
        self.stats.std = var.sqrt();
        self.stats.last_update = Some(at);

        let keep = self.min_samples / 2;
        while self.buffer.len() > keep {
            self.buffer.pop_front();
        }
        self.first_buffered_at = Some(at);

        if self.state != BaselineState::Personalized {
            info!(mean, std = self.stats.std, "baseline personalized");
        }
        self.state = BaselineState::Personalized;
    }
}

/// Persisted form of a subject's baselines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectBaselineSnapshot {
    pub hr: BaselineStats,
    pub hrv: BaselineStats,
}

/// Heart-rate and HRV baselines for one subject
#[derive(Debug, Clone)]
pub struct SubjectBaseline {
    pub hr: AdaptiveBaseline,
    pub hrv: AdaptiveBaseline,
}

impl Default for SubjectBaseline {
    fn default() -> Self {
        Self::new(
            DEFAULT_MIN_SAMPLES,
            Duration::milliseconds((DEFAULT_UPDATE_INTERVAL_HOURS * 3_600_000.0) as i64),
        )
    }
}

impl SubjectBaseline {
    pub fn new(min_samples: usize, update_interval: Duration) -> Self {
        Self {
            hr: AdaptiveBaseline::heart_rate(min_samples, update_interval),
            hrv: AdaptiveBaseline::hrv(min_samples, update_interval),
        }
    }

    /// Combined confidence; the weaker of the two baselines
    pub fn confidence(&self, now: DateTime<Utc>) -> f64 {
        self.hr.confidence(now).min(self.hrv.confidence(now))
    }

    pub fn force_update(&mut self, at: DateTime<Utc>) -> bool {
        let hr = self.hr.force_update(at);
        let hrv = self.hrv.force_update(at);
        hr || hrv
    }

    pub fn reset_to_population(&mut self) {
        self.hr.reset_to_population();
        self.hrv.reset_to_population();
    }

    pub fn clear_history(&mut self) {
        self.hr.clear_history();
        self.hrv.clear_history();
    }

    pub fn snapshot(&self) -> SubjectBaselineSnapshot {
        SubjectBaselineSnapshot {
            hr: self.hr.snapshot(),
            hrv: self.hrv.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: SubjectBaselineSnapshot) {
        self.hr.restore(snapshot.hr);
        self.hrv.restore(snapshot.hrv);
    }

    /// Load persisted baselines from JSON
    pub fn load_json(&mut self, json: &str) -> Result<(), FocusError> {
        let snapshot: SubjectBaselineSnapshot = serde_json::from_str(json)?;
        for stats in [snapshot.hr, snapshot.hrv] {
            if !stats.mean.is_finite() || !stats.std.is_finite() || stats.std < 0.0 {
                return Err(FocusError::InvalidInput(
                    "persisted baseline has non-finite or negative statistics".to_string(),
                ));
            }
        }
        self.restore(snapshot);
        Ok(())
    }

    /// Serialize baselines to JSON
    pub fn to_json(&self) -> Result<String, FocusError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}
