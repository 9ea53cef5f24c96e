//! Artifact rejection
//!
//! Removes physiologically implausible or motion-corrupted beat intervals and
//! scores window quality. Rejection never fails: an empty output means no
//! inference for this cycle.

use crate::features::stats::sample_std;
use serde::{Deserialize, Serialize};

/// Shortest plausible beat interval (ms), 200 bpm
pub const MIN_INTERVAL_MS: f64 = 300.0;
/// Longest plausible beat interval (ms), 30 bpm
pub const MAX_INTERVAL_MS: f64 = 2000.0;
/// Largest accepted jump between consecutive kept intervals (ms)
pub const MAX_SUCCESSIVE_DIFF_MS: f64 = 250.0;

/// Convert a heart rate to its beat interval in milliseconds
pub fn bpm_to_interval_ms(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// Interval bounds used to reject artifacts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactFilter {
    pub min_interval_ms: f64,
    pub max_interval_ms: f64,
    pub max_successive_diff_ms: f64,
}

impl Default for ArtifactFilter {
    fn default() -> Self {
        Self {
            min_interval_ms: MIN_INTERVAL_MS,
            max_interval_ms: MAX_INTERVAL_MS,
            max_successive_diff_ms: MAX_SUCCESSIVE_DIFF_MS,
        }
    }
}

impl ArtifactFilter {
    /// Keep the intervals that survive bound and jump checks.
    ///
    /// The whole window is discarded when motion exceeds the threshold. The
    /// first interval is only bound-checked; later ones are compared against
    /// the previously kept interval.
    pub fn filter(&self, intervals: &[f64], motion_g: f64, motion_threshold_g: f64) -> Vec<f64> {
        if exceeds_motion(motion_g, motion_threshold_g) {
            return Vec::new();
        }

        let mut kept: Vec<f64> = Vec::with_capacity(intervals.len());
        for &interval in intervals {
            if !self.in_bounds(interval) {
                continue;
            }
            if let Some(&previous) = kept.last() {
                if (interval - previous).abs() > self.max_successive_diff_ms {
                    continue;
                }
            }
            kept.push(interval);
        }
        kept
    }

    /// Diagnostic quality of a window (0-1).
    ///
    /// Weighted blend of motion headroom (0.4), physiologically valid
    /// fraction (0.4) and successive-difference stability (0.2).
    pub fn quality_score(&self, intervals: &[f64], motion_g: f64, motion_threshold_g: f64) -> f64 {
        let motion_term = if motion_threshold_g > 0.0 && motion_g.is_finite() {
            (1.0 - motion_g / motion_threshold_g).clamp(0.0, 1.0)
        } else if motion_g <= 0.0 {
            1.0
        } else {
            0.0
        };

        let valid_fraction = if intervals.is_empty() {
            0.0
        } else {
            let valid = intervals.iter().filter(|v| self.in_bounds(**v)).count();
            valid as f64 / intervals.len() as f64
        };

        let abs_diffs: Vec<f64> = intervals
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .filter(|d| d.is_finite())
            .collect();
        let stability = 1.0 / (1.0 + sample_std(&abs_diffs) / 100.0);

        (0.4 * motion_term + 0.4 * valid_fraction + 0.2 * stability).clamp(0.0, 1.0)
    }

    fn in_bounds(&self, interval: f64) -> bool {
        interval.is_finite() && interval >= self.min_interval_ms && interval <= self.max_interval_ms
    }
}

fn exceeds_motion(motion_g: f64, motion_threshold_g: f64) -> bool {
    !motion_g.is_finite() || motion_g > motion_threshold_g
}
