//! Frequency-domain HRV analysis
//!
//! Beat intervals are placed on their own cumulative time axis, linearly
//! resampled onto a uniform 4 Hz grid, mean-detrended, and turned into a
//! one-sided power spectral density with a single Hann-windowed segment.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Resampling rate of the interval series (Hz)
pub const RESAMPLE_HZ: f64 = 4.0;
/// Longest DFT segment
pub const MAX_SEGMENT_LEN: usize = 256;
/// Longest interval series that is resampled (seconds); longer input is degenerate
pub const MAX_RESAMPLE_SECS: f64 = 3600.0;

/// Very low frequency band (Hz), lower bound inclusive
pub const VLF_BAND: (f64, f64) = (0.003, 0.04);
/// Low frequency band (Hz)
pub const LF_BAND: (f64, f64) = (0.04, 0.15);
/// High frequency band (Hz)
pub const HF_BAND: (f64, f64) = (0.15, 0.40);
/// Ultra high frequency band (Hz)
pub const UHF_BAND: (f64, f64) = (0.40, 1.00);

/// Integrated power per band (ms²)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandPowers {
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
    pub uhf: f64,
}

impl BandPowers {
    /// Sum of the four bands
    pub fn total(&self) -> f64 {
        self.vlf + self.lf + self.hf + self.uhf
    }

    pub fn lf_hf_ratio(&self) -> f64 {
        if self.hf > 0.0 {
            self.lf / self.hf
        } else {
            0.0
        }
    }

    /// Share of total power in percent
    pub fn percent_of_total(&self, power: f64) -> f64 {
        let total = self.total();
        if total > 0.0 {
            power / total * 100.0
        } else {
            0.0
        }
    }

    /// LF / (LF + HF) in percent
    pub fn lf_normalized(&self) -> f64 {
        let denom = self.lf + self.hf;
        if denom > 0.0 {
            self.lf / denom * 100.0
        } else {
            0.0
        }
    }
}

/// Band powers of an interval sequence (ms); zero for degenerate input
pub fn band_powers(intervals_ms: &[f64]) -> BandPowers {
    let mut grid = resample_intervals(intervals_ms, RESAMPLE_HZ);
    if grid.is_empty() {
        return BandPowers::default();
    }

    let grid_mean = grid.iter().sum::<f64>() / grid.len() as f64;
    for value in grid.iter_mut() {
        *value -= grid_mean;
    }

    let (freqs, psd) = welch_single_segment(&grid, RESAMPLE_HZ);
    BandPowers {
        vlf: integrate_band(&freqs, &psd, VLF_BAND),
        lf: integrate_band(&freqs, &psd, LF_BAND),
        hf: integrate_band(&freqs, &psd, HF_BAND),
        uhf: integrate_band(&freqs, &psd, UHF_BAND),
    }
}

/// Linearly interpolate intervals onto a uniform grid over `[0, t_last)`.
///
/// The time axis is cumulative: `t[0] = 0`, `t[i] = t[i-1] + interval[i-1]`.
pub fn resample_intervals(intervals_ms: &[f64], fs: f64) -> Vec<f64> {
    if intervals_ms.len() < 2 || fs <= 0.0 {
        return Vec::new();
    }

    let mut times = Vec::with_capacity(intervals_ms.len());
    let mut t = 0.0;
    for interval in intervals_ms {
        times.push(t);
        t += interval / 1000.0;
    }
    let t_last = times[times.len() - 1];
    if !(t_last > 0.0) || !t_last.is_finite() || t_last > MAX_RESAMPLE_SECS {
        return Vec::new();
    }

    let mut grid = Vec::with_capacity((t_last * fs).ceil() as usize);
    let mut segment = 0;
    let mut k = 0usize;
    loop {
        let g = k as f64 / fs;
        if g >= t_last {
            break;
        }
        while segment + 2 < times.len() && times[segment + 1] <= g {
            segment += 1;
        }
        let (t0, t1) = (times[segment], times[segment + 1]);
        let (v0, v1) = (intervals_ms[segment], intervals_ms[segment + 1]);
        let value = if t1 > t0 {
            v0 + (v1 - v0) * (g - t0) / (t1 - t0)
        } else {
            v0
        };
        grid.push(value);
        k += 1;
    }
    grid
}

/// One-sided PSD from a single periodic-Hann segment of `min(256, n)` samples,
/// density-scaled by the sampling frequency.
pub fn welch_single_segment(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len().min(MAX_SEGMENT_LEN);
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let window = hann_periodic(n);
    let window_energy: f64 = window.iter().map(|w| w * w).sum();
    let n_freqs = n / 2 + 1;
    let freqs: Vec<f64> = (0..n_freqs).map(|k| k as f64 * fs / n as f64).collect();
    if window_energy <= 0.0 {
        return (freqs, vec![0.0; n_freqs]);
    }

    let mut buffer: Vec<Complex<f64>> = signal[..n]
        .iter()
        .zip(&window)
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let scale = 1.0 / (fs * window_energy);
    let psd = buffer[..n_freqs]
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let power = c.norm_sqr() * scale;
            let is_nyquist = n % 2 == 0 && k == n / 2;
            if k == 0 || is_nyquist {
                power
            } else {
                2.0 * power
            }
        })
        .collect();
    (freqs, psd)
}

/// Trapezoidal integral of the PSD over bins with `low <= f < high`
pub fn integrate_band(freqs: &[f64], psd: &[f64], (low, high): (f64, f64)) -> f64 {
    let in_band: Vec<(f64, f64)> = freqs
        .iter()
        .zip(psd)
        .filter(|(f, _)| **f >= low && **f < high)
        .map(|(f, p)| (*f, *p))
        .collect();

    in_band
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum()
}

fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_constant_intervals() {
        let grid = resample_intervals(&[1000.0, 1000.0, 1000.0], RESAMPLE_HZ);
        // t_last = 2 s, grid covers [0, 2) at 4 Hz
        assert_eq!(grid.len(), 8);
        assert!(grid.iter().all(|v| (*v - 1000.0).abs() < 1e-12));
    }

    #[test]
    fn test_resample_interpolates() {
        let grid = resample_intervals(&[1000.0, 2000.0, 1000.0], RESAMPLE_HZ);
        // t = [0, 1, 3]; grid point 0.5 s lies halfway between the first two
        assert!((grid[2] - 1500.0).abs() < 1e-9);
        // 2 s lies halfway between t=1 (2000) and t=3 (1000)
        assert!((grid[8] - 1500.0).abs() < 1e-9);
        assert_eq!(grid.len(), 12);
    }

    #[test]
    fn test_resample_degenerate() {
        assert!(resample_intervals(&[], RESAMPLE_HZ).is_empty());
        assert!(resample_intervals(&[800.0], RESAMPLE_HZ).is_empty());
        assert!(resample_intervals(&[0.0, 0.0, 0.0], RESAMPLE_HZ).is_empty());
    }

    #[test]
    fn test_resample_rejects_oversized_span() {
        assert!(resample_intervals(&[1e15, 1e15], RESAMPLE_HZ).is_empty());
        assert!(resample_intervals(&[f64::MAX, 1.0], RESAMPLE_HZ).is_empty());

        let powers = band_powers(&[1e15, 1e15, 1e15]);
        assert_eq!(powers, BandPowers::default());

        // One hour of 1 s intervals is still resampled
        let grid = resample_intervals(&vec![1000.0; 3601], RESAMPLE_HZ);
        assert_eq!(grid.len(), 14_400);
    }

    #[test]
    fn test_sine_power_lands_in_hf() {
        // 0.25 Hz sine sampled at 4 Hz falls exactly on bin 16 of 256
        let amplitude = 50.0;
        let signal: Vec<f64> = (0..256)
            .map(|i| amplitude * (2.0 * PI * 0.25 * i as f64 / RESAMPLE_HZ).sin())
            .collect();
        let (freqs, psd) = welch_single_segment(&signal, RESAMPLE_HZ);
        assert_eq!(freqs.len(), 129);

        let hf = integrate_band(&freqs, &psd, HF_BAND);
        let lf = integrate_band(&freqs, &psd, LF_BAND);
        let expected = amplitude * amplitude / 2.0;
        assert!((hf - expected).abs() / expected < 0.1, "hf = {hf}");
        assert!(lf < hf * 1e-6);
    }

    #[test]
    fn test_band_partition_matches_total() {
        let intervals: Vec<f64> = (0..120)
            .map(|i| {
                let t = i as f64;
                850.0 + 40.0 * (t * 0.9).sin() + 25.0 * (t * 0.21).cos()
            })
            .collect();
        let powers = band_powers(&intervals);
        let sum = powers.vlf + powers.lf + powers.hf + powers.uhf;
        assert!((powers.total() - sum).abs() < 1e-9);
        assert!(powers.total() > 0.0);

        let pct_sum = powers.percent_of_total(powers.vlf)
            + powers.percent_of_total(powers.lf)
            + powers.percent_of_total(powers.hf)
            + powers.percent_of_total(powers.uhf);
        assert!((pct_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_has_no_power() {
        let powers = band_powers(&vec![857.0; 60]);
        assert_eq!(powers.total(), 0.0);
        assert_eq!(powers.lf_hf_ratio(), 0.0);
        assert_eq!(powers.lf_normalized(), 0.0);
    }

    #[test]
    fn test_integrate_band_needs_two_bins() {
        let freqs = [0.0, 0.1, 0.2];
        let psd = [1.0, 1.0, 1.0];
        assert_eq!(integrate_band(&freqs, &psd, (0.05, 0.15)), 0.0);
        assert!((integrate_band(&freqs, &psd, (0.0, 0.25)) - 0.2).abs() < 1e-12);
    }
}
