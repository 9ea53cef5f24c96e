//! Descriptive statistics over interval sequences
//!
//! Degenerate inputs (too short, zero spread) yield 0 rather than NaN.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1 denominator)
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Successive differences `x[i+1] - x[i]`
pub fn successive_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Root mean square of successive differences
pub fn rmssd(values: &[f64]) -> f64 {
    let diffs = successive_diffs(values);
    if diffs.is_empty() {
        return 0.0;
    }
    (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Interquartile range from truncated-index quartiles.
///
/// Q1 is `sorted[n / 4]` and Q3 is `sorted[3n / 4]`, without interpolation.
pub fn iqr_truncated(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[(3 * n / 4).min(n - 1)];
    q3 - q1
}

/// Population central moments `(variance, m3, m4)`
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let m = mean(values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Third standardized moment
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (var, m3, _) = central_moments(values);
    if var <= f64::EPSILON {
        return 0.0;
    }
    m3 / var.powf(1.5)
}

/// Fourth standardized moment minus 3
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (var, _, m4) = central_moments(values);
    if var <= f64::EPSILON {
        return 0.0;
    }
    m4 / (var * var) - 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Population std is 2; sample std is sqrt(32/7)
        assert!((sample_std(&values) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[5.0]), 0.0);
    }

    #[test]
    fn test_rmssd() {
        let values = [800.0, 810.0, 790.0, 800.0];
        // diffs 10, -20, 10
        let expected = ((100.0 + 400.0 + 100.0) / 3.0_f64).sqrt();
        assert!((rmssd(&values) - expected).abs() < 1e-12);
        assert_eq!(rmssd(&[800.0]), 0.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_iqr_truncated_index() {
        // n = 8: Q1 = sorted[2] = 3, Q3 = sorted[6] = 7
        let values = [8.0, 1.0, 7.0, 2.0, 6.0, 3.0, 5.0, 4.0];
        assert_eq!(iqr_truncated(&values), 4.0);

        // n = 5: Q1 = sorted[1] = 20, Q3 = sorted[3] = 40 (interpolation would differ)
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(iqr_truncated(&values), 20.0);

        assert_eq!(iqr_truncated(&[42.0]), 0.0);
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).abs() < 1e-12);
        // Uniform-like five points: m4/var^2 = 6.8/4 = 1.7
        assert!((excess_kurtosis(&symmetric) - (1.7 - 3.0)).abs() < 1e-12);

        let right_tail = [1.0, 1.0, 1.0, 1.0, 10.0];
        assert!(skewness(&right_tail) > 1.0);
    }

    #[test]
    fn test_constant_moments_are_zero() {
        let constant = [857.0; 12];
        assert_eq!(skewness(&constant), 0.0);
        assert_eq!(excess_kurtosis(&constant), 0.0);
        assert_eq!(sample_std(&constant), 0.0);
    }
}
