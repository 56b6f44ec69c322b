//! Tolerance aware floating point comparisons and the small statistics
//! helpers shared by the analytics layer.
//!
//! Every float comparison in the crate goes through these functions so that
//! tolerance handling lives in exactly one place.
use crate::configuration::CONFIGURATION;

/// The crate wide comparison tolerance
pub(crate) fn tolerance() -> f64 {
    CONFIGURATION.read().unwrap().tolerance
}

/// Whether `a` and `b` are equal within `tol`
pub(crate) fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Whether `a <= b` within `tol`
pub(crate) fn approx_le(a: f64, b: f64, tol: f64) -> bool {
    a <= b + tol
}

/// Whether `a >= b` within `tol`
pub(crate) fn approx_ge(a: f64, b: f64, tol: f64) -> bool {
    a + tol >= b
}

/// Arithmetic mean, 0.0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0.0 for an empty slice
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Interpolated percentile (`pct` in [0, 100]) of an unsorted slice.
///
/// Uses linear interpolation between the two nearest ranks, matching the
/// convention of the downstream Monte Carlo tooling.
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_respect_tolerance() {
        assert!(approx_eq(1.0, 1.0 + 1e-9, 1e-6));
        assert!(!approx_eq(1.0, 1.001, 1e-6));
        assert!(approx_le(1.0 + 1e-9, 1.0, 1e-6));
        assert!(!approx_le(1.1, 1.0, 1e-6));
        assert!(approx_ge(1.0 - 1e-9, 1.0, 1e-6));
    }

    #[test]
    fn basic_statistics() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(mean(&values), 2.5, 1e-12));
        assert!(approx_eq(std_dev(&values), (1.25f64).sqrt(), 1e-12));
        assert!(approx_eq(mean(&[]), 0.0, 1e-12));
    }

    #[test]
    fn percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!(approx_eq(percentile(&values, 0.0), 1.0, 1e-12));
        assert!(approx_eq(percentile(&values, 100.0), 4.0, 1e-12));
        assert!(approx_eq(percentile(&values, 50.0), 2.5, 1e-12));
        assert!(approx_eq(percentile(&values, 25.0), 1.75, 1e-12));
    }
}
