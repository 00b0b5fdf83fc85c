//! Descriptive statistics over plain value slices.

use crate::error::{Result, VizError};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Quantile with linear interpolation between closest ranks.
///
/// # Errors
///
/// `QuantileOutOfRange` when `q` is outside `[0, 1]`, `NoValidValues` for an
/// empty input.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(VizError::QuantileOutOfRange(q));
    }
    if values.is_empty() {
        return Err(VizError::NoValidValues("quantile input".to_string()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(quantile_sorted(&sorted, q))
}

pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Median, first and third quartile.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some((
        quantile_sorted(&sorted, 0.5),
        quantile_sorted(&sorted, 0.25),
        quantile_sorted(&sorted, 0.75),
    ))
}

/// Standardize to zero mean and unit sample deviation.
///
/// `None` when the deviation is zero or undefined.
pub fn zscore(values: &[f64]) -> Option<Vec<f64>> {
    let mean = mean(values)?;
    let std = sample_std(values);
    if std == 0.0 || !std.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}
