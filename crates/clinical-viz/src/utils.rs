//! Shared helpers for number formatting and float housekeeping.
//!
//! Labels and statistic strings must look the way a JSON consumer prints
//! numbers (`30`, `2.5`), not the way `{:?}` prints an `f64` (`30.0`).

// =============================================================================
// Number Formatting
// =============================================================================

/// Format a number the way a JSON/JS runtime prints it: integral values
/// without a fractional part, everything else in shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Format with exactly `decimals` digits after the point.
pub fn format_fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

/// Format a bin edge: integral edges verbatim, fractional edges to 2 decimals.
pub fn format_edge(value: f64) -> String {
    if value.fract() != 0.0 {
        format_fixed(value, 2)
    } else {
        format_number(value)
    }
}

/// Quote a column name for use inside a renderer expression (`datum["a.b"]`).
pub fn datum_ref(field: &str) -> String {
    let quoted = serde_json::to_string(field).unwrap_or_else(|_| format!("\"{}\"", field));
    format!("datum[{}]", quoted)
}

// =============================================================================
// Float Utilities
// =============================================================================

/// Round to 10 decimals so accumulated edges like `0.30000000000000004`
/// compare and print as `0.3`.
#[inline]
pub fn snap(value: f64) -> f64 {
    let snapped = (value * 1e10).round() / 1e10;
    if snapped == 0.0 { 0.0 } else { snapped }
}

/// Min-max normalize in place. A flat input (max == min) becomes all zeros.
pub fn normalize_min_max(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    values.iter_mut().for_each(|v| *v = (*v - min) / range);
}

/// Evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
            values[num - 1] = end;
            values
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
