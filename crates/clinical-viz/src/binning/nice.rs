//! Nice-number step selection and bin edge construction.

use crate::config::BinningConfig;
use crate::utils::snap;

/// Tolerance used when a quotient should land exactly on an integer.
const EDGE_EPSILON: f64 = 1e-9;

/// Raw step for `[min, max]`, optionally rounded to a nice number.
pub(crate) fn compute_step(min: f64, max: f64, config: &BinningConfig) -> f64 {
    let span = max - min;
    let base = f64::from(config.base);
    let mut step = config.min_step.max(span / config.max_bins as f64);

    if span > 0.0 {
        while span < step {
            step /= base;
        }
    }

    if config.nice {
        nice_step(step, base, &config.candidate_divisors)
    } else {
        step
    }
}

/// Smallest `d * base^k` (d from `divisors`) that is at least `step`, where
/// `base^k <= step < base^(k+1)`. Falls back to `base^(k+1)` when no divisor
/// reaches the step at that power.
pub(crate) fn nice_step(step: f64, base: f64, divisors: &[f64]) -> f64 {
    let mut power = step.log(base).floor() as i32;
    // log() can land one ulp off on exact powers
    if base.powi(power + 1) <= step {
        power += 1;
    } else if base.powi(power) > step {
        power -= 1;
    }

    let base_power = base.powi(power);
    let tolerance = step * 1e-12;

    divisors
        .iter()
        .map(|divisor| snap_relative(divisor * base_power))
        .filter(|candidate| *candidate >= step - tolerance)
        .fold(None, |best: Option<f64>, candidate| {
            Some(best.map_or(candidate, |b| b.min(candidate)))
        })
        .unwrap_or_else(|| snap_relative(base.powi(power + 1)))
}

/// Rounds products like `5 * 0.1` to the nearest representable decimal.
fn snap_relative(value: f64) -> f64 {
    if value >= 1e-6 { snap(value) } else { value }
}

/// Edges from `floor(min/step)*step` to `floor(max/step)*step + step`.
pub(crate) fn bin_edges(min: f64, max: f64, step: f64) -> Vec<f64> {
    let start = (min / step + EDGE_EPSILON).floor() * step;
    let end = (max / step + EDGE_EPSILON).floor() * step + step;
    let count = ((end - start) / step).round() as usize + 1;

    (0..count)
        .map(|i| snap(start + i as f64 * step))
        .collect()
}

/// Index of the first edge strictly greater than `value`, clamped to 1 so a
/// bin always has a lower edge. `None` when no edge covers the value.
pub(crate) fn edge_position(edges: &[f64], value: f64) -> Option<usize> {
    edges
        .iter()
        .position(|edge| value < *edge)
        .map(|position| position.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_nice_step_rounds_up() {
        let divisors = [5.0, 2.0, 1.0];
        assert_eq!(nice_step(3.0, 10.0, &divisors), 5.0);
        assert_eq!(nice_step(1.5, 10.0, &divisors), 2.0);
        assert_eq!(nice_step(12.0, 10.0, &divisors), 20.0);
        assert_eq!(nice_step(42.0, 10.0, &divisors), 50.0);
    }

    #[test]
    fn test_nice_step_escalates_to_next_power() {
        let divisors = [5.0, 2.0, 1.0];
        assert_eq!(nice_step(9.7, 10.0, &divisors), 10.0);
        assert_eq!(nice_step(6.0, 10.0, &divisors), 10.0);
        assert_eq!(nice_step(51.0, 10.0, &divisors), 100.0);
    }

    #[test]
    fn test_nice_step_exact_power_boundaries() {
        let divisors = [5.0, 2.0, 1.0];
        assert_eq!(nice_step(1.0, 10.0, &divisors), 1.0);
        assert_eq!(nice_step(10.0, 10.0, &divisors), 10.0);
        assert_eq!(nice_step(100.0, 10.0, &divisors), 100.0);
        assert_eq!(nice_step(2.0, 10.0, &divisors), 2.0);
        assert_eq!(nice_step(5.0, 10.0, &divisors), 5.0);
    }

    #[test]
    fn test_nice_step_below_one() {
        let divisors = [5.0, 2.0, 1.0];
        assert!(approx(nice_step(0.3, 10.0, &divisors), 0.5));
        assert!(approx(nice_step(0.15, 10.0, &divisors), 0.2));
        assert!(approx(nice_step(0.1, 10.0, &divisors), 0.1));
    }

    #[test]
    fn test_nice_step_other_base() {
        assert_eq!(nice_step(3.0, 2.0, &[1.0]), 4.0);
        assert_eq!(nice_step(4.0, 2.0, &[1.0]), 4.0);
    }

    #[test]
    fn test_compute_step_extent_0_97() {
        let config = BinningConfig::default();
        assert_eq!(compute_step(0.0, 97.0, &config), 10.0);
    }

    #[test]
    fn test_compute_step_small_span_shrinks_below_min_step() {
        let config = BinningConfig::default();
        // span 0.9 < minStep 1, so the raw step is divided down to 0.1
        assert!(approx(compute_step(0.1, 1.0, &config), 0.1));
    }

    #[test]
    fn test_compute_step_without_nice() {
        let config = BinningConfig {
            nice: false,
            ..BinningConfig::default()
        };
        assert_eq!(compute_step(0.0, 97.0, &config), 9.7);
    }

    #[test]
    fn test_bin_edges() {
        let edges = bin_edges(0.0, 97.0, 10.0);
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[10], 100.0);

        let edges = bin_edges(0.3, 0.9, 0.1);
        assert_eq!(edges, vec![0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]);
    }

    #[test]
    fn test_edge_position() {
        let edges = vec![0.0, 10.0, 20.0];
        assert_eq!(edge_position(&edges, 0.0), Some(1));
        assert_eq!(edge_position(&edges, 9.99), Some(1));
        assert_eq!(edge_position(&edges, 10.0), Some(2));
        assert_eq!(edge_position(&edges, -1.0), Some(1));
        assert_eq!(edge_position(&edges, 20.0), None);
    }
}
