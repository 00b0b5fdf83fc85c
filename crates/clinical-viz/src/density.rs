//! Inverse-distance 2D density maps with outcome correction.
//!
//! For each cell of an `n x n` grid over the embedding plane the estimator
//! sums `1 / (d^2 + fudge)` over all points (overall density) and over the
//! positive-outcome points (positive density). The corrected density is
//! their ratio, which approximates the local positive rate independent of
//! how densely the region is sampled.

use tracing::debug;

use crate::config::DensityConfig;
use crate::error::{Result, VizError};
use crate::types::{CellValue, DensityCell, DensityGrid, Dataset, cell};
use crate::utils::{format_number, linspace, normalize_min_max};

/// Embedding coordinates are divided by this before estimation.
pub const COORDINATE_SCALE: f64 = 1000.0;

/// Outcomes with fewer distinct values than this are compared by equality.
const CATEGORICAL_OUTCOME_LEVELS: usize = 5;

/// Threshold used when the positive value cannot be read as a number.
const DEFAULT_THRESHOLD: f64 = 50.0;

/// Outcomes with fewer distinct values than this default to their first value.
const LOW_CARDINALITY_LEVELS: usize = 10;

/// How outcome values are turned into 0/1.
#[derive(Debug, Clone, PartialEq)]
enum OutcomeRule {
    Equals(f64),
    EqualsText(String),
    Above(f64),
}

impl OutcomeRule {
    fn from_outcome(dataset: &Dataset, outcome: &str, true_value: Option<&str>) -> Self {
        let levels = dataset.distinct_values(outcome);
        let threshold = true_value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_THRESHOLD);

        if levels.len() >= CATEGORICAL_OUTCOME_LEVELS {
            return OutcomeRule::Above(threshold);
        }

        let has_text = levels.iter().any(|v| matches!(v, CellValue::Text(_)));
        match true_value {
            Some(text) if has_text => OutcomeRule::EqualsText(text.to_string()),
            _ => OutcomeRule::Equals(threshold),
        }
    }

    fn is_positive(&self, value: &CellValue) -> bool {
        match (self, value) {
            (OutcomeRule::Equals(target), CellValue::Number(v)) => v == target,
            (OutcomeRule::EqualsText(target), CellValue::Text(v)) => v == target,
            (OutcomeRule::Above(threshold), CellValue::Number(v)) => v > threshold,
            _ => false,
        }
    }
}

/// Point coordinates (already rescaled) and their binarized outcome.
struct Points {
    x: Vec<f64>,
    y: Vec<f64>,
    positive: Vec<bool>,
}

/// Extent of the grid along one axis.
#[derive(Debug, Clone, Copy)]
struct Axis {
    min: f64,
    max: f64,
}

impl Axis {
    fn of(values: &[f64]) -> Self {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Self { min, max }
    }

    /// Center of pixel `index` on a grid of `pixels` cells.
    fn center(&self, index: usize, pixels: usize) -> f64 {
        let delta = (self.max - self.min) / pixels as f64;
        self.min + index as f64 * delta + delta / 2.0
    }
}

/// Builds density grids over a pair of coordinate columns.
pub struct DensityMapEstimator;

impl DensityMapEstimator {
    /// Estimate the density grid of `(x, y)` conditioned on `outcome`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty dataset, `ColumnNotFound` for an unknown
    /// column, `NoValidValues` when no row has numeric coordinates.
    pub fn estimate(
        dataset: &Dataset,
        x: &str,
        y: &str,
        outcome: &str,
        config: &DensityConfig,
    ) -> Result<DensityGrid> {
        config.validate()?;
        dataset.ensure_not_empty()?;
        for column in [x, y, outcome] {
            dataset.require_column(column)?;
        }

        let rule = OutcomeRule::from_outcome(dataset, outcome, config.true_value.as_deref());
        let points = Self::collect_points(dataset, x, y, outcome, &rule);
        if points.x.is_empty() {
            return Err(VizError::NoValidValues(format!("{} / {}", x, y)));
        }

        let n = config.pixels;
        let fudge = 10f64.powf(config.bandwidth - 20.0);
        let x_axis = Axis::of(&points.x);
        let y_axis = Axis::of(&points.y);

        debug!(
            x,
            y,
            outcome,
            points = points.x.len(),
            positives = points.positive.iter().filter(|p| **p).count(),
            ?rule,
            fudge,
            "Estimating density map"
        );

        let (overall, positive) = Self::fill(&points, x_axis, y_axis, n, fudge);

        let mut corrected: Vec<f64> = positive
            .iter()
            .zip(&overall)
            .map(|(p, o)| if *o > 0.0 { p / o } else { 0.0 })
            .collect();

        let mut norm_overall = overall;
        let mut norm_positive = positive;
        normalize_min_max(&mut norm_overall);
        normalize_min_max(&mut norm_positive);
        normalize_min_max(&mut corrected);

        let xs = linspace(x_axis.min, x_axis.max, n);
        let ys = linspace(y_axis.min, y_axis.max, n);

        let mut cells = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let index = i * n + j;
                cells.push(DensityCell {
                    x: xs[j],
                    y: ys[n - 1 - i],
                    norm_density: norm_overall[index],
                    norm_density_positive: norm_positive[index],
                    corrected_density: corrected[index],
                });
            }
        }

        Ok(DensityGrid { size: n, cells })
    }

    fn collect_points(
        dataset: &Dataset,
        x: &str,
        y: &str,
        outcome: &str,
        rule: &OutcomeRule,
    ) -> Points {
        let mut points = Points {
            x: Vec::new(),
            y: Vec::new(),
            positive: Vec::new(),
        };
        for row in dataset.iter() {
            if let (Some(px), Some(py)) = (cell(row, x).as_f64(), cell(row, y).as_f64()) {
                points.x.push(px / COORDINATE_SCALE);
                points.y.push(py / COORDINATE_SCALE);
                points.positive.push(rule.is_positive(cell(row, outcome)));
            }
        }
        points
    }

    /// Raw overall and positive inverse-distance sums, row-major.
    fn fill(points: &Points, x_axis: Axis, y_axis: Axis, n: usize, fudge: f64) -> (Vec<f64>, Vec<f64>) {
        let mut overall = vec![0.0; n * n];
        let mut positive = vec![0.0; n * n];

        for i in 0..n {
            let yi = y_axis.center(i, n);
            for j in 0..n {
                let xi = x_axis.center(j, n);
                let index = i * n + j;
                for k in 0..points.x.len() {
                    let weight =
                        1.0 / ((points.x[k] - xi).powi(2) + (points.y[k] - yi).powi(2) + fudge);
                    overall[index] += weight;
                    if points.positive[k] {
                        positive[index] += weight;
                    }
                }
            }
        }

        (overall, positive)
    }
}

/// Initial positive value for an outcome: its first value when it has few
/// levels, otherwise its minimum.
pub fn default_true_value(dataset: &Dataset, outcome: &str) -> Option<String> {
    let mut first_seen: Vec<&CellValue> = Vec::new();
    for value in dataset.column(outcome) {
        if !value.is_null() && !first_seen.iter().any(|seen| seen.same_value(value)) {
            first_seen.push(value);
        }
    }

    if first_seen.len() < LOW_CARDINALITY_LEVELS {
        return first_seen.first().map(|v| v.to_string());
    }

    first_seen
        .iter()
        .filter_map(|v| v.as_f64())
        .reduce(f64::min)
        .map(format_number)
}
