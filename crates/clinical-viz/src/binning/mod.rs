//! Adaptive binning of a column into discrete labels.
//!
//! Low-cardinality and text columns keep their literal values as labels.
//! Continuous columns are cut into "nice" intervals (`"0 - 10"`, `"10 - 20"`)
//! whose width is a round number chosen by [`nice::compute_step`].
//!
//! Binning never touches the caller's rows: [`BinningEngine::bin`] returns a
//! side table and [`BinningEngine::bin_into`] returns a new [`Dataset`].

mod nice;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::BinningConfig;
use crate::error::Result;
use crate::types::{CellValue, Dataset};
use crate::utils::format_edge;

/// Name of the derived column for `variable` binned with `max_bins`.
///
/// Different granularities of the same variable never collide.
pub fn bin_column_name(variable: &str, max_bins: usize) -> String {
    format!("{}Bin{}", variable, max_bins)
}

/// Bin labels for one column, aligned with the dataset rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinnedColumn {
    /// Derived column name (`"<variable>Bin<maxBins>"`).
    pub name: String,
    /// One label per row; `None` where the source value is missing.
    pub labels: Vec<Option<String>>,
    /// Interval edges when the continuous path was taken.
    pub edges: Option<Vec<f64>>,
    pub step: Option<f64>,
}

impl BinnedColumn {
    pub fn is_categorical(&self) -> bool {
        self.edges.is_none()
    }

    /// Labels in first-seen order without repeats.
    pub fn distinct_labels(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for label in self.labels.iter().flatten() {
            if !seen.contains(&label.as_str()) {
                seen.push(label);
            }
        }
        seen
    }
}

/// Converts column values into discrete bin labels.
pub struct BinningEngine;

impl BinningEngine {
    /// Bin `variable` and return the labels as a side table.
    pub fn bin(dataset: &Dataset, variable: &str, config: &BinningConfig) -> Result<BinnedColumn> {
        config.validate()?;

        let name = bin_column_name(variable, config.max_bins);
        if !dataset.is_empty() && !dataset.has_column(variable) {
            warn!(variable, "Binning a column that no row carries");
        }

        let distinct = dataset.distinct_values(variable);
        let numeric: Vec<f64> = distinct.iter().filter_map(CellValue::as_f64).collect();
        let all_numeric = numeric.len() == distinct.len();

        let span = match (numeric.first(), numeric.last()) {
            (Some(min), Some(max)) => max - min,
            _ => 0.0,
        };

        if distinct.len() <= config.max_bins || !all_numeric || span <= 0.0 {
            debug!(
                variable,
                distinct = distinct.len(),
                all_numeric,
                "Using literal labels"
            );
            let labels = dataset
                .column(variable)
                .into_iter()
                .map(|value| (!value.is_null()).then(|| value.to_string()))
                .collect();
            return Ok(BinnedColumn {
                name,
                labels,
                edges: None,
                step: None,
            });
        }

        let (min, max) = (numeric[0], numeric[numeric.len() - 1]);
        let step = config
            .step
            .unwrap_or_else(|| nice::compute_step(min, max, config));
        let edges = nice::bin_edges(min, max, step);

        debug!(
            variable,
            min,
            max,
            step,
            bins = edges.len().saturating_sub(1),
            "Computed bin edges"
        );

        let labels = dataset
            .numeric_column(variable)
            .into_iter()
            .map(|value| {
                value
                    .and_then(|v| nice::edge_position(&edges, v))
                    .map(|position| range_label(edges[position - 1], edges[position]))
            })
            .collect();

        Ok(BinnedColumn {
            name,
            labels,
            edges: Some(edges),
            step: Some(step),
        })
    }

    /// Bin `variable` and return a new dataset carrying the derived column.
    pub fn bin_into(dataset: &Dataset, variable: &str, config: &BinningConfig) -> Result<Dataset> {
        let binned = Self::bin(dataset, variable, config)?;
        let values = binned.labels.into_iter().map(CellValue::from).collect();
        dataset.with_column(&binned.name, values)
    }
}

fn range_label(lo: f64, hi: f64) -> String {
    format!("{} - {}", format_edge(lo), format_edge(hi))
}
