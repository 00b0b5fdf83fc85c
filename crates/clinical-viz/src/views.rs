//! End-to-end views over a [`ClinicalBundle`].
//!
//! Each view filters the selected patients, bins the grouping columns into
//! new datasets and hands the result to a chart synthesizer. These are the
//! compositions a UI shell needs for its clinical, output-space and temporal
//! tabs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binning::{BinningEngine, bin_column_name};
use crate::bundle::ClinicalBundle;
use crate::charts::temporal::FEATURES_PER_PAGE;
use crate::charts::{ChartSpec, HistogramGrid, PairPlotMatrix, TemporalGrid};
use crate::config::{BinningConfig, HistogramConfig, PairPlotConfig, TemporalConfig};
use crate::density::default_true_value;
use crate::error::Result;
use crate::stats::StatisticsEngine;
use crate::types::{CellValue, Dataset, GroupStats};

/// Embedding dimensions shown before the caller picks any.
const DEFAULT_DIMENSIONS: usize = 4;

/// Bin settings of the views: five nice bins.
fn view_binning() -> BinningConfig {
    BinningConfig {
        max_bins: 5,
        ..BinningConfig::default()
    }
}

/// Bin `variable` into a new dataset and return it with the bin column name.
fn binned(
    dataset: Dataset,
    variable: Option<&str>,
    binning: &BinningConfig,
) -> Result<(Dataset, Option<String>)> {
    match variable {
        Some(variable) => {
            let dataset = BinningEngine::bin_into(&dataset, variable, binning)?;
            Ok((dataset, Some(bin_column_name(variable, binning.max_bins))))
        }
        None => Ok((dataset, None)),
    }
}

// ============================================================================
// Clinical Variables
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicalRequest {
    /// Variable of the single histogram. Defaults to the first input variable.
    pub variable: Option<String>,
    /// Outcome (or any grouping variable) to split by, binned first.
    pub group_by: Option<String>,
    pub binning: BinningConfig,
}

impl Default for ClinicalRequest {
    fn default() -> Self {
        Self {
            variable: None,
            group_by: None,
            binning: view_binning(),
        }
    }
}

/// Charts and statistics of the clinical variables view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalView {
    /// Large histogram of the selected variable.
    pub histogram: ChartSpec,
    /// One small histogram per input variable, significant ones highlighted.
    pub matrix: ChartSpec,
    /// Statistics of the selected variable.
    pub stats: Option<GroupStats>,
    /// Statistics of every input variable.
    pub stats_by_variable: BTreeMap<String, GroupStats>,
}

pub fn clinical_view(bundle: &ClinicalBundle, request: &ClinicalRequest) -> Result<ClinicalView> {
    let variable = request
        .variable
        .clone()
        .or_else(|| bundle.available_input_clinical_var.first().cloned());
    let (data, hue_out) = binned(bundle.patients(), request.group_by.as_deref(), &request.binning)?;

    let legend = request
        .group_by
        .as_deref()
        .and_then(|group_by| bundle.legend_for(group_by))
        .cloned();

    let stats_by_variable =
        StatisticsEngine::compute_many(&data, &bundle.available_input_clinical_var, hue_out.as_deref());

    let histogram = HistogramGrid::synthesize(
        &data,
        &HistogramConfig {
            hue_in: variable.clone(),
            hue_out: hue_out.clone(),
            legend: legend.clone(),
            width: 1400.0,
            height: Some(800.0),
            ..HistogramConfig::default()
        },
    )?;

    let matrix = HistogramGrid::synthesize(
        &data,
        &HistogramConfig {
            vars: bundle.available_input_clinical_var.clone(),
            hue_in: variable.clone(),
            hue_out: hue_out.clone(),
            legend,
            plot_width: Some(400.0),
            plot_height: Some(170.0),
            stats: Some(stats_by_variable.clone()),
            ..HistogramConfig::default()
        },
    )?;

    let stats = variable
        .as_deref()
        .map(|variable| StatisticsEngine::compute(&data, variable, hue_out.as_deref()));

    info!(
        variable = variable.as_deref().unwrap_or(""),
        group_by = hue_out.as_deref().unwrap_or(""),
        significant = stats_by_variable.values().filter(|s| s.is_significant()).count(),
        "Built clinical view"
    );

    Ok(ClinicalView {
        histogram,
        matrix,
        stats,
        stats_by_variable,
    })
}

// ============================================================================
// Output Space
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSpaceRequest {
    /// Embedding dimensions. Defaults to the first four available.
    pub dimensions: Vec<String>,
    pub input_variable: Option<String>,
    pub output_variable: Option<String>,
    /// Show the lower triangle as outcome density maps.
    pub density: bool,
    #[serde(alias = "densityBandwith")]
    pub bandwidth: f64,
    /// Positive outcome value. Defaults to the outcome's first value.
    #[serde(deserialize_with = "crate::config::string_or_number")]
    pub true_value: Option<String>,
    pub selected_patient: Option<CellValue>,
    pub binning: BinningConfig,
}

impl Default for OutputSpaceRequest {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            input_variable: None,
            output_variable: None,
            density: false,
            bandwidth: 5.0,
            true_value: None,
            selected_patient: None,
            binning: view_binning(),
        }
    }
}

pub fn output_space_view(bundle: &ClinicalBundle, request: &OutputSpaceRequest) -> Result<ChartSpec> {
    let dimensions = if request.dimensions.is_empty() {
        bundle
            .available_dimensions
            .iter()
            .take(DEFAULT_DIMENSIONS)
            .cloned()
            .collect()
    } else {
        request.dimensions.clone()
    };

    let output = request.output_variable.as_deref();
    let (data, hue_in) = binned(bundle.patients(), request.input_variable.as_deref(), &request.binning)?;
    let (data, binned_output) = binned(data, output, &request.binning)?;
    let hue_out = if request.density {
        output.map(str::to_string)
    } else {
        binned_output
    };

    let true_value = request
        .true_value
        .clone()
        .or_else(|| output.and_then(|outcome| default_true_value(&data, outcome)));

    let config = PairPlotConfig {
        vars: dimensions,
        hue_in,
        hue_out,
        show_tooltips: bundle.tool_tip.clone(),
        legend_in: request
            .input_variable
            .as_deref()
            .and_then(|v| bundle.legend_for(v))
            .cloned(),
        legend_out: output.and_then(|v| bundle.legend_for(v)).cloned(),
        density_out: request.density,
        density_bandwidth: request.bandwidth,
        true_value,
        selected_patient: request.selected_patient.clone(),
        ..PairPlotConfig::default()
    };

    let spec = PairPlotMatrix::synthesize(&data, &config)?;
    info!(
        dimensions = config.vars.len(),
        density = request.density,
        "Built output space view"
    );
    Ok(spec)
}

// ============================================================================
// Temporal Features
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemporalRequest {
    pub output_variable: Option<String>,
    /// Zero-based page of three features.
    pub page: usize,
    pub selected_patient: Option<CellValue>,
    pub binning: BinningConfig,
}

impl Default for TemporalRequest {
    fn default() -> Self {
        Self {
            output_variable: None,
            page: 0,
            selected_patient: None,
            binning: view_binning(),
        }
    }
}

/// Temporal grid of one feature page, or `None` past the last page.
pub fn temporal_view(bundle: &ClinicalBundle, request: &TemporalRequest) -> Result<Option<ChartSpec>> {
    let pages = TemporalGrid::pages(&bundle.available_temporal_features, FEATURES_PER_PAGE);
    let Some(features) = pages.get(request.page) else {
        return Ok(None);
    };

    let output = request.output_variable.as_deref();
    let (data, hue_out) = binned(bundle.patients(), output, &request.binning)?;

    let config = TemporalConfig {
        vars: features.clone(),
        hue_out,
        show_tooltips: bundle.tool_tip.clone(),
        legend: output.and_then(|v| bundle.legend_for(v)).cloned(),
        selected_patient: request.selected_patient.clone(),
        ..TemporalConfig::default()
    };

    let spec = TemporalGrid::synthesize(&data, &config)?;
    info!(
        page = request.page,
        pages = pages.len(),
        features = features.len(),
        "Built temporal view"
    );
    Ok(Some(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> ClinicalBundle {
        ClinicalBundle::from_json_value(&json!({
            "dataframe": [
                {"ID": 1, "age": 30, "sex": 0, "death": 0, "Dim 1": 0, "Dim 2": 0, "ecg": [1, 2]},
                {"ID": 2, "age": 70, "sex": 1, "death": 1, "Dim 1": 100, "Dim 2": 50, "ecg": [2, 3]},
                {"ID": 3, "age": 50, "sex": 0, "death": 0, "Dim 1": 50, "Dim 2": 100, "ecg": [3, 4]},
                {"ID": 4, "age": 65, "sex": 1, "death": 1, "Dim 1": 20, "Dim 2": 80, "ecg": [4, 5]}
            ],
            "availableDimensions": ["Dim 1", "Dim 2"],
            "availableInputClinicalVar": ["age", "sex"],
            "availableOutputClinicalVar": ["death"],
            "availableGroupByVar": ["death"],
            "availableTemporalFeatures": ["ecg"],
            "availablePatients": [1, 2, 3],
            "legend": {"death": {"0": "Alive", "1": "Dead"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_clinical_view() {
        let request = ClinicalRequest {
            group_by: Some("death".to_string()),
            ..ClinicalRequest::default()
        };
        let view = clinical_view(&bundle(), &request).unwrap();

        assert_eq!(view.histogram.len(), 1);
        assert_eq!(view.matrix.len(), 2);
        let layer = &view.matrix.panel(0).unwrap()["layer"][0];
        assert_eq!(layer["width"], 400.0);
        assert_eq!(layer["encoding"]["color"]["field"], "deathBin5");
        let stats = view.stats.unwrap();
        assert_eq!(stats.all.n, 3);
        assert!(stats.group("0").is_some());
        assert_eq!(view.stats_by_variable.len(), 2);
    }

    #[test]
    fn test_output_space_view() {
        let request = OutputSpaceRequest {
            input_variable: Some("sex".to_string()),
            output_variable: Some("death".to_string()),
            ..OutputSpaceRequest::default()
        };
        let spec = output_space_view(&bundle(), &request).unwrap();
        assert_eq!(spec.columns, 2);
        assert_eq!(spec.panel(0).unwrap()["encoding"]["color"]["field"], "sexBin5");
        assert_eq!(spec.panel(2).unwrap()["encoding"]["color"]["field"], "deathBin5");
    }

    #[test]
    fn test_output_space_density_uses_raw_outcome() {
        let request = OutputSpaceRequest {
            output_variable: Some("death".to_string()),
            density: true,
            ..OutputSpaceRequest::default()
        };
        let spec = output_space_view(&bundle(), &request).unwrap();
        let heatmap = spec.panel(2).unwrap();
        assert_eq!(heatmap["data"]["name"], "densityMap Dim 2 vs Dim 1");
    }

    #[test]
    fn test_temporal_view_pages() {
        let request = TemporalRequest {
            output_variable: Some("death".to_string()),
            ..TemporalRequest::default()
        };
        let spec = temporal_view(&bundle(), &request).unwrap().unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.datasets.as_ref().unwrap()["length2"].len(), 6);

        let request = TemporalRequest {
            page: 1,
            ..TemporalRequest::default()
        };
        assert!(temporal_view(&bundle(), &request).unwrap().is_none());
    }
}
