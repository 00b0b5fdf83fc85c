//! Per-feature trajectory grid for temporal (series-valued) features.
//!
//! Each row of the dataset holds one equal-length series per feature. Series
//! are unrolled into one record per sample index; features of the same length
//! share one unrolled dataset (`length<L>`), since records of different
//! lengths cannot be aligned.
//!
//! Every feature gets two panels: all patient trajectories with the selected
//! patient highlighted, and the group mean with a standard-deviation band.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::charts::{ChartSpec, ColorScale, color_encoding, panel_width, sized};
use crate::config::TemporalConfig;
use crate::error::{Result, VizError};
use crate::types::{CellValue, Dataset, ID_FIELD, cell};

/// Field holding the sample index of an unrolled record.
pub const SAMPLE_FIELD: &str = "Sample";

/// Selection parameter of the all-patients panels.
pub const PATIENT_PARAM: &str = "IdPatient";

/// Default height of each panel.
pub const DEFAULT_PLOT_HEIGHT: f64 = 200.0;

/// Features per page when a long feature list is split up.
pub const FEATURES_PER_PAGE: usize = 3;

const GRID_COLUMNS: usize = 2;
const HIGHLIGHT_COLOR: &str = "#b71d1c";

/// Temporal features grouped by series length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesGroups {
    /// Dataset name to the features stored in it, in request order.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Feature to the dataset name holding it.
    pub dataset_of: BTreeMap<String, String>,
}

/// Builds temporal feature grids.
pub struct TemporalGrid;

impl TemporalGrid {
    /// Group `features` by the length of their series in the first row that has one.
    ///
    /// # Errors
    ///
    /// `ColumnNotFound` for an unknown feature, `InvalidInput` for a feature
    /// that holds no series at all.
    pub fn group_by_length(dataset: &Dataset, features: &[String]) -> Result<SeriesGroups> {
        let mut groups = SeriesGroups::default();
        for feature in features {
            dataset.require_column(feature)?;
            let length = dataset
                .iter()
                .find_map(|row| cell(row, feature).as_series().map(|s| s.len()))
                .ok_or_else(|| {
                    VizError::InvalidInput(format!(
                        "Temporal feature '{}' holds no series values",
                        feature
                    ))
                })?;

            let name = format!("length{}", length);
            groups
                .groups
                .entry(name.clone())
                .or_default()
                .push(feature.clone());
            groups.dataset_of.insert(feature.clone(), name);
        }
        Ok(groups)
    }

    /// Unroll the series of `features` into one record per patient and sample.
    ///
    /// The sample count of a patient is the length of its first feature.
    /// Records carry the ID, the outcome hue and any tooltip fields.
    pub fn unroll(dataset: &Dataset, features: &[String], config: &TemporalConfig) -> Vec<Value> {
        let Some(lead) = features.first() else {
            return Vec::new();
        };

        let mut records = Vec::new();
        for patient in dataset.iter() {
            let samples = cell(patient, lead).as_series().map_or(0, |s| s.len());
            for sample in 0..samples {
                let mut record = Map::new();
                record.insert(ID_FIELD.to_string(), cell(patient, ID_FIELD).to_json());
                if let Some(hue) = &config.hue_out {
                    record.insert(hue.clone(), cell(patient, hue).to_json());
                }
                record.insert(SAMPLE_FIELD.to_string(), json!(sample));
                for field in config.show_tooltips.fields() {
                    record.insert(field.clone(), cell(patient, field).to_json());
                }
                for feature in features {
                    let value = cell(patient, feature)
                        .as_series()
                        .and_then(|series| series.get(sample))
                        .map_or(Value::Null, |v| Value::from(*v));
                    record.insert(feature.clone(), value);
                }
                records.push(Value::Object(record));
            }
        }
        records
    }

    /// Split a feature list into pages of `size` (at least one per page).
    pub fn pages(features: &[String], size: usize) -> Vec<Vec<String>> {
        features
            .chunks(size.max(1))
            .map(|page| page.to_vec())
            .collect()
    }

    pub fn synthesize(dataset: &Dataset, config: &TemporalConfig) -> Result<ChartSpec> {
        dataset.ensure_not_empty()?;
        config.validate()?;

        let n = config.vars.len();
        let width = config
            .plot_width
            .unwrap_or_else(|| panel_width(config.width, n, config.spacing, GRID_COLUMNS));
        let height = config.plot_height.unwrap_or(DEFAULT_PLOT_HEIGHT);

        let series = Self::group_by_length(dataset, &config.vars)?;
        let datasets: BTreeMap<String, Vec<Value>> = series
            .groups
            .iter()
            .map(|(name, features)| (name.clone(), Self::unroll(dataset, features, config)))
            .collect();

        debug!(
            features = n,
            datasets = datasets.len(),
            records = datasets.values().map(Vec::len).sum::<usize>(),
            "Unrolled temporal features"
        );

        let scale = ColorScale::resolve(&config.palette);
        let selected = config
            .selected_patient
            .as_ref()
            .filter(|patient| !is_blank(patient));

        let mut spec = ChartSpec::grid(GRID_COLUMNS, config.spacing);
        for feature in &config.vars {
            let data_name = &series.dataset_of[feature];
            spec.concat.push(sized(
                width,
                height,
                Self::all_patients_panel(feature, data_name, selected, config),
            ));
            spec.concat.push(sized(
                width,
                height,
                Self::mean_panel(feature, data_name, &scale, config),
            ));
        }
        spec.datasets = Some(datasets);
        spec.resolve = Some(json!({ "scale": { "color": "independent" } }));

        Ok(spec)
    }

    fn sample_axis(title: Value) -> Value {
        json!({
            "field": SAMPLE_FIELD,
            "type": "quantitative",
            "title": title,
            "axis": { "labels": true, "grid": true },
        })
    }

    fn all_patients_panel(
        feature: &str,
        data_name: &str,
        selected: Option<&CellValue>,
        config: &TemporalConfig,
    ) -> Value {
        let tooltip = config.show_tooltips.enabled();

        let mut param = json!({
            "name": PATIENT_PARAM,
            "select": { "type": "point", "fields": [ID_FIELD] },
        });
        if let Some(patient) = selected {
            param["value"] = json!([{ ID_FIELD: patient.to_json() }]);
        }

        let color = match selected {
            Some(_) => json!({ "field": ID_FIELD, "scale": { "range": ["grey"] }, "legend": null }),
            None => json!({ "field": ID_FIELD, "type": "nominal", "legend": null }),
        };
        let opacity = if selected.is_some() { 0.4 } else { 0.8 };

        let trajectories = json!({
            "params": [param],
            "mark": { "type": "line", "tooltip": tooltip, "opacity": opacity },
            "encoding": {
                "x": Self::sample_axis(json!(SAMPLE_FIELD)),
                "y": {
                    "aggregate": "mean",
                    "field": feature,
                    "title": feature,
                    "axis": { "labels": true, "grid": true },
                },
                "color": color,
            },
        });

        let highlight = json!({
            "transform": [{ "filter": { "param": PATIENT_PARAM } }],
            "mark": { "type": "line", "tooltip": tooltip },
            "encoding": {
                "x": Self::sample_axis(json!(false)),
                "y": {
                    "aggregate": "mean",
                    "field": feature,
                    "type": "quantitative",
                    "axis": { "labels": false, "grid": true },
                    "title": false,
                },
                "color": { "value": HIGHLIGHT_COLOR },
            },
        });

        json!({
            "view": { "stroke": null },
            "data": { "name": data_name },
            "layer": [trajectories, highlight],
        })
    }

    fn mean_panel(feature: &str, data_name: &str, scale: &ColorScale, config: &TemporalConfig) -> Value {
        let mut mean = json!({
            "mark": { "type": "line", "tooltip": config.show_tooltips.enabled() },
            "encoding": {
                "x": Self::sample_axis(json!(SAMPLE_FIELD)),
                "y": {
                    "aggregate": "mean",
                    "field": feature,
                    "title": "",
                    "axis": { "labels": true, "grid": true },
                },
            },
        });
        let mut band = json!({
            "data": { "name": data_name },
            "mark": { "type": "errorband", "extent": "stdev" },
            "encoding": {
                "x": Self::sample_axis(json!(false)),
                "y": {
                    "field": feature,
                    "type": "quantitative",
                    "axis": { "labels": false, "grid": true },
                    "title": false,
                },
            },
        });
        if let Some(hue) = &config.hue_out {
            mean["encoding"]["color"] = color_encoding(hue, scale, None);
            band["encoding"]["color"] = color_encoding(hue, scale, config.legend.as_ref());
        }

        json!({
            "view": { "stroke": null },
            "data": { "name": data_name },
            "layer": [mean, band],
        })
    }
}

/// A selection that highlights nobody.
fn is_blank(value: &CellValue) -> bool {
    match value {
        CellValue::Null => true,
        CellValue::Text(text) => text.is_empty(),
        _ => false,
    }
}
