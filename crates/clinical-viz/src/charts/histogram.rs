//! Grid of count histograms, one panel per variable.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::charts::{ChartSpec, ColorScale, color_encoding, panel_height, panel_width, sized};
use crate::config::HistogramConfig;
use crate::error::Result;
use crate::types::Dataset;
use crate::utils::datum_ref;

/// Panels per row.
pub const GRID_COLUMNS: usize = 3;

/// Variables with more distinct values than this are binned by the renderer.
const RENDERER_BIN_THRESHOLD: usize = 10;

/// Background of panels whose variable differs significantly across groups.
const SIGNIFICANT_FILL: &str = "#ffe3e3";

/// Builds histogram grids.
pub struct HistogramGrid;

/// Placement and annotation of one panel.
struct Panel<'a> {
    variable: &'a str,
    is_left_col: bool,
    binned: bool,
    significant: bool,
}

impl HistogramGrid {
    /// Synthesize the histogram grid for `config.vars` (or `config.hue_in`).
    pub fn synthesize(dataset: &Dataset, config: &HistogramConfig) -> Result<ChartSpec> {
        dataset.ensure_not_empty()?;
        config.validate()?;
        let variables = config.columns()?;

        let n = variables.len();
        let columns = n.min(GRID_COLUMNS);
        let rows = (n - 1) / columns + 1;
        let height = config.height.unwrap_or(config.width / 2.5);
        let plot_width = config
            .plot_width
            .unwrap_or_else(|| panel_width(config.width, n, config.spacing, columns));
        let plot_height = config
            .plot_height
            .unwrap_or_else(|| panel_height(height, n, config.spacing, rows));

        debug!(
            panels = n,
            columns, rows, plot_width, plot_height, "Laying out histogram grid"
        );

        let scale = ColorScale::resolve(&config.palette);
        let mut spec = ChartSpec::grid(columns, config.spacing).with_source(dataset);

        for (index, variable) in variables.iter().enumerate() {
            if !dataset.has_column(variable) {
                warn!(variable = %variable, "Histogram variable not present in any row");
            }

            let panel = Panel {
                variable: variable.as_str(),
                is_left_col: index % columns == 0,
                binned: dataset.distinct_values(variable).len() > RENDERER_BIN_THRESHOLD,
                significant: config
                    .stats
                    .as_ref()
                    .and_then(|stats| stats.get(variable))
                    .is_some_and(|stats| stats.is_significant()),
            };
            spec.concat
                .push(Self::panel(&panel, config, &scale, plot_width, plot_height));
        }

        Ok(spec)
    }

    fn panel(
        panel: &Panel<'_>,
        config: &HistogramConfig,
        scale: &ColorScale,
        width: f64,
        height: f64,
    ) -> Value {
        let filter = match &config.hue_out {
            Some(hue) => format!(
                "{} !== null && {} !== null",
                datum_ref(panel.variable),
                datum_ref(hue)
            ),
            None => format!("{} !== null", datum_ref(panel.variable)),
        };

        let y_title = if panel.is_left_col { "Counts" } else { "" };
        let fill_opacity = if config.hue_in.is_some() { 0.6 } else { 0.8 };

        let mut encoding = json!({
            "x": {
                "field": panel.variable,
                "type": "nominal",
                "bin": panel.binned,
                "title": false,
                "axis": {
                    "labels": true,
                    "labelFontSize": 12,
                    "grid": config.show_grid,
                },
            },
            "y": {
                "aggregate": "count",
                "axis": {
                    "labels": true,
                    "labelFontSize": 12,
                    "grid": config.show_grid,
                    "title": y_title,
                    "titleFontSize": 15,
                },
            },
            "xOffset": { "field": config.hue_out.as_deref().unwrap_or("") },
        });
        if let Some(hue) = &config.hue_out {
            encoding["color"] = color_encoding(hue, scale, config.legend.as_ref());
        }

        let layer = sized(
            width,
            height,
            json!({
                "mark": {
                    "type": "bar",
                    "fillOpacity": fill_opacity,
                    "tooltip": config.show_tooltips.enabled(),
                },
                "transform": [{ "filter": filter }],
                "title": { "text": panel.variable, "fontSize": 15 },
                "encoding": encoding,
            }),
        );

        let mut panel_spec = json!({
            "layer": [layer],
            "resolve": { "scale": { "y": "independent" } },
        });
        if panel.significant {
            panel_spec["view"] = json!({ "fill": SIGNIFICANT_FILL });
        }
        panel_spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatisticsEngine;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn cohort() -> Dataset {
        Dataset::from_json_value(&json!([
            {"ID": 1, "age": 30, "sex": 0, "group": "A"},
            {"ID": 2, "age": 70, "sex": 1, "group": "B"},
            {"ID": 3, "age": 50, "sex": 0, "group": "A"},
            {"ID": 4, "age": 45, "sex": 1, "group": null}
        ]))
        .unwrap()
    }

    fn config(vars: &[&str]) -> HistogramConfig {
        HistogramConfig {
            vars: vars.iter().map(|v| v.to_string()).collect(),
            ..HistogramConfig::default()
        }
    }

    #[test]
    fn test_one_panel_per_variable() {
        let spec = HistogramGrid::synthesize(&cohort(), &config(&["age", "sex"])).unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.columns, 2);
        for (index, variable) in ["age", "sex"].iter().enumerate() {
            let panel = spec.panel(index).unwrap();
            assert_eq!(panel["layer"][0]["encoding"]["x"]["field"], *variable);
            assert_eq!(panel["layer"][0]["title"]["text"], *variable);
        }
    }

    #[test]
    fn test_layout_math() {
        let spec = HistogramGrid::synthesize(&cohort(), &config(&["age", "sex"])).unwrap();
        let layer = &spec.panel(0).unwrap()["layer"][0];
        // width 1000, height 400, spacing 20, 2 panels on one row
        assert_eq!(layer["width"], json!((1000.0 - 40.0 - 270.0) / 2.0));
        assert_eq!(layer["height"], json!(400.0 - 40.0 - 113.0));
    }

    #[test]
    fn test_wraps_into_three_columns() {
        let vars = ["ID", "age", "sex", "group"];
        let spec = HistogramGrid::synthesize(&cohort(), &config(&vars)).unwrap();
        assert_eq!(spec.columns, 3);
        assert_eq!(spec.len(), 4);

        let titles: Vec<Value> = spec
            .concat
            .iter()
            .map(|panel| panel["layer"][0]["encoding"]["y"]["axis"]["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("Counts"), json!(""), json!(""), json!("Counts")]);

        // two rows
        let layer = &spec.panel(0).unwrap()["layer"][0];
        assert_eq!(layer["height"], json!((400.0 - 80.0 - 113.0) / 2.0));
    }

    #[test]
    fn test_hue_out_adds_offset_color_and_filter() {
        let mut legend = BTreeMap::new();
        legend.insert("0".to_string(), json!("Male"));
        let config = HistogramConfig {
            hue_out: Some("sex".to_string()),
            legend: Some(legend),
            ..config(&["age"])
        };
        let spec = HistogramGrid::synthesize(&cohort(), &config).unwrap();
        let layer = &spec.panel(0).unwrap()["layer"][0];

        assert_eq!(
            layer["transform"][0]["filter"],
            r#"datum["age"] !== null && datum["sex"] !== null"#
        );
        assert_eq!(layer["encoding"]["xOffset"]["field"], "sex");
        assert_eq!(layer["encoding"]["color"]["field"], "sex");
        assert_eq!(layer["encoding"]["color"]["scale"]["range"][0], "#55A868");
        assert_eq!(
            layer["encoding"]["color"]["legend"]["labelExpr"],
            r#"{"0":"Male"}[datum.value]"#
        );
    }

    #[test]
    fn test_without_hue_there_is_no_color() {
        let spec = HistogramGrid::synthesize(&cohort(), &config(&["age"])).unwrap();
        let layer = &spec.panel(0).unwrap()["layer"][0];
        assert!(layer["encoding"].get("color").is_none());
        assert_eq!(layer["encoding"]["xOffset"]["field"], "");
        assert_eq!(layer["mark"]["fillOpacity"], 0.8);
        assert_eq!(layer["transform"][0]["filter"], r#"datum["age"] !== null"#);
    }

    #[test]
    fn test_many_distinct_values_are_binned() {
        let rows: Vec<Value> = (0..12).map(|i| json!({"ID": i, "score": i * 7})).collect();
        let data = Dataset::from_json_value(&Value::Array(rows)).unwrap();
        let spec = HistogramGrid::synthesize(&data, &config(&["score", "ID"])).unwrap();
        assert_eq!(spec.panel(0).unwrap()["layer"][0]["encoding"]["x"]["bin"], true);

        let spec = HistogramGrid::synthesize(&cohort(), &config(&["age"])).unwrap();
        assert_eq!(spec.panel(0).unwrap()["layer"][0]["encoding"]["x"]["bin"], false);
    }

    #[test]
    fn test_significant_panels_are_highlighted() {
        let rows: Vec<Value> = (0..40)
            .map(|i| {
                let group = i % 2;
                json!({"ID": i, "flag": if group == 0 { 0 } else { 1 }, "group": group})
            })
            .collect();
        let data = Dataset::from_json_value(&Value::Array(rows)).unwrap();
        let vars = vec!["flag".to_string(), "ID".to_string()];
        let stats = StatisticsEngine::compute_many(&data, &vars, Some("group"));
        assert!(stats["flag"].is_significant());
        assert!(!stats["ID"].is_significant());

        let config = HistogramConfig {
            vars,
            stats: Some(stats),
            ..HistogramConfig::default()
        };
        let spec = HistogramGrid::synthesize(&data, &config).unwrap();
        assert_eq!(spec.panel(0).unwrap()["view"]["fill"], SIGNIFICANT_FILL);
        assert!(spec.panel(1).unwrap().get("view").is_none());
    }

    #[test]
    fn test_falls_back_to_hue_in() {
        let config = HistogramConfig {
            hue_in: Some("age".to_string()),
            ..HistogramConfig::default()
        };
        let spec = HistogramGrid::synthesize(&cohort(), &config).unwrap();
        assert_eq!(spec.len(), 1);
        assert_eq!(spec.panel(0).unwrap()["layer"][0]["mark"]["fillOpacity"], 0.6);
    }

    #[test]
    fn test_rejects_empty_dataset_and_missing_vars() {
        let error = HistogramGrid::synthesize(&Dataset::default(), &config(&["age"])).unwrap_err();
        assert_eq!(error.error_code(), "INVALID_INPUT");

        let error =
            HistogramGrid::synthesize(&cohort(), &HistogramConfig::default()).unwrap_err();
        assert_eq!(error.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_source_data_is_attached() {
        let spec = HistogramGrid::synthesize(&cohort(), &config(&["age"])).unwrap();
        let value = spec.to_value().unwrap();
        assert_eq!(value["data"]["name"], "source");
        assert_eq!(value["data"]["values"].as_array().unwrap().len(), 4);
        assert_eq!(value["spacing"], 20.0);
    }
}
