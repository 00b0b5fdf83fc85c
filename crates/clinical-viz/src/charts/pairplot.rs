//! N x N pair-plot matrix over embedding dimensions.
//!
//! Row `i`, column `j` of the matrix is decided once into a [`PairCell`]:
//!
//! | position            | cell                                             |
//! |---------------------|--------------------------------------------------|
//! | diagonal            | marginal density of the variable, split by `hueIn` |
//! | upper (`i < j`)     | scatter (or density heatmap) colored by `hueIn`  |
//! | lower (`i > j`)     | scatter (or density heatmap) colored by `hueOut`, hidden without `hueOut` |

use serde_json::{Value, json};
use tracing::debug;

use crate::charts::{ChartSpec, ColorScale, color_encoding, panel_height, panel_width, sized};
use crate::config::{ConfigValidationError, LegendLabels, PairPlotConfig};
use crate::density::DensityMapEstimator;
use crate::error::Result;
use crate::types::{Dataset, ID_FIELD};
use crate::utils::datum_ref;

/// Name of the point-selection parameter shared by all scatter cells.
pub const SELECTION_PARAM: &str = "pts";

/// What one cell of the matrix shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PairCell {
    Diagonal {
        variable: String,
        hue: Option<String>,
        legend: Option<LegendLabels>,
    },
    Hidden,
    DensityHeatmap {
        x: String,
        y: String,
        /// Column binarized into the positive class.
        outcome: String,
        /// Color by corrected density (only when the cell has a hue).
        colored: bool,
    },
    Scatter {
        x: String,
        y: String,
        hue: Option<String>,
        legend: Option<LegendLabels>,
    },
}

impl PairCell {
    fn classify(row: usize, col: usize, variables: &[String], config: &PairPlotConfig) -> Self {
        let lower = row > col;
        let (x, y) = if lower {
            (&variables[row], &variables[col])
        } else {
            (&variables[col], &variables[row])
        };
        let (hue, legend, density) = if lower {
            (&config.hue_out, &config.legend_out, config.density_out)
        } else {
            (&config.hue_in, &config.legend_in, config.density_in)
        };

        if row == col {
            return PairCell::Diagonal {
                variable: x.clone(),
                hue: hue.clone(),
                legend: legend.clone(),
            };
        }

        if lower && config.hue_out.is_none() {
            return PairCell::Hidden;
        }

        if density {
            if let Some(outcome) = config.hue_out.as_ref().or(hue.as_ref()) {
                return PairCell::DensityHeatmap {
                    x: x.clone(),
                    y: y.clone(),
                    outcome: outcome.clone(),
                    colored: hue.is_some(),
                };
            }
        }

        PairCell::Scatter {
            x: x.clone(),
            y: y.clone(),
            hue: hue.clone(),
            legend: legend.clone(),
        }
    }
}

/// Builds pair-plot matrices.
pub struct PairPlotMatrix;

/// Values shared by every cell of one matrix.
struct CellContext<'a> {
    dataset: &'a Dataset,
    config: &'a PairPlotConfig,
    scale: ColorScale,
    width: f64,
    height: f64,
}

impl PairPlotMatrix {
    /// Variables of the matrix: `config.vars`, or every numeric column.
    pub fn variables(dataset: &Dataset, config: &PairPlotConfig) -> Result<Vec<String>> {
        let variables = if config.vars.is_empty() {
            dataset.numeric_columns()
        } else {
            config.vars.clone()
        };
        if variables.is_empty() {
            return Err(ConfigValidationError::NoVariables.into());
        }
        Ok(variables)
    }

    /// Row-major cell layout for `variables`.
    pub fn cells(variables: &[String], config: &PairPlotConfig) -> Vec<PairCell> {
        let n = variables.len();
        (0..n)
            .flat_map(|row| (0..n).map(move |col| (row, col)))
            .map(|(row, col)| PairCell::classify(row, col, variables, config))
            .collect()
    }

    pub fn synthesize(dataset: &Dataset, config: &PairPlotConfig) -> Result<ChartSpec> {
        dataset.ensure_not_empty()?;
        config.validate()?;
        let variables = Self::variables(dataset, config)?;

        let n = variables.len();
        let height = config.height.unwrap_or(config.width / 1.2);
        let context = CellContext {
            dataset,
            config,
            scale: ColorScale::resolve(&config.palette),
            width: config
                .plot_width
                .unwrap_or_else(|| panel_width(config.width, n, config.spacing, n)),
            height: config
                .plot_height
                .unwrap_or_else(|| panel_height(height, n, config.spacing, n)),
        };

        let cells = Self::cells(&variables, config);
        debug!(
            variables = n,
            heatmaps = cells
                .iter()
                .filter(|c| matches!(c, PairCell::DensityHeatmap { .. }))
                .count(),
            plot_width = context.width,
            plot_height = context.height,
            "Laying out pair plot"
        );

        let mut spec = ChartSpec::grid(n, config.spacing).with_source(dataset);
        spec.params.push(Self::selection_param(config));
        spec.resolve = Some(json!({ "scale": { "color": "independent" } }));
        for cell in &cells {
            spec.concat.push(Self::render(cell, &context)?);
        }

        Ok(spec)
    }

    fn selection_param(config: &PairPlotConfig) -> Value {
        let mut param = json!({ "name": SELECTION_PARAM, "select": "point" });
        if let Some(patient) = &config.selected_patient {
            param["value"] = json!([{ ID_FIELD: patient.to_json() }]);
        }
        param
    }

    fn render(cell: &PairCell, context: &CellContext<'_>) -> Result<Value> {
        let panel = match cell {
            PairCell::Diagonal {
                variable,
                hue,
                legend,
            } => Self::diagonal(variable, hue.as_deref(), legend.as_ref(), context),
            PairCell::Hidden => Self::hidden(context),
            PairCell::DensityHeatmap {
                x,
                y,
                outcome,
                colored,
            } => Self::density_heatmap(x, y, outcome, *colored, context)?,
            PairCell::Scatter { x, y, hue, legend } => {
                Self::scatter(x, y, hue.as_deref(), legend.as_ref(), context)
            }
        };
        Ok(sized(context.width, context.height, panel))
    }

    fn axis(context: &CellContext<'_>) -> Value {
        json!({ "labels": false, "grid": context.config.show_grid })
    }

    fn diagonal(
        variable: &str,
        hue: Option<&str>,
        legend: Option<&LegendLabels>,
        context: &CellContext<'_>,
    ) -> Value {
        let mut transform = Vec::new();
        let mut density = json!({ "counts": true, "density": variable });
        if let Some(hue) = hue {
            transform.push(json!({ "filter": format!("{} !== \"null\"", datum_ref(hue)) }));
            density["groupby"] = json!([hue]);
        }
        transform.push(density);

        let mut encoding = json!({
            "x": {
                "field": "value",
                "type": "quantitative",
                "axis": Self::axis(context),
                "title": variable,
            },
            "y": {
                "field": "density",
                "type": "quantitative",
                "axis": Self::axis(context),
                "title": variable,
            },
        });
        if let Some(hue) = hue {
            encoding["color"] = color_encoding(hue, &context.scale, legend);
        }

        json!({
            "view": { "stroke": null, "fill": "white" },
            "mark": {
                "type": "line",
                "fillOpacity": 0.8,
                "tooltip": context.config.show_tooltips.enabled(),
            },
            "transform": transform,
            "encoding": encoding,
        })
    }

    fn hidden(context: &CellContext<'_>) -> Value {
        json!({
            "view": { "stroke": null, "fill": "white" },
            "mark": {
                "type": "rect",
                "tooltip": context.config.show_tooltips.enabled(),
                "color": "white",
            },
        })
    }

    fn density_heatmap(
        x: &str,
        y: &str,
        outcome: &str,
        colored: bool,
        context: &CellContext<'_>,
    ) -> Result<Value> {
        let grid = DensityMapEstimator::estimate(
            context.dataset,
            x,
            y,
            outcome,
            &context.config.density_config(),
        )?;

        let ordinal_axis = json!({
            "labels": false,
            "grid": context.config.show_grid,
            "ticks": false,
        });
        let mut encoding = json!({
            "x": { "field": "x", "type": "ordinal", "axis": ordinal_axis, "title": x },
            "y": { "field": "y", "type": "ordinal", "title": y, "axis": ordinal_axis },
        });
        if colored {
            encoding["color"] = json!({
                "field": "correctedDensity",
                "scale": { "scheme": "viridis" },
                "type": "quantitative",
            });
        }

        Ok(json!({
            "view": { "stroke": null, "fill": "white" },
            "mark": "rect",
            "data": {
                "name": format!("densityMap {} vs {}", x, y),
                "values": serde_json::to_value(&grid.cells)?,
            },
            "encoding": encoding,
        }))
    }

    fn scatter(
        x: &str,
        y: &str,
        hue: Option<&str>,
        legend: Option<&LegendLabels>,
        context: &CellContext<'_>,
    ) -> Value {
        let config = context.config;
        let selected = |value: Value, default: Value| {
            json!({
                "condition": { "param": SELECTION_PARAM, "empty": false, "value": value },
                "value": default,
            })
        };
        let tooltip: Vec<Value> = config
            .show_tooltips
            .fields()
            .iter()
            .map(|field| json!({ "field": field }))
            .collect();

        let mut encoding = json!({
            "x": {
                "field": x,
                "type": "quantitative",
                "scale": { "zero": config.scale_zero },
                "axis": Self::axis(context),
                "title": x,
            },
            "y": {
                "field": y,
                "type": "quantitative",
                "scale": { "zero": config.scale_zero },
                "title": y,
                "axis": Self::axis(context),
            },
            "tooltip": tooltip,
            "size": selected(json!(300), json!(50)),
            "shape": selected(json!("triangle-up"), json!("circle")),
            "opacity": selected(json!(1), json!(0.6)),
        });
        if let Some(hue) = hue {
            encoding["color"] = color_encoding(hue, &context.scale, legend);
            if config.markers {
                encoding["shape"] = json!({ "field": hue, "type": "nominal" });
            }
        }

        json!({
            "view": { "stroke": null, "fill": "white" },
            "mark": {
                "type": "point",
                "opacity": 0.7,
                "tooltip": config.show_tooltips.enabled(),
            },
            "encoding": encoding,
        })
    }
}
