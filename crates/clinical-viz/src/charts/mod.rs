//! Declarative chart specifications.
//!
//! Each synthesizer turns a [`Dataset`] and its option bag into a
//! [`ChartSpec`]: a Vega-Lite v5 document with a concatenated grid of panels.
//! The core never renders; a chart spec is plain JSON for whatever renderer the
//! caller uses.
//!
//! - [`HistogramGrid`]: one count histogram per variable, three per row
//! - [`PairPlotMatrix`]: N x N scatter / density matrix over embedding dimensions
//! - [`TemporalGrid`]: per-feature trajectories, all patients and group means

pub mod histogram;
pub mod pairplot;
pub mod palette;
pub mod temporal;

pub use histogram::HistogramGrid;
pub use pairplot::{PairCell, PairPlotMatrix};
pub use palette::ColorScale;
pub use temporal::{SeriesGroups, TemporalGrid};

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::config::LegendLabels;
use crate::types::Dataset;

/// Schema URL stamped on every spec.
pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Name of the inline dataset that panels read from.
pub const SOURCE_DATA: &str = "source";

/// Horizontal room reserved for legends and axis titles.
const WIDTH_MARGIN: f64 = 270.0;

/// Vertical room reserved for titles and axis labels.
const HEIGHT_MARGIN: f64 = 113.0;

// ============================================================================
// Spec Types
// ============================================================================

/// Inline data bound to the whole document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedData {
    pub name: String,
    pub values: Dataset,
}

/// Top level of a synthesized chart.
///
/// Panels are left as JSON trees: their shape depends on the chart kind and
/// the renderer only sees the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub background: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NamedData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets: Option<BTreeMap<String, Vec<Value>>>,
    pub columns: usize,
    pub spacing: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
    pub concat: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<Value>,
}

impl ChartSpec {
    /// Empty grid with the shared header.
    pub(crate) fn grid(columns: usize, spacing: f64) -> Self {
        Self {
            schema: VEGA_LITE_SCHEMA.to_string(),
            background: "white".to_string(),
            data: None,
            datasets: None,
            columns,
            spacing,
            params: Vec::new(),
            concat: Vec::new(),
            resolve: None,
        }
    }

    /// Bind the dataset as the `source` data of the document.
    pub(crate) fn with_source(mut self, dataset: &Dataset) -> Self {
        self.data = Some(NamedData {
            name: SOURCE_DATA.to_string(),
            values: dataset.clone(),
        });
        self
    }

    pub fn panel(&self, index: usize) -> Option<&Value> {
        self.concat.get(index)
    }

    pub fn len(&self) -> usize {
        self.concat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concat.is_empty()
    }

    /// Serialize into a JSON value.
    pub fn to_value(&self) -> crate::error::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ============================================================================
// Shared Encoding Helpers
// ============================================================================

/// Per-panel size left after spacing and margins, split over `divisor` panels.
pub(crate) fn panel_extent(total: f64, panels: usize, spacing: f64, margin: f64, divisor: usize) -> f64 {
    (total - panels as f64 * spacing - margin) / divisor.max(1) as f64
}

pub(crate) fn panel_width(total: f64, panels: usize, spacing: f64, divisor: usize) -> f64 {
    panel_extent(total, panels, spacing, WIDTH_MARGIN, divisor)
}

pub(crate) fn panel_height(total: f64, panels: usize, spacing: f64, divisor: usize) -> f64 {
    panel_extent(total, panels, spacing, HEIGHT_MARGIN, divisor)
}

/// Renderer expression mapping a raw legend value to its display label.
pub(crate) fn legend_label_expr(labels: &LegendLabels) -> String {
    let map: Map<String, Value> = labels
        .iter()
        .map(|(key, label)| (key.clone(), label.clone()))
        .collect();
    format!("{}[datum.value]", Value::Object(map))
}

/// Nominal color channel for `field`, with optional legend relabeling.
pub(crate) fn color_encoding(field: &str, scale: &ColorScale, legend: Option<&LegendLabels>) -> Value {
    let mut color = json!({
        "field": field,
        "scale": scale.to_value(),
    });
    if let Some(labels) = legend {
        color["legend"] = json!({ "labelExpr": legend_label_expr(labels) });
    }
    color["type"] = json!("nominal");
    color
}

/// Add `width`/`height` to a panel object.
pub(crate) fn sized(width: f64, height: f64, panel: Value) -> Value {
    let mut object = Map::new();
    object.insert("width".to_string(), json!(width));
    object.insert("height".to_string(), json!(height));
    if let Value::Object(fields) = panel {
        object.extend(fields);
    }
    Value::Object(object)
}
