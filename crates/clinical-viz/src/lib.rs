//! Clinical Cohort Exploration Core
//!
//! Pure, synchronous building blocks for exploring a clinical cohort: adaptive
//! binning, grouped descriptive statistics with significance tests, outcome
//! density maps over a 2D embedding, and Vega-Lite chart specifications.
//!
//! # Overview
//!
//! - **Binning**: [`BinningEngine`] turns a column into discrete labels, using
//!   literal values for low-cardinality columns and "nice" intervals otherwise
//! - **Statistics**: [`StatisticsEngine`] summarizes a variable per group and
//!   picks a χ², ANOVA or Kruskal-Wallis test from the inferred variable type
//!   and a Kolmogorov-Smirnov normality gate
//! - **Density maps**: [`DensityMapEstimator`] estimates inverse-distance
//!   density grids and the outcome-corrected density
//! - **Charts**: [`HistogramGrid`], [`PairPlotMatrix`] and [`TemporalGrid`]
//!   synthesize renderer-agnostic [`ChartSpec`]s
//! - **Views**: [`views`] composes the above over an uploaded [`ClinicalBundle`]
//!
//! Nothing here mutates its input: binning returns new datasets, and every
//! synthesizer recomputes from scratch, so calls over the same dataset can run
//! on separate threads.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use clinical_viz::{BinningConfig, BinningEngine, Dataset, HistogramConfig, HistogramGrid, StatisticsEngine};
//! use serde_json::json;
//!
//! let data = Dataset::from_json_value(&json!([
//!     {"ID": 1, "age": 30, "sex": 0},
//!     {"ID": 2, "age": 70, "sex": 1},
//!     {"ID": 3, "age": 50, "sex": 0}
//! ]))?;
//!
//! // Summarize age per sex
//! let stats = StatisticsEngine::compute(&data, "age", Some("sex"));
//! println!("{}", serde_json::to_string_pretty(&stats)?);
//!
//! // Bin the grouping column and plot
//! let config = BinningConfig::builder().max_bins(5).build()?;
//! let binned = BinningEngine::bin_into(&data, "sex", &config)?;
//! let spec = HistogramGrid::synthesize(
//!     &binned,
//!     &HistogramConfig {
//!         vars: vec!["age".into()],
//!         hue_out: Some("sexBin5".into()),
//!         ..HistogramConfig::default()
//!     },
//! )?;
//! ```
//!
//! # Errors
//!
//! Fallible operations return [`VizError`]. Degenerate statistics (empty
//! groups, zero variance, a single group) are not errors; they show up as
//! `"---"` statistics and empty p-values.

pub mod binning;
pub mod bundle;
pub mod charts;
pub mod config;
pub mod density;
pub mod error;
pub mod stats;
pub mod types;
pub mod utils;
pub mod views;

// Re-exports for convenient access
pub use binning::{BinnedColumn, BinningEngine, bin_column_name};
pub use bundle::{BundleSummary, ClinicalBundle};
pub use charts::{ChartSpec, HistogramGrid, PairCell, PairPlotMatrix, TemporalGrid};
pub use config::{
    BinningConfig, BinningConfigBuilder, ConfigValidationError, DensityConfig,
    DensityConfigBuilder, HistogramConfig, PairPlotConfig, Palette, TemporalConfig, Tooltips,
};
pub use density::{DensityMapEstimator, default_true_value};
pub use error::{Result as VizResult, ResultExt, VizError};
pub use stats::StatisticsEngine;
pub use types::{
    CellValue, Dataset, DensityCell, DensityGrid, GroupStats, GroupSummary, OverallSummary, Row,
    StatTest, VarType,
};

// Every input and output type can cross threads.
static_assertions::assert_impl_all!(Dataset: Send, Sync);
static_assertions::assert_impl_all!(GroupStats: Send, Sync);
static_assertions::assert_impl_all!(DensityGrid: Send, Sync);
static_assertions::assert_impl_all!(ChartSpec: Send, Sync);
static_assertions::assert_impl_all!(ClinicalBundle: Send, Sync);
static_assertions::assert_impl_all!(VizError: Send, Sync);
