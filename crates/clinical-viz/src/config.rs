//! Option bags for binning, density estimation and chart synthesis.
//!
//! Every synthesizer takes one fully enumerated configuration structure.
//! Defaults live in the `Default` impls (and the builders for the two
//! engine configs), and each structure is validated once at the boundary
//! with [`validate`](BinningConfig::validate).
//!
//! All option bags deserialize from camelCase JSON, so a UI shell can hand
//! its options object over unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{CellValue, GroupStats};
use crate::utils::format_number;

/// Display labels for the raw values of a variable (`{"0": "Alive", "1": "Dead"}`).
pub type LegendLabels = BTreeMap<String, serde_json::Value>;

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid maxBins: {0} (must be at least 2)")]
    InvalidMaxBins(usize),

    #[error("Invalid base: {0} (must be at least 2)")]
    InvalidBase(u32),

    #[error("Invalid candidate divisors: must be a non-empty list of positive numbers")]
    InvalidDivisors,

    #[error("Invalid value for '{field}': {value} (must be a positive number)")]
    NotPositive { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value} (must be a finite number)")]
    NotFinite { field: String, value: f64 },

    #[error("Invalid pixel count: {0} (must be at least 2)")]
    InvalidPixels(usize),

    #[error("No variables to plot")]
    NoVariables,
}

fn ensure_positive(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        })
    }
}

fn ensure_finite(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigValidationError::NotFinite {
            field: field.to_string(),
            value,
        })
    }
}

// =============================================================================
// Shared Option Types
// =============================================================================

/// Color palette: a registry name (`"deep"`) or a literal list of colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Palette {
    Named(String),
    Colors(Vec<String>),
}

impl Default for Palette {
    fn default() -> Self {
        Palette::Named("deep".to_string())
    }
}

/// Tooltip directive: on/off, or the list of fields to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tooltips {
    Enabled(bool),
    Fields(Vec<String>),
}

impl Default for Tooltips {
    fn default() -> Self {
        Tooltips::Enabled(true)
    }
}

impl Tooltips {
    /// Whether marks carry a tooltip at all. Only an explicit `false` disables it.
    pub fn enabled(&self) -> bool {
        !matches!(self, Tooltips::Enabled(false))
    }

    /// Fields listed for per-point tooltips (empty unless a list was given).
    pub fn fields(&self) -> &[String] {
        match self {
            Tooltips::Fields(fields) => fields,
            Tooltips::Enabled(_) => &[],
        }
    }
}

/// Accepts a label map or `false` (no legend relabeling).
fn legend_or_false<'de, D>(deserializer: D) -> Result<Option<LegendLabels>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Labels(LegendLabels),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Labels(labels)) => Some(labels),
        Some(Raw::Flag(_)) | None => None,
    })
}

/// Accepts a string or a number and keeps it as text.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => Some(text),
        Some(Raw::Number(number)) => Some(format_number(number)),
        None => None,
    })
}

// =============================================================================
// Binning
// =============================================================================

/// Configuration for [`crate::binning::BinningEngine`].
///
/// # Example
///
/// ```rust,ignore
/// use clinical_viz::config::BinningConfig;
///
/// let config = BinningConfig::builder()
///     .max_bins(5)
///     .nice(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinningConfig {
    /// Upper bound on the number of bins. Columns with at most this many
    /// distinct values get one bin per value.
    /// Default: 10
    #[serde(alias = "maxbins")]
    pub max_bins: usize,

    /// Round the raw step to a "nice" number (1, 2, 5 x base^k).
    /// Default: true
    pub nice: bool,

    /// Explicit bin width. Skips the step heuristic when set.
    /// Default: None
    pub step: Option<f64>,

    /// Base of the nice-number powers.
    /// Default: 10
    pub base: u32,

    /// Multipliers tried at each power of `base`.
    /// Default: [5, 2, 1]
    #[serde(alias = "divide")]
    pub candidate_divisors: Vec<f64>,

    /// Lower bound on the raw step before nice rounding.
    /// Default: 1
    #[serde(alias = "minstep")]
    pub min_step: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            max_bins: 10,
            nice: true,
            step: None,
            base: 10,
            candidate_divisors: vec![5.0, 2.0, 1.0],
            min_step: 1.0,
        }
    }
}

impl BinningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> BinningConfigBuilder {
        BinningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_bins < 2 {
            return Err(ConfigValidationError::InvalidMaxBins(self.max_bins));
        }

        if self.base < 2 {
            return Err(ConfigValidationError::InvalidBase(self.base));
        }

        if self.candidate_divisors.is_empty()
            || self
                .candidate_divisors
                .iter()
                .any(|d| !d.is_finite() || *d <= 0.0)
        {
            return Err(ConfigValidationError::InvalidDivisors);
        }

        ensure_positive("minStep", self.min_step)?;

        if let Some(step) = self.step {
            ensure_positive("step", step)?;
        }

        Ok(())
    }
}

/// Builder for [`BinningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct BinningConfigBuilder {
    max_bins: Option<usize>,
    nice: Option<bool>,
    step: Option<f64>,
    base: Option<u32>,
    candidate_divisors: Option<Vec<f64>>,
    min_step: Option<f64>,
}

impl BinningConfigBuilder {
    /// Set the maximum number of bins.
    pub fn max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = Some(max_bins);
        self
    }

    /// Enable or disable nice-number rounding of the step.
    pub fn nice(mut self, nice: bool) -> Self {
        self.nice = Some(nice);
        self
    }

    /// Use a fixed bin width instead of the step heuristic.
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the base for nice-number powers.
    pub fn base(mut self, base: u32) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the multipliers tried at each power of the base.
    pub fn candidate_divisors(mut self, divisors: impl Into<Vec<f64>>) -> Self {
        self.candidate_divisors = Some(divisors.into());
        self
    }

    /// Set the lower bound on the raw step.
    pub fn min_step(mut self, min_step: f64) -> Self {
        self.min_step = Some(min_step);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `BinningConfig` or an error if validation fails.
    pub fn build(self) -> Result<BinningConfig, ConfigValidationError> {
        let defaults = BinningConfig::default();
        let config = BinningConfig {
            max_bins: self.max_bins.unwrap_or(defaults.max_bins),
            nice: self.nice.unwrap_or(defaults.nice),
            step: self.step,
            base: self.base.unwrap_or(defaults.base),
            candidate_divisors: self
                .candidate_divisors
                .unwrap_or(defaults.candidate_divisors),
            min_step: self.min_step.unwrap_or(defaults.min_step),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Density Map
// =============================================================================

/// Configuration for [`crate::density::DensityMapEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DensityConfig {
    /// Smoothing exponent: the fudge term is `10^(bandwidth - 20)`.
    /// Default: 5
    #[serde(alias = "densityBandwith")]
    pub bandwidth: f64,

    /// Outcome value counted as positive (categorical outcomes) or the
    /// threshold a value must exceed (continuous outcomes).
    /// Default: None (numeric threshold 50)
    #[serde(deserialize_with = "string_or_number")]
    pub true_value: Option<String>,

    /// Grid resolution per axis.
    /// Default: 100
    pub pixels: usize,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            bandwidth: 5.0,
            true_value: None,
            pixels: 100,
        }
    }
}

impl DensityConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DensityConfigBuilder {
        DensityConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        ensure_finite("bandwidth", self.bandwidth)?;
        if self.pixels < 2 {
            return Err(ConfigValidationError::InvalidPixels(self.pixels));
        }
        Ok(())
    }
}

/// Builder for [`DensityConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct DensityConfigBuilder {
    bandwidth: Option<f64>,
    true_value: Option<String>,
    pixels: Option<usize>,
}

impl DensityConfigBuilder {
    /// Set the smoothing exponent.
    pub fn bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Set the positive outcome value or threshold.
    pub fn true_value(mut self, value: impl Into<String>) -> Self {
        self.true_value = Some(value.into());
        self
    }

    /// Set the grid resolution per axis.
    pub fn pixels(mut self, pixels: usize) -> Self {
        self.pixels = Some(pixels);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<DensityConfig, ConfigValidationError> {
        let config = DensityConfig {
            bandwidth: self.bandwidth.unwrap_or(5.0),
            true_value: self.true_value,
            pixels: self.pixels.unwrap_or(100),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Chart Synthesizers
// =============================================================================

fn validate_layout(
    width: f64,
    height: Option<f64>,
    spacing: f64,
    plot_width: Option<f64>,
    plot_height: Option<f64>,
) -> Result<(), ConfigValidationError> {
    ensure_positive("width", width)?;
    if let Some(height) = height {
        ensure_positive("height", height)?;
    }
    if !spacing.is_finite() || spacing < 0.0 {
        return Err(ConfigValidationError::NotFinite {
            field: "spacing".to_string(),
            value: spacing,
        });
    }
    if let Some(plot_width) = plot_width {
        ensure_positive("plotWidth", plot_width)?;
    }
    if let Some(plot_height) = plot_height {
        ensure_positive("plotHeight", plot_height)?;
    }
    Ok(())
}

/// Options for [`crate::charts::HistogramGrid`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistogramConfig {
    /// Variables to plot, one panel each. Empty means `[hue_in]`.
    pub vars: Vec<String>,
    pub hue_in: Option<String>,
    /// Grouping column used for bar offset and color.
    pub hue_out: Option<String>,
    pub palette: Palette,
    pub show_tooltips: Tooltips,
    pub show_grid: bool,
    #[serde(deserialize_with = "legend_or_false")]
    pub legend: Option<LegendLabels>,
    /// Default: 1000
    pub width: f64,
    /// Default: width / 2.5
    pub height: Option<f64>,
    /// Default: 20
    pub spacing: f64,
    pub plot_width: Option<f64>,
    pub plot_height: Option<f64>,
    /// Precomputed statistics per variable; significant panels get highlighted.
    #[serde(skip)]
    pub stats: Option<BTreeMap<String, GroupStats>>,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            vars: Vec::new(),
            hue_in: None,
            hue_out: None,
            palette: Palette::default(),
            show_tooltips: Tooltips::default(),
            show_grid: false,
            legend: None,
            width: 1000.0,
            height: None,
            spacing: 20.0,
            plot_width: None,
            plot_height: None,
            stats: None,
        }
    }
}

impl HistogramConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_layout(
            self.width,
            self.height,
            self.spacing,
            self.plot_width,
            self.plot_height,
        )
    }

    /// Variables to plot, falling back to the input hue.
    pub fn columns(&self) -> Result<Vec<String>, ConfigValidationError> {
        if !self.vars.is_empty() {
            return Ok(self.vars.clone());
        }
        self.hue_in
            .clone()
            .map(|hue| vec![hue])
            .ok_or(ConfigValidationError::NoVariables)
    }
}

/// Options for [`crate::charts::PairPlotMatrix`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairPlotConfig {
    /// Variables of the matrix. Empty means every numeric column.
    pub vars: Vec<String>,
    /// Hue for the diagonal and upper triangle.
    pub hue_in: Option<String>,
    /// Hue for the lower triangle. The lower triangle is hidden without it.
    pub hue_out: Option<String>,
    pub palette: Palette,
    pub show_tooltips: Tooltips,
    pub show_grid: bool,
    pub scale_zero: bool,
    /// Encode the hue as marker shape as well as color.
    pub markers: bool,
    #[serde(deserialize_with = "legend_or_false")]
    pub legend_in: Option<LegendLabels>,
    #[serde(deserialize_with = "legend_or_false")]
    pub legend_out: Option<LegendLabels>,
    pub density_in: bool,
    /// Render lower-triangle cells as density heatmaps of `hue_out`.
    pub density_out: bool,
    /// Default: 5
    #[serde(alias = "densityBandwith")]
    pub density_bandwidth: f64,
    #[serde(deserialize_with = "string_or_number")]
    pub true_value: Option<String>,
    /// Row ID pre-selected in the point-selection parameter.
    pub selected_patient: Option<CellValue>,
    /// Default: 1000
    pub width: f64,
    /// Default: width / 1.2
    pub height: Option<f64>,
    /// Default: 5
    pub spacing: f64,
    pub plot_width: Option<f64>,
    pub plot_height: Option<f64>,
}

impl Default for PairPlotConfig {
    fn default() -> Self {
        Self {
            vars: Vec::new(),
            hue_in: None,
            hue_out: None,
            palette: Palette::default(),
            show_tooltips: Tooltips::default(),
            show_grid: false,
            scale_zero: false,
            markers: false,
            legend_in: None,
            legend_out: None,
            density_in: false,
            density_out: false,
            density_bandwidth: 5.0,
            true_value: None,
            selected_patient: None,
            width: 1000.0,
            height: None,
            spacing: 5.0,
            plot_width: None,
            plot_height: None,
        }
    }
}

impl PairPlotConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_layout(
            self.width,
            self.height,
            self.spacing,
            self.plot_width,
            self.plot_height,
        )?;
        ensure_finite("densityBandwidth", self.density_bandwidth)
    }

    /// Density settings derived from the pair-plot options.
    pub fn density_config(&self) -> DensityConfig {
        DensityConfig {
            bandwidth: self.density_bandwidth,
            true_value: self.true_value.clone(),
            ..DensityConfig::default()
        }
    }
}

/// Options for [`crate::charts::TemporalGrid`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemporalConfig {
    /// Temporal features to plot, two panels each.
    pub vars: Vec<String>,
    /// Outcome group that colors the mean trajectories.
    pub hue_out: Option<String>,
    pub palette: Palette,
    pub show_tooltips: Tooltips,
    #[serde(deserialize_with = "legend_or_false")]
    pub legend: Option<LegendLabels>,
    pub selected_patient: Option<CellValue>,
    /// Default: 1600
    pub width: f64,
    /// Default: 5
    pub spacing: f64,
    pub plot_width: Option<f64>,
    /// Default: 200
    pub plot_height: Option<f64>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            vars: Vec::new(),
            hue_out: None,
            palette: Palette::default(),
            show_tooltips: Tooltips::default(),
            legend: None,
            selected_patient: None,
            width: 1600.0,
            spacing: 5.0,
            plot_width: None,
            plot_height: None,
        }
    }
}

impl TemporalConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.vars.is_empty() {
            return Err(ConfigValidationError::NoVariables);
        }
        validate_layout(
            self.width,
            None,
            self.spacing,
            self.plot_width,
            self.plot_height,
        )
    }
}
