//! CLI entry point for cohort exploration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use clinical_viz::views::{
    ClinicalRequest, OutputSpaceRequest, TemporalRequest, clinical_view, output_space_view,
    temporal_view,
};
use clinical_viz::{
    BinningConfig, BinningEngine, ClinicalBundle, Dataset, DensityConfig, DensityMapEstimator,
    GroupStats, HistogramConfig, HistogramGrid, PairPlotMatrix, StatisticsEngine, TemporalConfig,
    TemporalGrid,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// CLI-compatible view selector
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliView {
    /// Histogram and statistics of the clinical variables
    Clinical,
    /// Pair plot of the embedding dimensions
    OutputSpace,
    /// One page of temporal features
    Temporal,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clinical cohort exploration: binning, group statistics and chart specs",
    long_about = "Computes bins, grouped statistics, density maps and Vega-Lite chart\n\
                  specifications from a JSON cohort.\n\n\
                  Inputs are either a bare array of row objects or a cohort bundle\n\
                  whose \"dataframe\" key holds the rows.\n\n\
                  EXAMPLES:\n  \
                  # Overview of an uploaded bundle\n  \
                  clinical-viz summary -i cohort.json\n\n  \
                  # Age statistics per outcome\n  \
                  clinical-viz stats -i cohort.json --variable age --group-by death\n\n  \
                  # Output space pair plot written to a file\n  \
                  clinical-viz view output-space -i cohort.json -r request.json -o chart.json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only the JSON result is written.
    #[arg(long, global = true)]
    json: bool,

    /// Write the result to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Item counts of a cohort bundle
    Summary {
        /// Path to the bundle JSON file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Bin one column into discrete labels
    Bin {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        variable: String,
        #[arg(long, default_value = "5")]
        max_bins: usize,
        /// Explicit bin width, bypassing the nice step search
        #[arg(long)]
        step: Option<f64>,
    },

    /// Per-group statistics and the overall significance test
    Stats {
        #[arg(short, long)]
        input: PathBuf,
        /// Variable to summarize (repeatable)
        #[arg(long, required = true)]
        variable: Vec<String>,
        #[arg(long)]
        group_by: Option<String>,
    },

    /// Outcome density grid over two coordinate columns
    Density {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short = 'x', long)]
        x: String,
        #[arg(short = 'y', long)]
        y: String,
        #[arg(long)]
        outcome: String,
        #[arg(long, default_value = "5")]
        bandwidth: f64,
        /// Outcome value counted as positive
        #[arg(long)]
        true_value: Option<String>,
        #[arg(long, default_value = "70")]
        pixels: usize,
    },

    /// Grid of histograms
    Histplot {
        #[arg(short, long)]
        input: PathBuf,
        /// Histogram options as a JSON file
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Scatter / density pair plot
    Pairplot {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Temporal feature grid
    Temporal {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// One of the bundle views
    View {
        #[arg(value_enum)]
        view: CliView,
        /// Path to the bundle JSON file
        #[arg(short, long)]
        input: PathBuf,
        /// View request as a JSON file
        #[arg(short, long)]
        request: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so stdout
/// only carries the result.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let result = match &args.command {
        Command::Summary { input } => {
            let bundle = ClinicalBundle::from_path(input)?;
            let summary = bundle.summary();
            if !args.json && args.output.is_none() {
                println!("\nCOHORT SUMMARY");
                println!("{}", "-".repeat(40));
                if let Some(description) = &summary.description {
                    println!("  {}", description);
                }
                println!("  Rows:                 {}", summary.rows);
                println!("  Patients:             {}", summary.patients);
                println!("  Dimensions:           {}", summary.dimensions);
                println!("  Input variables:      {}", summary.input_clinical_variables);
                println!("  Output variables:     {}", summary.output_clinical_variables);
                println!("  Group-by variables:   {}", summary.group_by_variables);
                println!("  Temporal features:    {}", summary.temporal_features);
                return Ok(());
            }
            serde_json::to_value(summary)?
        }

        Command::Bin {
            input,
            variable,
            max_bins,
            step,
        } => {
            let dataset = load_dataset(input)?;
            let mut builder = BinningConfig::builder().max_bins(*max_bins);
            if let Some(step) = step {
                builder = builder.step(*step);
            }
            let binned = BinningEngine::bin(&dataset, variable, &builder.build()?)?;
            info!(
                column = %binned.name,
                bins = binned.distinct_labels().len(),
                "Binned column"
            );
            serde_json::to_value(binned)?
        }

        Command::Stats {
            input,
            variable,
            group_by,
        } => {
            let dataset = load_dataset(input)?;
            let stats = StatisticsEngine::compute_many(&dataset, variable, group_by.as_deref());
            if !args.json && args.output.is_none() {
                print_stats(&stats);
                return Ok(());
            }
            serde_json::to_value(stats)?
        }

        Command::Density {
            input,
            x,
            y,
            outcome,
            bandwidth,
            true_value,
            pixels,
        } => {
            let dataset = load_dataset(input)?;
            let mut builder = DensityConfig::builder()
                .bandwidth(*bandwidth)
                .pixels(*pixels);
            if let Some(value) = true_value {
                builder = builder.true_value(value.as_str());
            }
            let grid = DensityMapEstimator::estimate(&dataset, x, y, outcome, &builder.build()?)?;
            serde_json::to_value(grid)?
        }

        Command::Histplot { input, options } => {
            let dataset = load_dataset(input)?;
            let config: HistogramConfig = load_options(options.as_deref())?;
            HistogramGrid::synthesize(&dataset, &config)?.to_value()?
        }

        Command::Pairplot { input, options } => {
            let dataset = load_dataset(input)?;
            let config = load_options(options.as_deref())?;
            PairPlotMatrix::synthesize(&dataset, &config)?.to_value()?
        }

        Command::Temporal { input, options } => {
            let dataset = load_dataset(input)?;
            let config: TemporalConfig = load_options(options.as_deref())?;
            TemporalGrid::synthesize(&dataset, &config)?.to_value()?
        }

        Command::View {
            view,
            input,
            request,
        } => {
            let bundle = ClinicalBundle::from_path(input)?;
            match view {
                CliView::Clinical => {
                    let request: ClinicalRequest = load_options(request.as_deref())?;
                    serde_json::to_value(clinical_view(&bundle, &request)?)?
                }
                CliView::OutputSpace => {
                    let request: OutputSpaceRequest = load_options(request.as_deref())?;
                    output_space_view(&bundle, &request)?.to_value()?
                }
                CliView::Temporal => {
                    let request: TemporalRequest = load_options(request.as_deref())?;
                    let page = request.page;
                    temporal_view(&bundle, &request)?
                        .ok_or_else(|| anyhow!("No temporal features on page {}", page))?
                        .to_value()?
                }
            }
        }
    };

    write_result(&result, args.output.as_deref())
}

/// Load rows from either a bare array or a bundle's `dataframe`.
fn load_dataset(path: &Path) -> Result<Dataset> {
    debug!("Loading dataset from: {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Input file not found: {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let rows = match value.get("dataframe") {
        Some(rows) => rows,
        None => &value,
    };
    let dataset = Dataset::from_json_value(rows)?;
    info!(rows = dataset.len(), "Dataset loaded successfully");
    Ok(dataset)
}

/// Parse an options file, or use the defaults when none was given.
fn load_options<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Options file not found: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid options in {}", path.display()))
}

fn write_result(value: &Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Note: this uses `println!` for user-facing CLI output.
fn print_stats(stats: &std::collections::BTreeMap<String, GroupStats>) {
    for (variable, stats) in stats {
        println!("\n{} ({})", variable, stats.var_type.as_str());
        println!("{}", "-".repeat(60));
        println!("{:<24} {:<8} {}", "Group", "N", "Statistic");
        println!("{:<24} {:<8}", "All", stats.all.n);
        for group in &stats.groups {
            println!(
                "{:<24} {:<8} {}",
                truncate_str(&group.key.to_string(), 23),
                group.n,
                group.statistics
            );
        }
        if let (Some(test), Some(p_value)) = (stats.all.test, &stats.all.p_value) {
            let marker = if stats.is_significant() { " *" } else { "" };
            println!("{}: p = {}{}", test.display_name(), p_value, marker);
        }
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
