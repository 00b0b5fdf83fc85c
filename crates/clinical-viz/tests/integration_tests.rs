//! Integration tests for cohort exploration.
//!
//! These tests exercise the engines and chart synthesizers end to end against
//! the fixture cohort and generated samples.

use clinical_viz::views::{
    ClinicalRequest, OutputSpaceRequest, TemporalRequest, clinical_view, output_space_view,
    temporal_view,
};
use clinical_viz::{
    BinningConfig, BinningEngine, CellValue, ClinicalBundle, Dataset, DensityCell, DensityConfig,
    DensityMapEstimator, HistogramConfig, HistogramGrid, PairPlotConfig, PairPlotMatrix, Row,
    StatTest, StatisticsEngine, TemporalConfig, TemporalGrid, VizError,
};
use pretty_assertions::assert_eq;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use statrs::distribution::{ContinuousCDF, Exp, Normal};
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_bundle() -> ClinicalBundle {
    ClinicalBundle::from_path(fixtures_path().join("cohort.json"))
        .expect("Failed to load fixture bundle")
}

fn load_cohort() -> Dataset {
    load_bundle().dataframe
}

/// Dataset with a single numeric column `value` and a random `group` in 0..groups.
fn sampled(values: Vec<f64>, groups: u32, rng: &mut StdRng) -> Dataset {
    let rows = values
        .into_iter()
        .map(|value| {
            let mut row = Row::new();
            row.insert("value".to_string(), CellValue::Number(value));
            row.insert(
                "group".to_string(),
                CellValue::Number(f64::from(rng.gen_range(0..groups))),
            );
            row
        })
        .collect();
    Dataset::new(rows)
}

fn parse_range(label: &str) -> (f64, f64) {
    let (lo, hi) = label.split_once(" - ").expect("range label");
    (lo.parse().unwrap(), hi.parse().unwrap())
}

// ============================================================================
// Binning
// ============================================================================

#[test]
fn test_binning_is_idempotent() {
    let data = load_cohort();
    let config = BinningConfig::builder().max_bins(5).build().unwrap();

    let first = BinningEngine::bin(&data, "age", &config).unwrap();
    let second = BinningEngine::bin(&data, "age", &config).unwrap();
    assert_eq!(first, second);

    // Binning the derived dataset again rewrites the same column
    let binned = BinningEngine::bin_into(&data, "age", &config).unwrap();
    let rebinned = BinningEngine::bin_into(&binned, "age", &config).unwrap();
    assert_eq!(binned, rebinned);
}

#[test]
fn test_binning_does_not_touch_the_source_dataset() {
    let data = load_cohort();
    let config = BinningConfig::default();
    let binned = BinningEngine::bin_into(&data, "age", &config).unwrap();

    assert!(!data.has_column("ageBin10"));
    assert!(binned.has_column("ageBin10"));
    assert_eq!(binned.len(), data.len());
}

#[test]
fn test_binning_covers_every_value() {
    let mut rng = StdRng::seed_from_u64(7);
    let values: Vec<f64> = (0..400).map(|_| rng.gen_range(-35.0..180.0)).collect();
    let data = sampled(values.clone(), 2, &mut rng);

    let config = BinningConfig::default();
    let binned = BinningEngine::bin(&data, "value", &config).unwrap();
    let edges = binned.edges.clone().expect("continuous path");
    let top = edges[edges.len() - 1];

    for (value, label) in values.iter().zip(&binned.labels) {
        let (lo, hi) = parse_range(label.as_deref().expect("every value is binned"));
        assert!(lo <= *value, "{} below bin {}", value, lo);
        assert!(
            *value < hi || (hi == top && *value <= hi),
            "{} above bin {}",
            value,
            hi
        );
    }
}

#[test]
fn test_categorical_fallback_boundary() {
    let data = Dataset::from_json_value(&json!([
        {"v": 1}, {"v": 2}, {"v": 3}, {"v": 4}, {"v": 5}, {"v": 3}
    ]))
    .unwrap();
    let config = BinningConfig::builder().max_bins(5).build().unwrap();
    let binned = BinningEngine::bin(&data, "v", &config).unwrap();

    assert!(binned.is_categorical());
    assert_eq!(binned.name, "vBin5");
    assert_eq!(binned.distinct_labels(), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_nice_step_for_zero_to_ninety_seven() {
    let rows: Vec<Value> = (0..=97).map(|v| json!({"v": v})).collect();
    let data = Dataset::from_json_value(&Value::Array(rows)).unwrap();
    let binned = BinningEngine::bin(&data, "v", &BinningConfig::default()).unwrap();

    assert_eq!(binned.step, Some(10.0));
    let edges = binned.edges.unwrap();
    assert_eq!(edges.first(), Some(&0.0));
    assert_eq!(edges.last(), Some(&100.0));
    assert_eq!(edges.len() - 1, 10);
    assert_eq!(binned.labels[0].as_deref(), Some("0 - 10"));
    assert_eq!(binned.labels[97].as_deref(), Some("90 - 100"));
}

#[test]
fn test_text_column_takes_literal_labels() {
    let data = load_cohort();
    let config = BinningConfig::builder().max_bins(2).build().unwrap();
    let binned = BinningEngine::bin(&data, "stage", &config).unwrap();

    assert!(binned.is_categorical());
    assert_eq!(binned.labels[0].as_deref(), Some("I"));
    assert_eq!(binned.labels[5].as_deref(), Some("IV"));
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_group_counts_sum_to_total() {
    let data = load_cohort();
    for variable in ["age", "sex", "smoker", "bmi", "stage"] {
        let stats = StatisticsEngine::compute(&data, variable, Some("death"));
        let total: usize = stats.groups.iter().map(|g| g.n).sum();
        assert_eq!(total, stats.all.n, "{}", variable);
        assert_eq!(stats.all.n, 12);
    }
}

#[test]
fn test_boolean_with_three_groups_uses_chi_square() {
    let data = Dataset::from_json_value(&json!([
        {"flag": 0, "arm": "a"}, {"flag": 1, "arm": "a"}, {"flag": 1, "arm": "a"},
        {"flag": 0, "arm": "b"}, {"flag": 0, "arm": "b"}, {"flag": 1, "arm": "b"},
        {"flag": 1, "arm": "c"}, {"flag": 1, "arm": "c"}, {"flag": 0, "arm": "c"}
    ]))
    .unwrap();

    for _ in 0..3 {
        let stats = StatisticsEngine::compute(&data, "flag", Some("arm"));
        assert_eq!(stats.all.test, Some(StatTest::ChiSquare));
        assert!(
            stats
                .all
                .p_value_display
                .as_deref()
                .unwrap()
                .starts_with("χ² Test:")
        );
        assert_eq!(stats.groups.len(), 3);
    }
}

#[test]
fn test_normal_sample_selects_anova() {
    let mut rng = StdRng::seed_from_u64(42);
    let normal = Normal::new(120.0, 15.0).unwrap();
    // Evenly spaced quantiles: a sample the KS gate cannot reject
    let values: Vec<f64> = (0..300)
        .map(|i| normal.inverse_cdf((f64::from(i) + 0.5) / 300.0))
        .collect();
    let data = sampled(values, 3, &mut rng);

    let stats = StatisticsEngine::compute(&data, "value", Some("group"));
    assert!(stats.is_normal);
    assert_eq!(stats.all.test, Some(StatTest::Anova));
    assert!(
        stats
            .all
            .p_value_display
            .as_deref()
            .unwrap()
            .starts_with("ANOVA:")
    );
    for group in &stats.groups {
        assert!(group.statistics.contains(" ± "), "{}", group.statistics);
    }
}

#[test]
fn test_skewed_sample_selects_kruskal_wallis() {
    let mut rng = StdRng::seed_from_u64(42);
    let exp = Exp::new(0.5).unwrap();
    let values: Vec<f64> = (0..300).map(|_| exp.sample(&mut rng)).collect();
    let data = sampled(values, 2, &mut rng);

    let stats = StatisticsEngine::compute(&data, "value", Some("group"));
    assert!(!stats.is_normal);
    assert_eq!(stats.all.test, Some(StatTest::KruskalWallis));
    for group in &stats.groups {
        assert!(group.statistics.contains(" to "), "{}", group.statistics);
    }
}

#[test]
fn test_empty_group_degrades_gracefully() {
    let data = Dataset::from_json_value(&json!([
        {"age": 30, "arm": 0}, {"age": 42, "arm": 0}, {"age": 55, "arm": 0},
        {"age": null, "arm": 1}, {"age": null, "arm": 1}
    ]))
    .unwrap();
    let stats = StatisticsEngine::compute(&data, "age", Some("arm"));

    let empty = stats.group("1").unwrap();
    assert_eq!(empty.n, 2);
    assert_eq!(empty.statistics, "---");
    assert_eq!(stats.all.p_value.as_deref().unwrap_or(""), "");
}

#[test]
fn test_end_to_end_age_by_sex() {
    let data = Dataset::from_json_value(&json!([
        {"ID": 1, "age": 30, "sex": 0},
        {"ID": 2, "age": 70, "sex": 1},
        {"ID": 3, "age": 50, "sex": 0}
    ]))
    .unwrap();
    let stats = StatisticsEngine::compute(&data, "age", Some("sex"));

    assert_eq!(stats.groups.len(), 2);
    let male = stats.group("0").unwrap();
    assert_eq!(male.n, 2);
    let expected = if stats.is_normal {
        "40.00 ± 14.14"
    } else {
        "40.00 (35.00 to 45.00)"
    };
    assert_eq!(male.statistics, expected);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["All"]["N"], 3);
    assert_eq!(json["0"]["N"], 2);
    assert_eq!(json["1"]["N"], 1);
    if let Some(p) = stats.all.p {
        let formatted = stats.all.p_value.clone().unwrap();
        assert_eq!(formatted.len(), 6);
        assert!((0.0..=1.0).contains(&p));
    }
}

// ============================================================================
// Density Maps
// ============================================================================

#[test]
fn test_density_grids_are_min_max_normalized() {
    let data = load_cohort();
    let config = DensityConfig::builder()
        .pixels(30)
        .true_value("1")
        .build()
        .unwrap();
    let grid = DensityMapEstimator::estimate(&data, "Dim 1", "Dim 2", "death", &config).unwrap();

    assert_eq!(grid.size, 30);
    assert_eq!(grid.cells.len(), 900);
    let fields: [fn(&DensityCell) -> f64; 2] =
        [|c| c.norm_density, |c| c.norm_density_positive];
    for field in fields {
        let values: Vec<f64> = grid.cells.iter().map(field).collect();
        assert!(values.iter().any(|v| *v == 1.0));
        assert!(values.iter().any(|v| *v == 0.0));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
    assert!(grid.cells.iter().all(|c| c.corrected_density.is_finite()));
}

#[test]
fn test_density_rejects_unknown_columns() {
    let data = load_cohort();
    let error = DensityMapEstimator::estimate(
        &data,
        "Dim 1",
        "Dim 9",
        "death",
        &DensityConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(error, VizError::ColumnNotFound(_)));
}

// ============================================================================
// Chart Synthesis
// ============================================================================

#[test]
fn test_histplot_shape() {
    let data = Dataset::from_json_value(&json!([
        {"ID": 1, "age": 30, "sex": 0},
        {"ID": 2, "age": 70, "sex": 1},
        {"ID": 3, "age": 50, "sex": 0}
    ]))
    .unwrap();
    let config = HistogramConfig {
        vars: vec!["age".to_string(), "sex".to_string()],
        width: 1000.0,
        ..HistogramConfig::default()
    };
    let spec = HistogramGrid::synthesize(&data, &config).unwrap();
    let json = spec.to_value().unwrap();

    let concat = json["concat"].as_array().unwrap();
    assert_eq!(concat.len(), 2);
    for (panel, variable) in concat.iter().zip(["age", "sex"]) {
        assert_eq!(panel["layer"][0]["encoding"]["x"]["field"], variable);
    }
    assert_eq!(json["columns"], 2);
}

#[test]
fn test_synthesizers_reject_invalid_datasets() {
    for value in [json!([]), json!({"rows": 1}), json!([1, 2])] {
        let error = Dataset::from_json_value(&value).unwrap_err();
        assert_eq!(error.error_code(), "INVALID_INPUT");
    }

    let empty = Dataset::new(Vec::new());
    assert!(HistogramGrid::synthesize(&empty, &HistogramConfig::default()).is_err());
    assert!(PairPlotMatrix::synthesize(&empty, &PairPlotConfig::default()).is_err());
    assert!(TemporalGrid::synthesize(&empty, &TemporalConfig::default()).is_err());
}

#[test]
fn test_pairplot_with_density_heatmaps() {
    let data = load_cohort();
    let config = PairPlotConfig {
        vars: vec!["Dim 1".to_string(), "Dim 2".to_string(), "Dim 3".to_string()],
        hue_out: Some("death".to_string()),
        density_out: true,
        true_value: Some("1".to_string()),
        selected_patient: Some(CellValue::Number(4.0)),
        ..PairPlotConfig::default()
    };
    let spec = PairPlotMatrix::synthesize(&data, &config).unwrap();

    assert_eq!(spec.len(), 9);
    assert_eq!(spec.columns, 3);
    let heatmap = spec.panel(3).unwrap();
    assert_eq!(heatmap["data"]["name"], "densityMap Dim 2 vs Dim 1");

    let json = spec.to_value().unwrap();
    assert_eq!(json["params"][0]["value"][0]["ID"], 4.0);
}

#[test]
fn test_temporal_grid_groups_by_length() {
    let data = load_cohort();
    let config = TemporalConfig {
        vars: vec!["ecg".to_string(), "sbp".to_string(), "hr".to_string()],
        hue_out: Some("death".to_string()),
        ..TemporalConfig::default()
    };
    let spec = TemporalGrid::synthesize(&data, &config).unwrap();

    assert_eq!(spec.len(), 6);
    let datasets = spec.datasets.as_ref().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets["length4"].len(), 12 * 4);
    assert_eq!(datasets["length3"].len(), 12 * 3);
}

// ============================================================================
// Bundle Views
// ============================================================================

#[test]
fn test_bundle_summary() {
    let bundle = load_bundle();
    let summary = bundle.summary();

    assert_eq!(summary.description.as_deref(), Some("Synthetic heart failure cohort"));
    assert_eq!(summary.rows, 12);
    assert_eq!(summary.patients, 12);
    assert_eq!(summary.dimensions, 3);
    assert_eq!(summary.input_clinical_variables, 5);
    assert_eq!(summary.temporal_features, 3);
}

#[test]
fn test_clinical_view_flags_significant_variables() {
    let bundle = load_bundle();
    let request = ClinicalRequest {
        variable: Some("age".to_string()),
        group_by: Some("death".to_string()),
        ..ClinicalRequest::default()
    };
    let view = clinical_view(&bundle, &request).unwrap();

    assert_eq!(view.matrix.len(), 5);
    let stats = view.stats.unwrap();
    assert!(stats.is_significant(), "age separates the outcome groups");
    assert_eq!(stats.groups.len(), 2);

    let json = serde_json::to_value(&view.histogram).unwrap();
    assert_eq!(
        json["concat"][0]["layer"][0]["encoding"]["color"]["legend"]["labelExpr"],
        r#"{"0":"Alive","1":"Deceased"}[datum.value]"#
    );
}

#[test]
fn test_output_space_and_temporal_views() {
    let bundle = load_bundle();

    let request = OutputSpaceRequest {
        output_variable: Some("death".to_string()),
        density: true,
        ..OutputSpaceRequest::default()
    };
    let spec = output_space_view(&bundle, &request).unwrap();
    assert_eq!(spec.len(), 9);

    let spec = temporal_view(&bundle, &TemporalRequest::default())
        .unwrap()
        .unwrap();
    assert_eq!(spec.len(), 6);

    let request = TemporalRequest {
        page: 1,
        ..TemporalRequest::default()
    };
    assert!(temporal_view(&bundle, &request).unwrap().is_none());
}
