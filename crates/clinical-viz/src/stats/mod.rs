//! Group-wise summary statistics with automatic test selection.
//!
//! For a variable and an optional grouping column the engine reports:
//! - `N` overall and per group
//! - a per-group descriptive statistic chosen by variable type and normality
//! - one overall significance test (chi-square, ANOVA or Kruskal-Wallis)
//!
//! Degenerate inputs never fail. Empty groups report `"---"`, untestable
//! comparisons report an empty p-value.

mod descriptive;
mod hypothesis;
mod type_inference;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::types::{
    CellValue, Dataset, GroupStats, GroupSummary, OverallSummary, StatTest, VarType, cell,
};
use crate::utils::format_fixed;

pub use descriptive::{mean, quantile, quartiles, sample_std, zscore};
pub use hypothesis::{
    chi_square_test, kolmogorov_cdf, kruskal_wallis, ks_test_standard_normal, one_way_anova,
};
pub(crate) use type_inference::infer_var_type;

/// Sentinel statistic for a group without usable values.
pub const EMPTY_GROUP: &str = "---";

/// Normality threshold on the KS p-value.
const NORMALITY_ALPHA: f64 = 0.05;

/// One group of the grouping column and the rows that belong to it.
struct Partition<'a> {
    key: CellValue,
    values: Vec<&'a CellValue>,
}

/// Computes per-group summaries and the overall significance test.
pub struct StatisticsEngine;

impl StatisticsEngine {
    /// Summarize `variable`, optionally split by `group_by`.
    pub fn compute(dataset: &Dataset, variable: &str, group_by: Option<&str>) -> GroupStats {
        let values = dataset.column(variable);
        let var_type = infer_var_type(&values);
        let coded = Self::code_values(&values, var_type);
        let is_normal = var_type.is_numeric() && Self::is_normal(&coded);

        debug!(
            variable,
            var_type = var_type.as_str(),
            is_normal,
            "Inferred variable profile"
        );

        let mut stats = GroupStats {
            var_type,
            is_normal,
            all: OverallSummary {
                n: dataset.len(),
                p_value: None,
                p_value_display: None,
                test: None,
                p: None,
            },
            groups: Vec::new(),
        };

        let Some(group_by) = group_by else {
            return stats;
        };

        let partitions = Self::partition(dataset, variable, group_by);
        let mut samples: Vec<Vec<f64>> = Vec::new();

        for partition in &partitions {
            let statistics = match Self::describe(&partition.values, &values, var_type, is_normal) {
                Some((statistics, sample)) => {
                    samples.push(sample);
                    statistics
                }
                None => EMPTY_GROUP.to_string(),
            };
            stats.groups.push(GroupSummary {
                key: partition.key.clone(),
                n: partition.values.len(),
                statistics,
            });
        }

        let test = match var_type {
            VarType::Boolean | VarType::Categorical => Some(StatTest::ChiSquare),
            VarType::Integer | VarType::Float if samples.len() < 2 => None,
            VarType::Integer | VarType::Float if is_normal => Some(StatTest::Anova),
            VarType::Integer | VarType::Float => Some(StatTest::KruskalWallis),
        };

        match test {
            Some(test) => {
                let p = match test {
                    StatTest::ChiSquare => chi_square_test(&Self::crosstab(&values, &partitions)),
                    StatTest::Anova => one_way_anova(&samples),
                    StatTest::KruskalWallis => kruskal_wallis(&samples),
                };
                if p.is_none() {
                    warn!(variable, group_by, test = test.display_name(), "Test statistic undefined");
                }
                stats.all.test = Some(test);
                stats.all.p = p;
                stats.all.p_value = Some(p.map(|p| format_fixed(p, 4)).unwrap_or_default());
                stats.all.p_value_display = Some(format!(
                    "{}: {}",
                    test.display_name(),
                    p.map(|p| format_fixed(p, 4))
                        .unwrap_or_else(|| EMPTY_GROUP.to_string())
                ));
            }
            None => {
                debug!(variable, group_by, "Fewer than two non-empty groups, no test");
                stats.all.p_value = Some(String::new());
            }
        }

        stats
    }

    /// Summarize every variable in `variables` against the same grouping.
    pub fn compute_many(
        dataset: &Dataset,
        variables: &[String],
        group_by: Option<&str>,
    ) -> BTreeMap<String, GroupStats> {
        variables
            .iter()
            .map(|variable| {
                (
                    variable.clone(),
                    Self::compute(dataset, variable, group_by),
                )
            })
            .collect()
    }

    /// Numeric coding of a column. Booleans map the column-wide minimum to 0
    /// and the other code to 1.
    fn code_values(values: &[&CellValue], var_type: VarType) -> Vec<Option<f64>> {
        match var_type {
            VarType::Categorical => vec![None; values.len()],
            VarType::Boolean => {
                let min = values
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .fold(f64::INFINITY, f64::min);
                values
                    .iter()
                    .map(|v| v.as_f64().map(|x| if x - min != 0.0 { 1.0 } else { 0.0 }))
                    .collect()
            }
            VarType::Integer | VarType::Float => values.iter().map(|v| v.as_f64()).collect(),
        }
    }

    /// KS test of the z-scored column against N(0, 1).
    fn is_normal(coded: &[Option<f64>]) -> bool {
        let present: Vec<f64> = coded.iter().flatten().copied().collect();
        if present.len() < 2 {
            return false;
        }
        zscore(&present)
            .and_then(|z| ks_test_standard_normal(&z))
            .is_some_and(|p| p >= NORMALITY_ALPHA)
    }

    /// Split rows by the distinct non-null values of `group_by`.
    fn partition<'a>(dataset: &'a Dataset, variable: &str, group_by: &str) -> Vec<Partition<'a>> {
        dataset
            .distinct_values(group_by)
            .into_iter()
            .map(|key| {
                let values = dataset
                    .iter()
                    .filter(|row| cell(row, group_by).same_value(&key))
                    .map(|row| cell(row, variable))
                    .collect();
                Partition { key, values }
            })
            .collect()
    }

    /// Statistic string and numeric sample for one group, or `None` when the
    /// group has no usable values.
    fn describe(
        members: &[&CellValue],
        column: &[&CellValue],
        var_type: VarType,
        is_normal: bool,
    ) -> Option<(String, Vec<f64>)> {
        match var_type {
            VarType::Categorical => {
                let present: Vec<&CellValue> =
                    members.iter().copied().filter(|v| !v.is_null()).collect();
                if present.is_empty() {
                    return None;
                }
                let (mode, count) = most_frequent(&present)?;
                let percent = 100.0 * count as f64 / present.len() as f64;
                Some((
                    format!("{} ({}%)", mode, format_fixed(percent, 2)),
                    Vec::new(),
                ))
            }
            VarType::Boolean => {
                let min = column
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .fold(f64::INFINITY, f64::min);
                let coded: Vec<f64> = members
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|x| if x - min != 0.0 { 1.0 } else { 0.0 })
                    .collect();
                let share = mean(&coded)?;
                let positives = coded.iter().sum::<f64>();
                Some((
                    format!("{} ({}%)", positives as usize, format_fixed(100.0 * share, 2)),
                    coded,
                ))
            }
            VarType::Integer | VarType::Float => {
                let sample: Vec<f64> = members.iter().filter_map(|v| v.as_f64()).collect();
                if sample.is_empty() {
                    return None;
                }
                let statistics = if is_normal {
                    let mean = mean(&sample)?;
                    format!(
                        "{} ± {}",
                        format_fixed(mean, 2),
                        format_fixed(sample_std(&sample), 2)
                    )
                } else {
                    let (median, q1, q3) = quartiles(&sample)?;
                    format!(
                        "{} ({} to {})",
                        format_fixed(median, 2),
                        format_fixed(q1, 2),
                        format_fixed(q3, 2)
                    )
                };
                Some((statistics, sample))
            }
        }
    }

    /// Counts of each distinct value (rows) per non-empty group (columns).
    fn crosstab(column: &[&CellValue], partitions: &[Partition<'_>]) -> Vec<Vec<f64>> {
        let mut levels: Vec<&CellValue> = column.iter().copied().filter(|v| !v.is_null()).collect();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup_by(|a, b| a.same_value(b));

        let groups: Vec<&Partition<'_>> = partitions
            .iter()
            .filter(|p| p.values.iter().any(|v| !v.is_null()))
            .collect();

        levels
            .iter()
            .map(|level| {
                groups
                    .iter()
                    .map(|group| group.values.iter().filter(|v| v.same_value(level)).count() as f64)
                    .collect()
            })
            .collect()
    }
}

/// Most frequent value; ties go to the smallest value.
fn most_frequent<'a>(values: &[&'a CellValue]) -> Option<(&'a CellValue, usize)> {
    let mut sorted: Vec<&CellValue> = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(&CellValue, usize)> = None;
    let mut index = 0;
    while index < sorted.len() {
        let run = sorted[index..]
            .iter()
            .take_while(|v| v.same_value(sorted[index]))
            .count();
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((sorted[index], run));
        }
        index += run;
    }
    best
}
