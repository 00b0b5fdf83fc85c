//! Significance tests used by the statistics engine.
//!
//! Each test returns `None` when its statistic is undefined (no degrees of
//! freedom, zero within-group variance, every observation tied) so callers
//! can degrade to a sentinel instead of propagating NaN.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal};

fn upper_tail<D: ContinuousCDF<f64, f64>>(distribution: &D, statistic: f64) -> f64 {
    (1.0 - distribution.cdf(statistic)).clamp(0.0, 1.0)
}

// =============================================================================
// Chi-square Test of Independence
// =============================================================================

/// Pearson chi-square test on a contingency table (rows x columns of counts).
///
/// Rows and columns whose totals are zero are dropped first.
pub fn chi_square_test(table: &[Vec<f64>]) -> Option<f64> {
    let columns = table.first().map_or(0, Vec::len);
    let col_totals: Vec<f64> = (0..columns)
        .map(|j| table.iter().map(|row| row[j]).sum())
        .collect();
    let kept_columns: Vec<usize> = (0..columns).filter(|&j| col_totals[j] > 0.0).collect();

    let rows: Vec<Vec<f64>> = table
        .iter()
        .map(|row| kept_columns.iter().map(|&j| row[j]).collect::<Vec<f64>>())
        .filter(|row| row.iter().sum::<f64>() > 0.0)
        .collect();

    let r = rows.len();
    let c = kept_columns.len();
    if r < 2 || c < 2 {
        return None;
    }

    let row_totals: Vec<f64> = rows.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..c).map(|j| rows.iter().map(|row| row[j]).sum()).collect();
    let total: f64 = row_totals.iter().sum();

    let mut statistic = 0.0;
    for (i, row) in rows.iter().enumerate() {
        for (j, observed) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / total;
            statistic += (observed - expected).powi(2) / expected;
        }
    }

    let df = ((r - 1) * (c - 1)) as f64;
    let distribution = ChiSquared::new(df).ok()?;
    Some(upper_tail(&distribution, statistic))
}

// =============================================================================
// One-way ANOVA
// =============================================================================

/// One-way analysis of variance across groups of observations.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Option<f64> {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || n <= k {
        return None;
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in &groups {
        let group_mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - group_mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    let ms_within = ss_within / df_within;
    if ms_within <= 0.0 {
        return None;
    }

    let f = (ss_between / df_between) / ms_within;
    let distribution = FisherSnedecor::new(df_between, df_within).ok()?;
    Some(upper_tail(&distribution, f))
}

// =============================================================================
// Kruskal-Wallis H Test
// =============================================================================

/// Average ranks (1-based) of `values`, with ties sharing their mean rank.
fn average_ranks(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut tie_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = rank;
        }
        let ties = (end - start) as f64;
        tie_sum += ties.powi(3) - ties;
        start = end;
    }
    (ranks, tie_sum)
}

/// Kruskal-Wallis rank test with tie correction.
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Option<f64> {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    let k = groups.len();
    if k < 2 {
        return None;
    }

    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = pooled.len() as f64;
    let (ranks, tie_sum) = average_ranks(&pooled);

    let correction = 1.0 - tie_sum / (n.powi(3) - n);
    if correction <= 0.0 || !correction.is_finite() {
        return None;
    }

    let mut offset = 0;
    let mut rank_term = 0.0;
    for group in &groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        rank_term += rank_sum.powi(2) / group.len() as f64;
        offset += group.len();
    }

    let h = (12.0 / (n * (n + 1.0)) * rank_term - 3.0 * (n + 1.0)) / correction;
    let distribution = ChiSquared::new((k - 1) as f64).ok()?;
    Some(upper_tail(&distribution, h.max(0.0)))
}

// =============================================================================
// Kolmogorov-Smirnov Normality Test
// =============================================================================

/// One-sample KS test of `values` against the standard normal.
///
/// Returns the two-sided p-value, or `None` for an empty sample.
pub fn ks_test_standard_normal(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;

    let d = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| {
            let cdf = normal.cdf(*x);
            let above = (i + 1) as f64 / n - cdf;
            let below = cdf - i as f64 / n;
            above.max(below)
        })
        .fold(0.0_f64, f64::max);

    Some((1.0 - kolmogorov_cdf(sorted.len(), d)).clamp(0.0, 1.0))
}

/// `P(D_n < d)` for the one-sample Kolmogorov statistic.
///
/// Exact matrix-power evaluation (Marsaglia, Tsang and Wang, 2003) with the
/// large-sample approximation in the far tail.
pub fn kolmogorov_cdf(n: usize, d: f64) -> f64 {
    if d <= 0.0 {
        return 0.0;
    }
    if d >= 1.0 {
        return 1.0;
    }

    let nf = n as f64;
    let s = d * d * nf;
    if s > 7.24 || (s > 3.76 && n > 99) {
        return 1.0 - 2.0 * (-(2.000071 + 0.331 / nf.sqrt() + 1.409 / nf) * s).exp();
    }

    let k = (nf * d) as usize + 1;
    let m = 2 * k - 1;
    let h = k as f64 - nf * d;

    let mut matrix = vec![0.0; m * m];
    for i in 0..m {
        for j in 0..m {
            matrix[i * m + j] = if i + 1 >= j { 1.0 } else { 0.0 };
        }
    }
    for i in 0..m {
        matrix[i * m] -= h.powi(i as i32 + 1);
        matrix[(m - 1) * m + i] -= h.powi((m - i) as i32);
    }
    if 2.0 * h - 1.0 > 0.0 {
        matrix[(m - 1) * m] += (2.0 * h - 1.0).powi(m as i32);
    }
    for i in 0..m {
        for j in 0..m {
            if i + 1 > j {
                for g in 1..=(i + 1 - j) {
                    matrix[i * m + j] /= g as f64;
                }
            }
        }
    }

    let (power, mut exponent) = matrix_power(&matrix, 0, m, n);
    let mut value = power[(k - 1) * m + k - 1];
    for i in 1..=n {
        value = value * i as f64 / nf;
        if value < 1e-140 {
            value *= 1e140;
            exponent -= 140;
        }
    }

    (value * 10f64.powi(exponent)).clamp(0.0, 1.0)
}

fn matrix_multiply(a: &[f64], b: &[f64], m: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * m];
    for i in 0..m {
        for j in 0..m {
            out[i * m + j] = (0..m).map(|k| a[i * m + k] * b[k * m + j]).sum();
        }
    }
    out
}

/// `a^n` with a running base-10 exponent to keep entries in range.
fn matrix_power(a: &[f64], exponent_a: i32, m: usize, n: usize) -> (Vec<f64>, i32) {
    if n == 1 {
        return (a.to_vec(), exponent_a);
    }

    let (half, exponent_half) = matrix_power(a, exponent_a, m, n / 2);
    let mut result = matrix_multiply(&half, &half, m);
    let mut exponent = 2 * exponent_half;
    if n % 2 == 1 {
        result = matrix_multiply(a, &result, m);
        exponent += exponent_a;
    }

    if result[(m / 2) * m + m / 2] > 1e140 {
        result.iter_mut().for_each(|v| *v *= 1e-140);
        exponent += 140;
    }
    (result, exponent)
}
