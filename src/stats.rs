//! Descriptive statistics, Pearson correlation, and group means.
//!
//! All computations read only present values. Undefined results (standard
//! deviation of one value, correlation against a constant column) are
//! reported as `None` rather than as errors; errors are reserved for
//! missing or mistyped columns.

use crate::error::Result;
use crate::table::{Column, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use u_numflow::special::t_distribution_cdf;

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
pub(crate) fn two_sided_p(t: f64, df: f64) -> Option<f64> {
    if !t.is_finite() || !(df > 0.0) {
        return None;
    }
    Some((2.0 * (1.0 - t_distribution_cdf(t.abs(), df))).clamp(0.0, 1.0))
}

/// `true` if every value equals the first.
///
/// Exact comparison: a mean-centred sum of squares of `[0.1; 3]` is not zero.
pub(crate) fn is_constant(values: &[f64]) -> bool {
    values.split_first().map_or(true, |(first, rest)| rest.iter().all(|v| v == first))
}

/// Present `(x, y)` pairs for rows where both columns have a value.
pub(crate) fn paired_values(x: &Column, y: &Column, rows: impl Iterator<Item = usize>) -> (Vec<f64>, Vec<f64>) {
    rows.filter_map(|i| Some((x.numeric_at(i)?, y.numeric_at(i)?)))
        .unzip()
}

// ── Descriptive ───────────────────────────────────────────────────────

/// Mean, median and sample standard deviation of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    /// Present values.
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// N−1 denominator; `None` below two values.
    pub std: Option<f64>,
}

/// Per-column summaries in request order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatSummary {
    pub rows: Vec<ColumnSummary>,
}

impl StatSummary {
    pub fn get(&self, column: &str) -> Option<&ColumnSummary> {
        self.rows.iter().find(|r| r.column == column)
    }
}

/// Summarises one numeric reading.
pub fn summarize(name: &str, values: &[f64]) -> ColumnSummary {
    let std = if values.len() < 2 {
        None
    } else {
        u_numflow::stats::std_dev(values)
    };
    ColumnSummary {
        column: name.to_string(),
        count: values.len(),
        mean: u_numflow::stats::mean(values),
        median: u_numflow::stats::median(values),
        std,
    }
}

/// Summarises each named column of `table`.
///
/// ```
/// use survey_insight::stats::describe;
/// use survey_insight::table::{Column, Table};
///
/// let table = Table::from_columns([
///     ("Age", Column::from_options(vec![Some(20.0), Some(40.0), None, Some(60.0)])),
/// ]).unwrap();
/// let summary = describe(&table, &["Age"]).unwrap();
/// let age = summary.get("Age").unwrap();
/// assert_eq!(age.count, 3);
/// assert_eq!(age.mean, Some(40.0));
/// assert_eq!(age.median, Some(40.0));
/// assert!((age.std.unwrap() - 20.0).abs() < 1e-12);
/// ```
pub fn describe<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<StatSummary> {
    let rows = columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let values = table
                .require_numeric(name)?
                .valid_numeric_values()
                .unwrap_or_default();
            Ok(summarize(name, &values))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(StatSummary { rows })
}

// ── Correlation ───────────────────────────────────────────────────────

/// Pearson correlation between two columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub x: String,
    pub y: String,
    /// `None` with fewer than two pairs or a constant column.
    pub coefficient: Option<f64>,
    /// Two-sided, t with n−2 degrees of freedom.
    pub p_value: Option<f64>,
    /// Paired present rows.
    pub n: usize,
}

/// Coefficient and p-value over paired values.
///
/// Both are `None` below two pairs or when either side is constant. Two
/// distinct pairs give `±1` with no p-value.
fn pearson_pair(x: &[f64], y: &[f64]) -> (Option<f64>, Option<f64>) {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    if n < 2 || is_constant(x) || is_constant(y) {
        return (None, None);
    }
    if n == 2 {
        return (Some(((x[1] - x[0]) * (y[1] - y[0])).signum()), None);
    }
    match u_analytics::correlation::pearson(x, y) {
        Some(result) => (Some(result.r), Some(result.p_value)),
        None => (None, None),
    }
}

/// Coefficient over paired values; `None` if undefined.
pub fn pearson_values(x: &[f64], y: &[f64]) -> Option<f64> {
    pearson_pair(x, y).0
}

/// p-value for a coefficient `r` over `n` pairs.
pub fn correlation_p_value(r: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    if r.abs() >= 1.0 {
        return Some(0.0);
    }
    let df = (n - 2) as f64;
    two_sided_p(r * (df / ((1.0 - r) * (1.0 + r))).sqrt(), df)
}

/// Pearson correlation of `x` and `y` over rows where both are present.
pub fn pearson(table: &Table, x: &str, y: &str) -> Result<Correlation> {
    let xc = table.require_numeric(x)?;
    let yc = table.require_numeric(y)?;
    let (xs, ys) = paired_values(xc, yc, 0..table.row_count());
    let (coefficient, p_value) = pearson_pair(&xs, &ys);
    if coefficient.is_none() {
        tracing::debug!(x, y, n = xs.len(), "correlation undefined");
    }
    Ok(Correlation {
        x: x.to_string(),
        y: y.to_string(),
        coefficient,
        p_value,
        n: xs.len(),
    })
}

/// Symmetric matrix of pairwise coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `values[i][j] == values[j][i]`, diagonal `Some(1.0)`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Off-diagonal entries `(a, b, r)` with `a` before `b`.
    pub fn upper_triangle(&self) -> Vec<(&str, &str, Option<f64>)> {
        let k = self.columns.len();
        let mut out = Vec::with_capacity(k * k.saturating_sub(1) / 2);
        for i in 0..k {
            for j in (i + 1)..k {
                out.push((self.columns[i].as_str(), self.columns[j].as_str(), self.values[i][j]));
            }
        }
        out
    }
}

/// Pairwise correlations among `columns`.
///
/// Each pair uses its own paired present rows. Only the upper triangle is
/// computed; the lower triangle mirrors it.
///
/// ```
/// use survey_insight::stats::correlation_matrix;
/// use survey_insight::table::{Column, Table};
///
/// let table = Table::from_columns([
///     ("math", Column::from_values(vec![50.0, 60.0, 70.0, 80.0])),
///     ("reading", Column::from_values(vec![55.0, 58.0, 75.0, 79.0])),
/// ]).unwrap();
/// let m = correlation_matrix(&table, &["math", "reading"]).unwrap();
/// assert_eq!(m.get("math", "math"), Some(1.0));
/// assert_eq!(m.get("math", "reading"), m.get("reading", "math"));
/// ```
pub fn correlation_matrix<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<CorrelationMatrix> {
    let cols = columns
        .iter()
        .map(|c| table.require_numeric(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let k = cols.len();
    let mut values = vec![vec![None; k]; k];
    for i in 0..k {
        values[i][i] = Some(1.0);
        for j in (i + 1)..k {
            let (xs, ys) = paired_values(cols[i], cols[j], 0..table.row_count());
            let r = pearson_values(&xs, &ys);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        values,
    })
}

// ── Group means ───────────────────────────────────────────────────────

/// Means of the value columns within one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: String,
    /// Rows carrying this group label.
    pub n: usize,
    /// One entry per value column, `None` if the group has no present value.
    pub means: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMeans {
    pub group_column: String,
    pub value_columns: Vec<String>,
    /// Sorted by group label.
    pub groups: Vec<GroupMean>,
}

impl GroupMeans {
    pub fn mean(&self, group: &str, column: &str) -> Option<f64> {
        let j = self.value_columns.iter().position(|c| c == column)?;
        self.groups.iter().find(|g| g.group == group)?.means[j]
    }
}

/// Per-group means of `values`, grouped by `group_column`.
///
/// Rows with a missing group label are skipped.
pub fn group_means<S: AsRef<str>>(table: &Table, group_column: &str, values: &[S]) -> Result<GroupMeans> {
    let key = table.require_grouping(group_column)?;
    let cols = values
        .iter()
        .map(|c| table.require_numeric(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut rows_by_group: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for row in 0..table.row_count() {
        if let Some(k) = key.key_at(row) {
            rows_by_group.entry(k).or_default().push(row);
        }
    }

    let groups = rows_by_group
        .into_iter()
        .map(|(group, rows)| {
            let means = cols
                .iter()
                .map(|col| {
                    let present: Vec<f64> = rows.iter().filter_map(|&i| col.numeric_at(i)).collect();
                    u_numflow::stats::mean(&present)
                })
                .collect();
            GroupMean {
                group,
                n: rows.len(),
                means,
            }
        })
        .collect();

    Ok(GroupMeans {
        group_column: group_column.to_string(),
        value_columns: values.iter().map(|c| c.as_ref().to_string()).collect(),
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurveyError;

    fn scores() -> Table {
        Table::from_columns([
            ("math", Column::from_options(vec![Some(72.0), Some(69.0), Some(90.0), Some(47.0), None])),
            ("reading", Column::from_options(vec![Some(72.0), Some(90.0), Some(95.0), Some(57.0), Some(78.0)])),
            ("writing", Column::from_options(vec![Some(74.0), Some(88.0), Some(93.0), Some(44.0), Some(75.0)])),
            ("constant", Column::from_values(vec![1.0; 5])),
            (
                "gender",
                Column::from_labels(&[Some("female"), Some("female"), Some("female"), Some("male"), None]),
            ),
        ])
        .unwrap()
    }

    // ── describe ─────────────────────────────────────────────────

    #[test]
    fn describe_skips_missing() {
        let summary = describe(&scores(), &["math"]).unwrap();
        let math = &summary.rows[0];
        assert_eq!(math.count, 4);
        assert_eq!(math.mean, Some(69.5));
        assert_eq!(math.median, Some(70.5));
        let expected_std = ((2.5f64.powi(2) + 0.5f64.powi(2) + 20.5f64.powi(2) + 22.5f64.powi(2)) / 3.0).sqrt();
        assert!((math.std.unwrap() - expected_std).abs() < 1e-9);
    }

    #[test]
    fn describe_single_value_has_no_std() {
        let table = Table::from_columns([("x", Column::from_options(vec![Some(3.0), None]))]).unwrap();
        let s = describe(&table, &["x"]).unwrap();
        assert_eq!(s.rows[0].mean, Some(3.0));
        assert_eq!(s.rows[0].std, None);
    }

    #[test]
    fn describe_keeps_request_order_and_rejects_text() {
        let s = describe(&scores(), &["writing", "math"]).unwrap();
        assert_eq!(s.rows[0].column, "writing");
        assert!(matches!(
            describe(&scores(), &["gender"]),
            Err(SurveyError::TypeMismatch { .. })
        ));
    }

    // ── correlation ──────────────────────────────────────────────

    #[test]
    fn pearson_symmetric_and_bounded() {
        let table = scores();
        let names = ["math", "reading", "writing"];
        for a in names {
            for b in names {
                let ab = pearson(&table, a, b).unwrap().coefficient.unwrap();
                let ba = pearson(&table, b, a).unwrap().coefficient.unwrap();
                assert_eq!(ab, ba);
                assert!((-1.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn pearson_uses_paired_rows() {
        let c = pearson(&scores(), "math", "reading").unwrap();
        assert_eq!(c.n, 4);
        assert!(c.p_value.is_some());
    }

    #[test]
    fn pearson_perfect_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        assert!((pearson_values(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson_values(&x, &neg).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(correlation_p_value(1.0, 4), Some(0.0));
    }

    #[test]
    fn pearson_undefined_cases() {
        let c = pearson(&scores(), "math", "constant").unwrap();
        assert_eq!(c.coefficient, None);
        assert_eq!(c.p_value, None);
        assert_eq!(pearson_values(&[1.0], &[2.0]), None);
    }

    #[test]
    fn constant_column_without_exact_binary_form() {
        let flat = [0.1; 3];
        let y = [1.0, 2.0, 4.0];
        assert_eq!(pearson_values(&flat, &y), None);
        assert_eq!(pearson_values(&y, &flat), None);
        assert_eq!(pearson_values(&[0.7; 5], &[1.0, 2.0, 3.0, 4.0, 6.0]), None);

        let table = Table::from_columns([
            ("x", Column::from_values(flat.to_vec())),
            ("y", Column::from_values(y.to_vec())),
        ])
        .unwrap();
        let c = pearson(&table, "x", "y").unwrap();
        assert_eq!(c.coefficient, None);
        assert_eq!(c.p_value, None);
        let m = correlation_matrix(&table, &["x", "y"]).unwrap();
        assert_eq!(m.get("x", "y"), None);
        assert_eq!(m.get("x", "x"), Some(1.0));
    }

    #[test]
    fn two_pairs_are_perfectly_correlated() {
        assert_eq!(pearson_values(&[1.0, 2.0], &[5.0, 3.0]), Some(-1.0));
        let table = Table::from_columns([
            ("x", Column::from_values(vec![1.0, 2.0])),
            ("y", Column::from_values(vec![3.0, 5.0])),
        ])
        .unwrap();
        let c = pearson(&table, "x", "y").unwrap();
        assert_eq!(c.coefficient, Some(1.0));
        assert_eq!(c.p_value, None);
    }

    #[test]
    fn correlation_p_value_known() {
        // r = 0.5, n = 10: t = 0.5 * sqrt(8 / 0.75) = 1.63299, p ≈ 0.1411
        let p = correlation_p_value(0.5, 10).unwrap();
        assert!((p - 0.1411).abs() < 1e-3);
        assert_eq!(correlation_p_value(0.5, 2), None);
    }

    #[test]
    fn matrix_symmetric_with_unit_diagonal() {
        let m = correlation_matrix(&scores(), &["math", "reading", "writing", "constant"]).unwrap();
        for i in 0..4 {
            assert_eq!(m.values[i][i], Some(1.0));
            for j in 0..4 {
                assert_eq!(m.values[i][j], m.values[j][i]);
            }
        }
        assert_eq!(m.get("math", "constant"), None);
        assert_eq!(
            m.get("math", "reading"),
            pearson(&scores(), "math", "reading").unwrap().coefficient
        );
        assert_eq!(m.upper_triangle().len(), 6);
    }

    // ── group means ──────────────────────────────────────────────

    #[test]
    fn group_means_sorted_and_skip_missing_labels() {
        let gm = group_means(&scores(), "gender", &["math", "reading"]).unwrap();
        let labels: Vec<&str> = gm.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(labels, vec!["female", "male"]);
        assert_eq!(gm.groups[0].n, 3);
        assert_eq!(gm.mean("female", "math"), Some(77.0));
        assert_eq!(gm.mean("male", "reading"), Some(57.0));
        assert_eq!(gm.mean("other", "math"), None);
    }

    #[test]
    fn group_means_needs_grouping_column() {
        assert!(matches!(
            group_means(&scores(), "math", &["reading"]),
            Err(SurveyError::TypeMismatch { .. })
        ));
    }
}
