//! Two-sample t-tests and simple linear regression.
//!
//! # Example
//!
//! ```
//! use survey_insight::inference::fit_line;
//!
//! let fit = fit_line(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0], "y on x").unwrap();
//! assert!((fit.slope - 2.0).abs() < 1e-12);
//! assert!((fit.intercept - 1.0).abs() < 1e-12);
//! assert!((fit.r_squared - 1.0).abs() < 1e-12);
//! ```

use crate::error::{Result, SurveyError};
use crate::stats::{is_constant, paired_values, two_sided_p};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── t-test ────────────────────────────────────────────────────────────

/// Variance assumption of the two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TTestKind {
    /// Unequal variances, Satterthwaite degrees of freedom.
    #[default]
    Welch,
    /// Equal variances, pooled estimate.
    Pooled,
}

/// Compares `column` between rows labelled `group_a` and `group_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    pub column: String,
    pub group_column: String,
    pub group_a: String,
    pub group_b: String,
    #[serde(default)]
    pub kind: TTestKind,
}

impl TTest {
    pub fn new(
        column: impl Into<String>,
        group_column: impl Into<String>,
        group_a: impl Into<String>,
        group_b: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            group_column: group_column.into(),
            group_a: group_a.into(),
            group_b: group_b.into(),
            kind: TTestKind::Welch,
        }
    }

    pub fn pooled(mut self) -> Self {
        self.kind = TTestKind::Pooled;
        self
    }

    fn context(&self) -> String {
        format!(
            "{:?} t-test of '{}' by '{}' ({} vs {})",
            self.kind, self.column, self.group_column, self.group_a, self.group_b
        )
    }
}

/// Statistic and p-value of a two-sample comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisTestResult {
    pub column: String,
    pub group_column: String,
    pub group_a: String,
    pub group_b: String,
    pub kind: TTestKind,
    /// `t` for `mean_a - mean_b`.
    pub statistic: f64,
    /// Two-sided.
    pub p_value: f64,
    pub df: f64,
    pub mean_a: f64,
    pub mean_b: f64,
    pub n_a: usize,
    pub n_b: usize,
}

/// `(statistic, df, p_value)` for two samples.
///
/// Fails with [`SurveyError::InsufficientData`] when either sample has
/// fewer than two values or both samples are constant.
pub fn t_test_values(a: &[f64], b: &[f64], kind: TTestKind, context: &str) -> Result<(f64, f64, f64)> {
    let smaller = a.len().min(b.len());
    if smaller < 2 {
        return Err(SurveyError::too_few(context, 2, smaller));
    }
    let degenerate = |detail: String| SurveyError::InsufficientData {
        context: context.to_string(),
        detail,
    };
    if is_constant(a) && is_constant(b) {
        return Err(degenerate("both groups have zero variance".into()));
    }

    match kind {
        TTestKind::Welch => {
            let result = u_analytics::testing::two_sample_t_test(a, b)
                .ok_or_else(|| degenerate("non-finite values or zero standard error".into()))?;
            Ok((result.statistic, result.df, result.p_value.clamp(0.0, 1.0)))
        }
        TTestKind::Pooled => {
            let too_few = || SurveyError::too_few(context, 2, smaller);
            let (na, nb) = (a.len() as f64, b.len() as f64);
            let mean_a = u_numflow::stats::mean(a).ok_or_else(too_few)?;
            let mean_b = u_numflow::stats::mean(b).ok_or_else(too_few)?;
            let var_a = u_numflow::stats::variance(a).ok_or_else(too_few)?;
            let var_b = u_numflow::stats::variance(b).ok_or_else(too_few)?;

            let df = na + nb - 2.0;
            let pooled = ((na - 1.0) * var_a + (nb - 1.0) * var_b) / df;
            let se = (pooled * (1.0 / na + 1.0 / nb)).sqrt();
            let t = (mean_a - mean_b) / se;
            let p = two_sided_p(t, df)
                .ok_or_else(|| degenerate(format!("degenerate t statistic ({t}, df {df})")))?;
            Ok((t, df, p))
        }
    }
}

/// Runs `test` against `table` using present values of each group.
pub fn t_test(table: &Table, test: &TTest) -> Result<HypothesisTestResult> {
    let values = table.require_numeric(&test.column)?;
    let sample = |group: &str| -> Result<Vec<f64>> {
        Ok(table
            .rows_where(&test.group_column, group)?
            .into_iter()
            .filter_map(|i| values.numeric_at(i))
            .collect())
    };
    let a = sample(&test.group_a)?;
    let b = sample(&test.group_b)?;

    let context = test.context();
    let (statistic, df, p_value) = t_test_values(&a, &b, test.kind, &context)?;
    tracing::debug!(
        column = %test.column,
        statistic,
        p_value,
        "t-test"
    );
    Ok(HypothesisTestResult {
        column: test.column.clone(),
        group_column: test.group_column.clone(),
        group_a: test.group_a.clone(),
        group_b: test.group_b.clone(),
        kind: test.kind,
        statistic,
        p_value,
        df,
        mean_a: u_numflow::stats::mean(&a).unwrap_or(f64::NAN),
        mean_b: u_numflow::stats::mean(&b).unwrap_or(f64::NAN),
        n_a: a.len(),
        n_b: b.len(),
    })
}

// ── Regression ────────────────────────────────────────────────────────

/// Restricts a computation to rows whose `column` key equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    pub column: String,
    pub value: String,
}

/// Regresses `y` on `x`, optionally within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub group: Option<GroupFilter>,
}

impl Regression {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            group: None,
        }
    }

    pub fn within(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.group = Some(GroupFilter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    fn context(&self) -> String {
        match &self.group {
            Some(g) => format!("regression of '{}' on '{}' where {} = {}", self.y, self.x, g.column, g.value),
            None => format!("regression of '{}' on '{}'", self.y, self.x),
        }
    }
}

/// Ordinary least-squares fit of a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFit {
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    /// Signed correlation coefficient.
    pub r: f64,
    pub r_squared: f64,
    /// Two-sided p-value for a zero slope.
    pub p_value: f64,
    /// Standard error of the slope.
    pub stderr: f64,
    pub intercept_stderr: f64,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits `y = intercept + slope * x` over paired values.
///
/// Fails with [`SurveyError::InsufficientData`] below three pairs or when
/// `x` is constant. A constant `y` gives a flat line with `r = 0` and
/// `p = 1`.
pub fn fit_line(x: &[f64], y: &[f64], context: &str) -> Result<LineFit> {
    let n = x.len().min(y.len());
    if n < 3 {
        return Err(SurveyError::too_few(context, 3, n));
    }
    let (x, y) = (&x[..n], &y[..n]);
    if is_constant(x) {
        return Err(SurveyError::zero_variance(context, "x"));
    }
    if is_constant(y) {
        return Ok(LineFit {
            n,
            slope: 0.0,
            intercept: y[0],
            r: 0.0,
            r_squared: 0.0,
            p_value: 1.0,
            stderr: 0.0,
            intercept_stderr: 0.0,
        });
    }

    let fit = u_analytics::regression::simple_linear_regression(x, y).ok_or_else(|| {
        SurveyError::InsufficientData {
            context: context.to_string(),
            detail: "non-finite values".into(),
        }
    })?;
    let r_squared = fit.r_squared.clamp(0.0, 1.0);
    let (p_value, stderr, intercept_stderr) = if r_squared >= 1.0 {
        (0.0, 0.0, 0.0)
    } else {
        (fit.slope_p.clamp(0.0, 1.0), fit.slope_se, fit.intercept_se)
    };

    Ok(LineFit {
        n,
        slope: fit.slope,
        intercept: fit.intercept,
        r: fit.slope.signum() * r_squared.sqrt(),
        r_squared,
        p_value,
        stderr,
        intercept_stderr,
    })
}

/// A fitted line tagged with the columns and group it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub x: String,
    pub y: String,
    pub group: Option<GroupFilter>,
    #[serde(flatten)]
    pub fit: LineFit,
}

/// Runs `spec` against `table` over paired present rows.
pub fn linear_regression(table: &Table, spec: &Regression) -> Result<RegressionResult> {
    let x = table.require_numeric(&spec.x)?;
    let y = table.require_numeric(&spec.y)?;
    let rows = match &spec.group {
        Some(g) => table.rows_where(&g.column, &g.value)?,
        None => (0..table.row_count()).collect(),
    };
    let (xs, ys) = paired_values(x, y, rows.into_iter());
    let fit = fit_line(&xs, &ys, &spec.context())?;
    tracing::debug!(
        x = %spec.x,
        y = %spec.y,
        n = fit.n,
        slope = fit.slope,
        r_squared = fit.r_squared,
        "fitted regression"
    );
    Ok(RegressionResult {
        x: spec.x.clone(),
        y: spec.y.clone(),
        group: spec.group.clone(),
        fit,
    })
}

/// One regression per label of `group_column`, in sorted label order.
pub fn regression_by_group(table: &Table, x: &str, y: &str, group_column: &str) -> Result<Vec<RegressionResult>> {
    let key = table.require_grouping(group_column)?;
    let labels: BTreeSet<String> = (0..table.row_count()).filter_map(|i| key.key_at(i)).collect();
    labels
        .into_iter()
        .map(|label| linear_regression(table, &Regression::new(x, y).within(group_column, label)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn prep() -> Table {
        Table::from_columns([
            (
                "reading",
                Column::from_values(vec![50.0, 60.0, 70.0, 80.0, 40.0, 55.0, 65.0, 90.0]),
            ),
            (
                "math",
                Column::from_options(vec![
                    Some(52.0),
                    Some(61.0),
                    Some(73.0),
                    Some(79.0),
                    Some(45.0),
                    None,
                    Some(60.0),
                    Some(88.0),
                ]),
            ),
            (
                "prep",
                Column::from_labels(&[
                    Some("completed"),
                    Some("completed"),
                    Some("completed"),
                    Some("completed"),
                    Some("none"),
                    Some("none"),
                    Some("none"),
                    Some("none"),
                ]),
            ),
        ])
        .unwrap()
    }

    // ── t-test ───────────────────────────────────────────────────

    #[test]
    fn welch_statistic_and_df() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let (t, df, p) = t_test_values(&a, &b, TTestKind::Welch, "test").unwrap();
        assert!((t - (-3.0 / 2.5f64.sqrt())).abs() < 1e-12);
        assert!((df - 6.25 / 1.0625).abs() < 1e-12);
        assert!(p > 0.05 && p < 0.2);

        let (tp, dfp, pp) = t_test_values(&a, &b, TTestKind::Pooled, "test").unwrap();
        assert!((tp - t).abs() < 1e-12);
        assert_eq!(dfp, 8.0);
        assert!(pp < p);
    }

    #[test]
    fn single_observation_group_is_insufficient() {
        let table = Table::from_columns([
            ("score", Column::from_values(vec![70.0, 80.0, 90.0])),
            ("g", Column::from_labels(&[Some("a"), Some("a"), Some("b")])),
        ])
        .unwrap();
        let err = t_test(&table, &TTest::new("score", "g", "a", "b")).unwrap_err();
        assert!(matches!(err, SurveyError::InsufficientData { .. }));
    }

    #[test]
    fn constant_groups_are_insufficient() {
        let err = t_test_values(&[1.0, 1.0], &[1.0, 1.0], TTestKind::Welch, "c").unwrap_err();
        assert!(matches!(err, SurveyError::InsufficientData { .. }));
        let err = t_test_values(&[0.1; 3], &[0.3; 2], TTestKind::Pooled, "c").unwrap_err();
        assert!(matches!(err, SurveyError::InsufficientData { .. }));
    }

    #[test]
    fn t_test_on_table_skips_missing() {
        let result = t_test(&prep(), &TTest::new("math", "prep", "completed", "none")).unwrap();
        assert_eq!(result.n_a, 4);
        assert_eq!(result.n_b, 3);
        assert!((result.mean_a - 66.25).abs() < 1e-12);
        assert!(result.statistic > 0.0);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn t_test_unknown_group_column() {
        assert!(matches!(
            t_test(&prep(), &TTest::new("math", "lunch", "a", "b")),
            Err(SurveyError::ColumnNotFound { .. })
        ));
    }

    // ── regression ───────────────────────────────────────────────

    #[test]
    fn exact_line() {
        let fit = fit_line(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0], "line").unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.stderr, 0.0);
        assert_eq!(fit.predict(20.0), 41.0);
    }

    #[test]
    fn noisy_line_stderr() {
        // x = 1..5, y = [2, 4, 5, 4, 5]: slope 0.6, intercept 2.2, r² = 0.6
        let fit = fit_line(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 5.0, 4.0, 5.0], "n").unwrap();
        assert!((fit.slope - 0.6).abs() < 1e-12);
        assert!((fit.intercept - 2.2).abs() < 1e-12);
        assert!((fit.r_squared - 0.6).abs() < 1e-12);
        let expected_se = (0.4f64 * 6.0 / 10.0 / 3.0).sqrt();
        assert!((fit.stderr - expected_se).abs() < 1e-12);
        assert!((fit.intercept_stderr - expected_se * (10.0f64 / 5.0 + 9.0).sqrt()).abs() < 1e-12);
        assert!(fit.p_value > 0.1 && fit.p_value < 0.15);
    }

    #[test]
    fn regression_guards() {
        assert!(matches!(
            fit_line(&[1.0, 2.0], &[1.0, 2.0], "two"),
            Err(SurveyError::InsufficientData { .. })
        ));
        assert!(matches!(
            fit_line(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0], "flat"),
            Err(SurveyError::InsufficientData { .. })
        ));
    }

    #[test]
    fn constant_x_without_exact_binary_form() {
        assert!(matches!(
            fit_line(&[0.1; 3], &[1.0, 2.0, 4.0], "flat"),
            Err(SurveyError::InsufficientData { .. })
        ));
        let table = Table::from_columns([
            ("x", Column::from_values(vec![0.1; 3])),
            ("y", Column::from_values(vec![1.0, 2.0, 4.0])),
        ])
        .unwrap();
        assert!(matches!(
            linear_regression(&table, &Regression::new("x", "y")),
            Err(SurveyError::InsufficientData { .. })
        ));
    }

    #[test]
    fn constant_y_is_a_flat_line() {
        let fit = fit_line(&[1.0, 2.0, 3.0], &[0.1; 3], "flat y").unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 0.1);
        assert_eq!(fit.r, 0.0);
        assert_eq!(fit.p_value, 1.0);
    }

    #[test]
    fn regression_within_group() {
        let table = prep();
        let result =
            linear_regression(&table, &Regression::new("reading", "math").within("prep", "none"))
                .unwrap();
        assert_eq!(result.fit.n, 3);

        let all = regression_by_group(&table, "reading", "math", "prep").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], result);
        assert_eq!(all[0].fit.n, 4);
    }
}
