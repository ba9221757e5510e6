//! Packages computed statistics into one ordered result object.
//!
//! [`ReportBuilder`] collects results in the order they are added. It does
//! no arithmetic beyond classifying each correlation's sign. The finished
//! [`AnalysisReport`] renders as Markdown for the report writer and as JSON
//! for the chart renderer.
//!
//! ```
//! use survey_insight::report::{CorrelationDirection, ReportBuilder};
//! use survey_insight::stats::pearson;
//! use survey_insight::table::{Column, Table};
//!
//! let table = Table::from_columns([
//!     ("Grip_kg", Column::from_values(vec![20.0, 25.0, 35.0, 40.0])),
//!     ("Frailty_binary", Column::from_values(vec![1.0, 1.0, 0.0, 0.0])),
//! ]).unwrap();
//! let report = ReportBuilder::new("Frailty")
//!     .correlation(pearson(&table, "Grip_kg", "Frailty_binary").unwrap())
//!     .build();
//!
//! assert_eq!(report.correlations[0].direction, CorrelationDirection::Negative);
//! assert!(report.to_markdown().contains("Correlation between Grip_kg and Frailty_binary: -0.9"));
//! ```

use crate::encoding::OneHotApplyReport;
use crate::error::Result;
use crate::impute::ImputeReport;
use crate::inference::{HypothesisTestResult, RegressionResult};
use crate::ingest::IngestSummary;
use crate::stats::{Correlation, CorrelationMatrix, GroupMeans, StatSummary};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Sign classification of a correlation coefficient (threshold 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
    /// The coefficient could not be computed.
    Undefined,
}

impl CorrelationDirection {
    pub fn classify(coefficient: Option<f64>) -> Self {
        match coefficient {
            Some(r) if r > 0.0 => Self::Positive,
            Some(r) if r < 0.0 => Self::Negative,
            Some(_) => Self::None,
            Option::None => Self::Undefined,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::None => "no correlation",
            Self::Undefined => "undefined",
        }
    }
}

/// A correlation with its classification and a sentence describing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationFinding {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub direction: CorrelationDirection,
    pub interpretation: String,
}

impl CorrelationFinding {
    pub fn new(correlation: Correlation) -> Self {
        let direction = CorrelationDirection::classify(correlation.coefficient);
        let (x, y) = (&correlation.x, &correlation.y);
        let interpretation = match direction {
            CorrelationDirection::Positive => format!(
                "The positive correlation indicates that higher {x} is associated with higher {y}."
            ),
            CorrelationDirection::Negative => format!(
                "The negative correlation indicates that higher {x} is associated with lower {y}."
            ),
            CorrelationDirection::None => format!("No correlation was found between {x} and {y}."),
            CorrelationDirection::Undefined => format!(
                "The correlation between {x} and {y} is undefined ({} paired observations or a constant column).",
                correlation.n
            ),
        };
        Self {
            correlation,
            direction,
            interpretation,
        }
    }
}

/// Everything one pipeline run produced, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub title: String,
    /// Display precision for Markdown tables.
    pub decimals: usize,
    pub dataset: Option<IngestSummary>,
    pub imputation: Option<ImputeReport>,
    pub one_hot: Vec<OneHotApplyReport>,
    pub summary: Option<StatSummary>,
    pub correlations: Vec<CorrelationFinding>,
    pub correlation_matrices: Vec<CorrelationMatrix>,
    pub group_means: Vec<GroupMeans>,
    pub t_tests: Vec<HypothesisTestResult>,
    pub regressions: Vec<RegressionResult>,
}

/// Accumulates results for an [`AnalysisReport`].
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    report: AnalysisReport,
}

impl ReportBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            report: AnalysisReport {
                title: title.into(),
                decimals: 2,
                dataset: None,
                imputation: None,
                one_hot: Vec::new(),
                summary: None,
                correlations: Vec::new(),
                correlation_matrices: Vec::new(),
                group_means: Vec::new(),
                t_tests: Vec::new(),
                regressions: Vec::new(),
            },
        }
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.report.decimals = decimals;
        self
    }

    pub fn dataset(mut self, summary: IngestSummary) -> Self {
        self.report.dataset = Some(summary);
        self
    }

    pub fn imputation(mut self, report: ImputeReport) -> Self {
        self.report.imputation = Some(report);
        self
    }

    pub fn one_hot(mut self, report: OneHotApplyReport) -> Self {
        self.report.one_hot.push(report);
        self
    }

    pub fn summary(mut self, summary: StatSummary) -> Self {
        self.report.summary = Some(summary);
        self
    }

    pub fn correlation(mut self, correlation: Correlation) -> Self {
        self.report.correlations.push(CorrelationFinding::new(correlation));
        self
    }

    pub fn correlation_matrix(mut self, matrix: CorrelationMatrix) -> Self {
        self.report.correlation_matrices.push(matrix);
        self
    }

    pub fn group_means(mut self, means: GroupMeans) -> Self {
        self.report.group_means.push(means);
        self
    }

    pub fn t_test(mut self, result: HypothesisTestResult) -> Self {
        self.report.t_tests.push(result);
        self
    }

    pub fn regression(mut self, result: RegressionResult) -> Self {
        self.report.regressions.push(result);
        self
    }

    pub fn build(self) -> AnalysisReport {
        self.report
    }
}

impl AnalysisReport {
    pub fn to_markdown(&self) -> String {
        self.to_string()
    }

    /// Pretty-printed JSON of the whole report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the Markdown rendering to `path`, creating parent directories.
    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_markdown())?;
        tracing::info!(path = %path.display(), "wrote report");
        Ok(())
    }

    fn num(&self, value: Option<f64>) -> String {
        fixed(value, self.decimals)
    }
}

fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => "NA".to_string(),
    }
}

// ── Markdown ──────────────────────────────────────────────────────────

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.title)?;

        if let Some(ds) = &self.dataset {
            writeln!(f, "\n## Dataset\n")?;
            writeln!(
                f,
                "{} rows, {} columns, {} missing values.",
                ds.rows,
                ds.columns,
                ds.total_missing()
            )?;
        }

        if let Some(imputed) = self.imputation.as_ref().filter(|r| !r.columns.is_empty()) {
            writeln!(f, "\n## Imputation\n")?;
            for col in &imputed.columns {
                writeln!(f, "- {}: {} values filled ({:?})", col.column, col.filled, col.strategy)?;
            }
        }

        for encoded in self.one_hot.iter().filter(|r| r.unseen > 0) {
            writeln!(
                f,
                "\n> {} rows had categories outside the fitted set and were encoded as all zeros across {}.",
                encoded.unseen,
                encoded.columns.join(", ")
            )?;
        }

        if let Some(summary) = &self.summary {
            writeln!(f, "\n## Summary Statistics\n")?;
            writeln!(f, "|  | mean | median | std |")?;
            writeln!(f, "|:--|--:|--:|--:|")?;
            for row in &summary.rows {
                writeln!(
                    f,
                    "| {} | {} | {} | {} |",
                    row.column,
                    self.num(row.mean),
                    self.num(row.median),
                    self.num(row.std)
                )?;
            }
        }

        if !self.correlations.is_empty() {
            writeln!(f, "\n## Correlations\n")?;
            for finding in &self.correlations {
                let c = &finding.correlation;
                writeln!(
                    f,
                    "Correlation between {} and {}: {}\n",
                    c.x,
                    c.y,
                    fixed(c.coefficient, 4)
                )?;
                if let Some(p) = c.p_value {
                    writeln!(f, "p = {p:.4}, n = {}\n", c.n)?;
                }
                writeln!(f, "{}\n", finding.interpretation)?;
            }
        }

        for matrix in &self.correlation_matrices {
            writeln!(f, "\n## Correlation Matrix\n")?;
            writeln!(f, "|  | {} |", matrix.columns.join(" | "))?;
            writeln!(f, "|:--|{}", "--:|".repeat(matrix.columns.len()))?;
            for (name, row) in matrix.columns.iter().zip(&matrix.values) {
                let cells: Vec<String> = row.iter().map(|v| self.num(*v)).collect();
                writeln!(f, "| {} | {} |", name, cells.join(" | "))?;
            }
        }

        for gm in &self.group_means {
            writeln!(f, "\n## Means by {}\n", gm.group_column)?;
            writeln!(f, "| {} | n | {} |", gm.group_column, gm.value_columns.join(" | "))?;
            writeln!(f, "|:--|--:|{}", "--:|".repeat(gm.value_columns.len()))?;
            for group in &gm.groups {
                let cells: Vec<String> = group.means.iter().map(|v| self.num(*v)).collect();
                writeln!(f, "| {} | {} | {} |", group.group, group.n, cells.join(" | "))?;
            }
        }

        if !self.t_tests.is_empty() {
            writeln!(f, "\n## Group Comparisons\n")?;
            writeln!(f, "| variable | groups | test | mean A | mean B | t | df | p |")?;
            writeln!(f, "|:--|:--|:--|--:|--:|--:|--:|--:|")?;
            for t in &self.t_tests {
                writeln!(
                    f,
                    "| {} | {}: {} (n={}) vs {} (n={}) | {:?} | {} | {} | {} | {} | {:.4} |",
                    t.column,
                    t.group_column,
                    t.group_a,
                    t.n_a,
                    t.group_b,
                    t.n_b,
                    t.kind,
                    self.num(Some(t.mean_a)),
                    self.num(Some(t.mean_b)),
                    self.num(Some(t.statistic)),
                    self.num(Some(t.df)),
                    t.p_value
                )?;
            }
        }

        if !self.regressions.is_empty() {
            writeln!(f, "\n## Regressions\n")?;
            writeln!(f, "| model | group | n | slope | intercept | R² | p | stderr |")?;
            writeln!(f, "|:--|:--|--:|--:|--:|--:|--:|--:|")?;
            for r in &self.regressions {
                let group = r
                    .group
                    .as_ref()
                    .map_or_else(|| "all".to_string(), |g| format!("{} = {}", g.column, g.value));
                writeln!(
                    f,
                    "| {} ~ {} | {} | {} | {} | {} | {} | {:.4} | {} |",
                    r.y,
                    r.x,
                    group,
                    r.fit.n,
                    self.num(Some(r.fit.slope)),
                    self.num(Some(r.fit.intercept)),
                    self.num(Some(r.fit.r_squared)),
                    r.fit.p_value,
                    self.num(Some(r.fit.stderr))
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{summarize, ColumnSummary};

    fn correlation(r: Option<f64>) -> Correlation {
        Correlation {
            x: "Grip_kg".into(),
            y: "Frailty_binary".into(),
            coefficient: r,
            p_value: None,
            n: 10,
        }
    }

    #[test]
    fn direction_threshold_is_zero() {
        assert_eq!(CorrelationDirection::classify(Some(1e-12)), CorrelationDirection::Positive);
        assert_eq!(CorrelationDirection::classify(Some(-0.3)), CorrelationDirection::Negative);
        assert_eq!(CorrelationDirection::classify(Some(0.0)), CorrelationDirection::None);
        assert_eq!(CorrelationDirection::classify(None), CorrelationDirection::Undefined);
        assert_eq!(CorrelationDirection::None.label(), "no correlation");
    }

    #[test]
    fn interpretation_names_columns() {
        let finding = CorrelationFinding::new(correlation(Some(-0.4782)));
        assert_eq!(
            finding.interpretation,
            "The negative correlation indicates that higher Grip_kg is associated with lower Frailty_binary."
        );
    }

    #[test]
    fn summary_table_fixed_column_order() {
        let report = ReportBuilder::new("Frailty Data Analysis Findings")
            .summary(StatSummary {
                rows: vec![
                    summarize("BMI", &[22.86, 24.0, 30.5]),
                    ColumnSummary {
                        column: "Age".into(),
                        count: 1,
                        mean: Some(71.0),
                        median: Some(71.0),
                        std: None,
                    },
                ],
            })
            .correlation(correlation(Some(-0.47824)))
            .build();
        let md = report.to_markdown();
        assert!(md.starts_with("# Frailty Data Analysis Findings\n"));
        assert!(md.contains("|  | mean | median | std |"));
        assert!(md.contains("| BMI | 25.79 | 24.00 |"));
        assert!(md.contains("| Age | 71.00 | 71.00 | NA |"));
        assert!(md.contains("Correlation between Grip_kg and Frailty_binary: -0.4782"));
    }

    #[test]
    fn correlation_sentence_stands_alone() {
        let mut with_p = correlation(Some(-0.47824));
        with_p.p_value = Some(0.16212);
        let md = ReportBuilder::new("t").correlation(with_p).build().to_markdown();
        assert!(md.contains("Correlation between Grip_kg and Frailty_binary: -0.4782\n\np = 0.1621, n = 10\n\n"));
    }

    #[test]
    fn undefined_correlation_rendered_as_na() {
        let report = ReportBuilder::new("t").correlation(correlation(None)).build();
        assert!(report.to_markdown().contains("Frailty_binary: NA"));
        assert_eq!(report.correlations[0].direction, CorrelationDirection::Undefined);
    }

    #[test]
    fn json_is_stable() {
        let build = || {
            ReportBuilder::new("t")
                .correlation(correlation(Some(0.25)))
                .build()
        };
        let a = build().to_json().unwrap();
        let b = build().to_json().unwrap();
        assert_eq!(a, b);
        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(value["correlations"][0]["direction"], "Positive");
        assert_eq!(value["correlations"][0]["coefficient"], 0.25);
    }

    #[test]
    fn write_markdown_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("findings.md");
        let report = ReportBuilder::new("Findings").build();
        report.write_markdown(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Findings\n");
    }
}
