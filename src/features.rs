//! Derived columns: ratios (BMI), row means, and binned labels.
//!
//! Every derivation reads its inputs, builds the complete new column, and
//! only then adds it to the table. A failure leaves the table untouched.
//! Missing inputs produce missing outputs; nothing is encoded as `NaN`.

use crate::binning::BinningSpec;
use crate::error::{Result, SurveyError};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};

// ── Rounding ──────────────────────────────────────────────────────────

/// Rounds `x` to `decimals` places, resolving exact ties to the even digit.
///
/// ```
/// use survey_insight::features::round_half_even;
///
/// assert_eq!(round_half_even(22.857142857, 2), 22.86);
/// assert_eq!(round_half_even(0.125, 2), 0.12);
/// assert_eq!(round_half_even(2.5, 0), 2.0);
/// ```
pub fn round_half_even(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round_ties_even() / factor
}

fn maybe_round(x: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(d) => round_half_even(x, d),
        None => x,
    }
}

// ── Ratio ─────────────────────────────────────────────────────────────

fn default_power() -> i32 {
    1
}

/// `target = numerator / denominator^power`, optionally rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioFeature {
    pub numerator: String,
    pub denominator: String,
    #[serde(default = "default_power")]
    pub power: i32,
    pub target: String,
    /// Terminal rounding; intermediate values are never rounded.
    #[serde(default)]
    pub decimals: Option<u32>,
}

impl RatioFeature {
    /// `target = numerator / denominator^power`, unrounded.
    pub fn new(
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        power: i32,
        target: impl Into<String>,
    ) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            power,
            target: target.into(),
            decimals: None,
        }
    }

    /// Rounds results half-to-even at `decimals` places.
    pub fn rounded(mut self, decimals: u32) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// Body-mass index from kilogram and metre columns, rounded to 2 places.
    pub fn bmi(weight_kg: &str, height_m: &str, target: &str) -> Self {
        Self::new(weight_kg, height_m, 2, target).rounded(2)
    }

    /// Ratio for one pair of values; `None` if either is missing or the
    /// divisor is zero.
    pub fn compute(&self, numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
        let divisor = denominator?.powi(self.power);
        if divisor == 0.0 {
            return None;
        }
        Some(maybe_round(numerator? / divisor, self.decimals))
    }
}

/// BMI for a single observation: `round(weight_kg / height_m², 2)`.
///
/// ```
/// use survey_insight::features::bmi;
///
/// assert_eq!(bmi(70.0, 1.75), Some(22.86));
/// assert_eq!(bmi(70.0, 0.0), None);
/// ```
pub fn bmi(weight_kg: f64, height_m: f64) -> Option<f64> {
    RatioFeature::bmi("", "", "").compute(Some(weight_kg), Some(height_m))
}

/// Adds the ratio column described by `step`.
pub fn ratio(table: &mut Table, step: &RatioFeature) -> Result<()> {
    let numerator = table.require_numeric(&step.numerator)?;
    let denominator = table.require_numeric(&step.denominator)?;
    let values: Vec<Option<f64>> = (0..table.row_count())
        .map(|i| step.compute(numerator.numeric_at(i), denominator.numeric_at(i)))
        .collect();
    let column = Column::from_options(values);
    tracing::debug!(
        target_column = %step.target,
        missing = column.null_count(),
        "derived ratio"
    );
    table.add_column(step.target.clone(), column)
}

// ── Row mean ──────────────────────────────────────────────────────────

/// `target` = arithmetic mean of `sources`, row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMean {
    pub sources: Vec<String>,
    pub target: String,
    #[serde(default)]
    pub decimals: Option<u32>,
}

impl RowMean {
    pub fn new<S: Into<String>>(sources: impl IntoIterator<Item = S>, target: impl Into<String>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
            decimals: None,
        }
    }
}

/// Adds the row-mean column described by `step`.
///
/// A row with any missing contributor gets a missing mean.
///
/// ```
/// use survey_insight::features::{row_mean, RowMean};
/// use survey_insight::table::{Column, Table};
///
/// let mut table = Table::from_columns([
///     ("math", Column::from_options(vec![Some(72.0), Some(90.0)])),
///     ("reading", Column::from_options(vec![Some(72.0), None])),
///     ("writing", Column::from_options(vec![Some(75.0), Some(88.0)])),
/// ]).unwrap();
/// row_mean(&mut table, &RowMean::new(["math", "reading", "writing"], "overall")).unwrap();
///
/// let overall = table.column_by_name("overall").unwrap();
/// assert_eq!(overall.numeric_at(0), Some(73.0));
/// assert_eq!(overall.numeric_at(1), None);
/// ```
pub fn row_mean(table: &mut Table, step: &RowMean) -> Result<()> {
    if step.sources.is_empty() {
        return Err(SurveyError::Config(format!(
            "row mean '{}' has no source columns",
            step.target
        )));
    }
    let sources = step
        .sources
        .iter()
        .map(|name| table.require_numeric(name))
        .collect::<Result<Vec<_>>>()?;

    let n = sources.len() as f64;
    let values: Vec<Option<f64>> = (0..table.row_count())
        .map(|i| {
            let mut sum = 0.0;
            for column in &sources {
                sum += column.numeric_at(i)?;
            }
            Some(maybe_round(sum / n, step.decimals))
        })
        .collect();
    let column = Column::from_options(values);
    tracing::debug!(
        target_column = %step.target,
        sources = step.sources.len(),
        missing = column.null_count(),
        "derived row mean"
    );
    table.add_column(step.target.clone(), column)
}

// ── Binning ───────────────────────────────────────────────────────────

/// Bins `source` into the categorical column `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinFeature {
    pub source: String,
    pub target: String,
    pub spec: BinningSpec,
}

impl BinFeature {
    pub fn new(source: impl Into<String>, target: impl Into<String>, spec: BinningSpec) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            spec,
        }
    }
}

/// Maps every value of `column` to its bin label.
///
/// The dictionary lists the bin labels in declared order; the default label
/// is appended only if some value falls outside every bin. Missing values
/// stay missing.
pub fn bin_column(name: &str, column: &Column, spec: &BinningSpec) -> Result<Column> {
    if !column.data_type().is_numeric_like() {
        return Err(SurveyError::type_mismatch(name, "numeric", column.data_type()));
    }
    let labels: Vec<Option<&str>> = (0..column.len())
        .map(|i| column.numeric_at(i).map(|v| spec.assign(v)))
        .collect();

    let defaulted = labels
        .iter()
        .filter(|l| **l == Some(spec.default_label()))
        .count();
    if defaulted > 0 {
        tracing::warn!(
            column = name,
            count = defaulted,
            label = spec.default_label(),
            "values outside every bin"
        );
    }

    let declared = spec.labels().into_iter().map(str::to_string).collect();
    Ok(Column::from_labels_with_dictionary(&labels, declared))
}

/// Adds the binned column described by `step`.
///
/// ```
/// use survey_insight::binning::BinningSpec;
/// use survey_insight::features::{bin, BinFeature};
/// use survey_insight::table::{Column, Table};
///
/// let mut table = Table::from_columns([
///     ("Age", Column::from_options(vec![Some(45.0), None])),
/// ]).unwrap();
/// bin(&mut table, &BinFeature::new("Age", "AgeGroup", BinningSpec::age_groups())).unwrap();
///
/// let groups = table.column_by_name("AgeGroup").unwrap();
/// assert_eq!(groups.category_at(0), Some("30–45"));
/// assert_eq!(groups.category_at(1), None);
/// ```
pub fn bin(table: &mut Table, step: &BinFeature) -> Result<()> {
    let source = table.require(&step.source)?;
    let column = bin_column(&step.source, source, &step.spec)?;
    tracing::debug!(
        source = %step.source,
        target_column = %step.target,
        bins = step.spec.bins().len(),
        "binned column"
    );
    table.add_column(step.target.clone(), column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::DEFAULT_LABEL;

    // ── rounding ─────────────────────────────────────────────────

    #[test]
    fn half_even_ties() {
        assert_eq!(round_half_even(0.5, 0), 0.0);
        assert_eq!(round_half_even(1.5, 0), 2.0);
        assert_eq!(round_half_even(-2.5, 0), -2.0);
        assert_eq!(round_half_even(22.857_142, 2), 22.86);
        assert_eq!(round_half_even(3.0, 2), 3.0);
    }

    // ── ratio ────────────────────────────────────────────────────

    fn body() -> Table {
        Table::from_columns([
            (
                "Weight_kg",
                Column::from_options(vec![Some(70.0), Some(80.0), None, Some(60.0)]),
            ),
            (
                "Height_m",
                Column::from_options(vec![Some(1.75), Some(0.0), Some(1.6), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn bmi_reference_value() {
        assert_eq!(bmi(70.0, 1.75), Some(22.86));
    }

    #[test]
    fn bmi_column_missing_on_zero_or_missing_inputs() {
        let mut table = body();
        ratio(&mut table, &RatioFeature::bmi("Weight_kg", "Height_m", "BMI")).unwrap();
        let col = table.require("BMI").unwrap();
        assert_eq!(col.numeric_at(0), Some(22.86));
        assert_eq!(col.numeric_at(1), None);
        assert_eq!(col.numeric_at(2), None);
        assert_eq!(col.numeric_at(3), None);
    }

    #[test]
    fn unrounded_ratio_keeps_precision() {
        let mut table = body();
        ratio(&mut table, &RatioFeature::new("Weight_kg", "Height_m", 2, "raw")).unwrap();
        let raw = table.require("raw").unwrap().numeric_at(0).unwrap();
        assert!((raw - 70.0 / 3.0625).abs() < 1e-12);
    }

    #[test]
    fn ratio_failure_leaves_table_unchanged() {
        let mut table = body();
        let before = table.clone();
        let err = ratio(&mut table, &RatioFeature::new("Weight_kg", "Nope", 1, "x")).unwrap_err();
        assert!(matches!(err, SurveyError::ColumnNotFound { .. }));
        assert_eq!(table, before);

        let err = ratio(&mut table, &RatioFeature::new("Weight_kg", "Height_m", 1, "Height_m"))
            .unwrap_err();
        assert!(matches!(err, SurveyError::DuplicateColumn { .. }));
        assert_eq!(table, before);
    }

    // ── row mean ─────────────────────────────────────────────────

    #[test]
    fn row_mean_of_three_scores() {
        let mut table = Table::from_columns([
            ("math", Column::from_values(vec![72.0, 69.0])),
            ("reading", Column::from_values(vec![72.0, 90.0])),
            ("writing", Column::from_values(vec![74.0, 88.0])),
        ])
        .unwrap();
        row_mean(&mut table, &RowMean::new(["math", "reading", "writing"], "overall")).unwrap();
        let col = table.require("overall").unwrap();
        assert!((col.numeric_at(0).unwrap() - 218.0 / 3.0).abs() < 1e-12);
        assert!((col.numeric_at(1).unwrap() - 247.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn row_mean_rejects_categorical_and_empty() {
        let mut table = Table::from_columns([
            ("score", Column::from_values(vec![1.0])),
            ("g", Column::from_labels(&[Some("a")])),
        ])
        .unwrap();
        assert!(matches!(
            row_mean(&mut table, &RowMean::new(["score", "g"], "m")),
            Err(SurveyError::TypeMismatch { .. })
        ));
        assert!(matches!(
            row_mean(&mut table, &RowMean::new(Vec::<String>::new(), "m")),
            Err(SurveyError::Config(_))
        ));
        assert!(!table.has_column("m"));
    }

    // ── binning ──────────────────────────────────────────────────

    #[test]
    fn bin_ages_with_missing_and_dictionary_order() {
        let mut table = Table::from_columns([(
            "Age",
            Column::from_options(vec![Some(61.0), Some(29.0), None, Some(46.0), Some(30.0)]),
        )])
        .unwrap();
        bin(&mut table, &BinFeature::new("Age", "AgeGroup", BinningSpec::age_groups())).unwrap();

        let col = table.require("AgeGroup").unwrap();
        let labels: Vec<Option<&str>> = (0..5).map(|i| col.category_at(i)).collect();
        assert_eq!(
            labels,
            vec![Some(">60"), Some("<30"), None, Some("46–60"), Some("30–45")]
        );
        match col {
            Column::Categorical { dictionary, .. } => {
                assert_eq!(dictionary, &vec!["<30", "30–45", "46–60", ">60"]);
            }
            _ => panic!("expected categorical"),
        }
    }

    #[test]
    fn out_of_range_gets_default_label_not_missing() {
        let spec = BinningSpec::performance_categories();
        let col = Column::from_options(vec![Some(101.0), None, Some(75.0)]);
        let binned = bin_column("overall", &col, &spec).unwrap();
        assert_eq!(binned.category_at(0), Some(DEFAULT_LABEL));
        assert_eq!(binned.category_at(1), None);
        assert_eq!(binned.category_at(2), Some("Excellent"));
    }

    #[test]
    fn bin_rejects_categorical_source() {
        let col = Column::from_labels(&[Some("old")]);
        assert!(matches!(
            bin_column("Age", &col, &BinningSpec::age_groups()),
            Err(SurveyError::TypeMismatch { .. })
        ));
    }
}
