//! Pipeline configuration.
//!
//! A [`PipelineConfig`] lists every step of one run. It is handed to
//! [`Pipeline::new`](crate::pipeline::Pipeline::new) and lives exactly as
//! long as that pipeline. It is loaded from JSON or built from one of the
//! study presets.
//!
//! ```
//! use survey_insight::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{
//!     "title": "Heights",
//!     "conversions": [
//!         { "source": "Height", "target": "Height_m", "scale": 0.0254 }
//!     ],
//!     "summary_columns": ["Height_m"]
//! }"#).unwrap();
//! assert_eq!(config.decimals, 2);
//! assert_eq!(config.required_columns(), vec![("Height".to_string(), "convert")]);
//! ```

use crate::binning::BinningSpec;
use crate::convert::{UnitConversion, INCHES_TO_METERS, POUNDS_TO_KILOGRAMS};
use crate::encoding::{BinaryEncoder, OneHotEncoding};
use crate::error::{Result, SurveyError};
use crate::features::{BinFeature, RatioFeature, RowMean};
use crate::inference::{Regression, TTest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Renames `from` to `to` before any other step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Correlation between two named columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub x: String,
    pub y: String,
}

/// Per-group means of `columns` grouped by `group_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMeansSpec {
    pub group_column: String,
    pub columns: Vec<String>,
}

/// Every step of one pipeline run, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub title: String,
    pub renames: Vec<Rename>,
    pub conversions: Vec<UnitConversion>,
    pub ratios: Vec<RatioFeature>,
    pub row_means: Vec<RowMean>,
    pub binnings: Vec<BinFeature>,
    pub binary_encodings: Vec<BinaryEncoder>,
    pub one_hot_encodings: Vec<OneHotEncoding>,
    /// Fill missing values after all derivations and encodings.
    pub impute: bool,
    pub summary_columns: Vec<String>,
    pub correlations: Vec<ColumnPair>,
    pub correlation_matrices: Vec<Vec<String>>,
    pub group_means: Vec<GroupMeansSpec>,
    pub t_tests: Vec<TTest>,
    pub regressions: Vec<Regression>,
    /// Display precision of the Markdown report.
    pub decimals: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Analysis".to_string(),
            renames: Vec::new(),
            conversions: Vec::new(),
            ratios: Vec::new(),
            row_means: Vec::new(),
            binnings: Vec::new(),
            binary_encodings: Vec::new(),
            one_hot_encodings: Vec::new(),
            impute: false,
            summary_columns: Vec::new(),
            correlations: Vec::new(),
            correlation_matrices: Vec::new(),
            group_means: Vec::new(),
            t_tests: Vec::new(),
            regressions: Vec::new(),
            decimals: 2,
        }
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Frailty survey: imperial units to SI, BMI, age groups, frailty flag,
    /// summary of body measures and the grip-strength/frailty correlation.
    pub fn frailty() -> Self {
        Self {
            title: "Frailty Data Analysis Findings".to_string(),
            renames: vec![Rename {
                from: "Grip strength".into(),
                to: "Grip_kg".into(),
            }],
            conversions: vec![
                UnitConversion::new("Height", "Height_m", INCHES_TO_METERS, 0.0),
                UnitConversion::new("Weight", "Weight_kg", POUNDS_TO_KILOGRAMS, 0.0),
            ],
            ratios: vec![RatioFeature::bmi("Weight_kg", "Height_m", "BMI")],
            binnings: vec![BinFeature::new("Age", "AgeGroup", BinningSpec::age_groups())],
            binary_encodings: vec![BinaryEncoder::new("Frailty", "Frailty_binary", "Y")],
            one_hot_encodings: vec![OneHotEncoding::new("AgeGroup")],
            summary_columns: strings(&[
                "Height", "Weight", "Height_m", "Weight_kg", "BMI", "Age", "Grip_kg",
            ]),
            correlations: vec![ColumnPair {
                x: "Grip_kg".into(),
                y: "Frailty_binary".into(),
            }],
            ..Self::default()
        }
    }

    /// Student performance: imputation, overall average and performance
    /// category, subject correlations, group comparisons, and per-group
    /// math-on-reading regressions.
    pub fn student_performance() -> Self {
        let subjects = strings(&["math_score", "reading_score", "writing_score"]);
        let mut summary = subjects.clone();
        summary.push("overall_avg".into());

        Self {
            title: "Student Performance Findings".to_string(),
            row_means: vec![RowMean::new(subjects.clone(), "overall_avg")],
            binnings: vec![BinFeature::new(
                "overall_avg",
                "performance_category",
                BinningSpec::performance_categories(),
            )],
            impute: true,
            summary_columns: summary.clone(),
            correlation_matrices: vec![subjects],
            group_means: vec![
                GroupMeansSpec {
                    group_column: "gender".into(),
                    columns: strings(&["math_score", "reading_score"]),
                },
                GroupMeansSpec {
                    group_column: "test_preparation_course".into(),
                    columns: strings(&["math_score"]),
                },
                GroupMeansSpec {
                    group_column: "lunch".into(),
                    columns: summary,
                },
            ],
            t_tests: vec![
                TTest::new("math_score", "gender", "male", "female"),
                TTest::new("reading_score", "gender", "male", "female"),
                TTest::new("math_score", "test_preparation_course", "completed", "none"),
                TTest::new("overall_avg", "lunch", "standard", "free/reduced"),
            ],
            regressions: vec![
                Regression::new("reading_score", "math_score")
                    .within("test_preparation_course", "completed"),
                Regression::new("reading_score", "math_score")
                    .within("test_preparation_course", "none"),
            ],
            ..Self::default()
        }
    }

    /// Rejects configurations that cannot run on any table.
    pub fn validate(&self) -> Result<()> {
        let mut targets = HashSet::new();
        let produced = self
            .renames
            .iter()
            .map(|r| r.to.as_str())
            .chain(self.conversions.iter().map(|c| c.target.as_str()))
            .chain(self.ratios.iter().map(|r| r.target.as_str()))
            .chain(self.row_means.iter().map(|r| r.target.as_str()))
            .chain(self.binnings.iter().map(|b| b.target.as_str()))
            .chain(self.binary_encodings.iter().map(|b| b.target.as_str()));
        for target in produced {
            if !targets.insert(target) {
                return Err(SurveyError::Config(format!(
                    "column '{target}' is produced by more than one step"
                )));
            }
        }
        if let Some(step) = self.row_means.iter().find(|m| m.sources.is_empty()) {
            return Err(SurveyError::Config(format!(
                "row mean '{}' has no source columns",
                step.target
            )));
        }
        if let Some(m) = self.correlation_matrices.iter().find(|m| m.len() < 2) {
            return Err(SurveyError::Config(format!(
                "correlation matrix over {m:?} needs at least two columns"
            )));
        }
        if let Some(t) = self.t_tests.iter().find(|t| t.group_a == t.group_b) {
            return Err(SurveyError::Config(format!(
                "t-test of '{}' compares group '{}' with itself",
                t.column, t.group_a
            )));
        }
        Ok(())
    }

    /// Columns read by the statistics stage, in configuration order.
    pub fn analysed_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.summary_columns.iter().map(String::as_str).collect();
        for c in &self.correlations {
            names.extend([c.x.as_str(), c.y.as_str()]);
        }
        names.extend(self.correlation_matrices.iter().flatten().map(String::as_str));
        for g in &self.group_means {
            names.push(&g.group_column);
            names.extend(g.columns.iter().map(String::as_str));
        }
        for t in &self.t_tests {
            names.extend([t.column.as_str(), t.group_column.as_str()]);
        }
        for r in &self.regressions {
            names.extend([r.x.as_str(), r.y.as_str()]);
            if let Some(g) = &r.group {
                names.push(&g.column);
            }
        }
        names
    }

    /// Input columns this configuration reads that no earlier step produces,
    /// paired with the first stage that needs them.
    ///
    /// One-hot columns of a binned source are known by name. One-hot
    /// columns of any other source depend on the data and are left to the
    /// check [`Pipeline`](crate::pipeline::Pipeline) runs before statistics.
    pub fn required_columns(&self) -> Vec<(String, &'static str)> {
        let mut produced: HashSet<String> = HashSet::new();
        let mut open_prefixes: Vec<String> = Vec::new();
        let mut required: Vec<(String, &'static str)> = Vec::new();

        let mut need = |name: &str, stage: &'static str, produced: &HashSet<String>, open: &[String]| {
            let deferred = open.iter().any(|p| name.starts_with(p.as_str()));
            if !produced.contains(name) && !deferred && !required.iter().any(|(n, _)| n == name) {
                required.push((name.to_string(), stage));
            }
        };

        for r in &self.renames {
            need(&r.from, "rename", &produced, &open_prefixes);
            produced.insert(r.to.clone());
        }
        for c in &self.conversions {
            need(&c.source, "convert", &produced, &open_prefixes);
            produced.insert(c.target.clone());
        }
        for r in &self.ratios {
            need(&r.numerator, "features", &produced, &open_prefixes);
            need(&r.denominator, "features", &produced, &open_prefixes);
            produced.insert(r.target.clone());
        }
        for m in &self.row_means {
            for s in &m.sources {
                need(s, "features", &produced, &open_prefixes);
            }
            produced.insert(m.target.clone());
        }
        for b in &self.binnings {
            need(&b.source, "features", &produced, &open_prefixes);
            produced.insert(b.target.clone());
        }
        for b in &self.binary_encodings {
            need(&b.source, "encode", &produced, &open_prefixes);
            produced.insert(b.target.clone());
        }
        for o in &self.one_hot_encodings {
            need(&o.source, "encode", &produced, &open_prefixes);
            match self.binnings.iter().find(|b| b.target == o.source) {
                Some(b) => {
                    let labels = b.spec.labels().into_iter().chain([b.spec.default_label()]);
                    produced.extend(labels.map(|l| format!("{}_{l}", o.prefix())));
                }
                None => open_prefixes.push(format!("{}_", o.prefix())),
            }
        }

        for name in self.analysed_columns() {
            need(name, "stats", &produced, &open_prefixes);
        }
        required
    }
}
