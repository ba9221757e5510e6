//! Categorical to numeric encodings.
//!
//! Binary encoding keeps missing values missing. One-hot encoding is split
//! into [`OneHotEncoder::fit`], which fixes the sorted category list, and
//! [`OneHotEncoder::apply`], which writes one indicator column per fitted
//! category. Rows whose value is missing or was not seen at fit time get
//! zeros in every indicator column; the column set never grows.
//!
//! ```
//! use survey_insight::encoding::OneHotEncoder;
//! use survey_insight::table::{Column, Table};
//!
//! let mut table = Table::from_columns([
//!     ("AgeGroup", Column::from_labels(&[Some(">60"), Some("<30"), None])),
//! ]).unwrap();
//! let encoder = OneHotEncoder::fit(&table, "AgeGroup", "AgeGroup").unwrap();
//! assert_eq!(encoder.column_names(), vec!["AgeGroup_<30", "AgeGroup_>60"]);
//!
//! encoder.apply(&mut table).unwrap();
//! let older = table.column_by_name("AgeGroup_>60").unwrap();
//! assert_eq!(older.numeric_at(0), Some(1.0));
//! assert_eq!(older.numeric_at(2), Some(0.0));
//! ```

use crate::error::{Result, SurveyError};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ── Binary ────────────────────────────────────────────────────────────

/// Encodes a two-valued column as 0/1 against a designated positive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryEncoder {
    pub source: String,
    pub target: String,
    pub positive: String,
}

impl BinaryEncoder {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        positive: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            positive: positive.into(),
        }
    }

    /// Builds the indicator column without touching the table.
    ///
    /// Fails with [`SurveyError::NotBinary`] when the source has more than
    /// two distinct present values, and with [`SurveyError::Config`] when it
    /// has two and neither is `positive`.
    pub fn encode(&self, table: &Table) -> Result<Column> {
        let source = table.require_grouping(&self.source)?;
        let keys: Vec<Option<String>> = (0..table.row_count()).map(|i| source.key_at(i)).collect();

        let distinct: BTreeSet<&str> = keys.iter().flatten().map(String::as_str).collect();
        if distinct.len() > 2 {
            return Err(SurveyError::NotBinary {
                column: self.source.clone(),
                distinct: distinct.len(),
            });
        }
        if distinct.len() == 2 && !distinct.contains(self.positive.as_str()) {
            let observed: Vec<&str> = distinct.into_iter().collect();
            return Err(SurveyError::Config(format!(
                "positive value '{}' is not one of '{}' values ({})",
                self.positive,
                self.source,
                observed.join(", ")
            )));
        }

        let values = keys
            .iter()
            .map(|k| k.as_ref().map(|k| u8::from(*k == self.positive)))
            .collect();
        Ok(Column::indicator_from_options(values))
    }

    /// Adds the indicator column to `table`.
    pub fn apply(&self, table: &mut Table) -> Result<()> {
        let column = self.encode(table)?;
        tracing::debug!(
            source = %self.source,
            target_column = %self.target,
            positive = %self.positive,
            "binary encoded"
        );
        table.add_column(self.target.clone(), column)
    }
}

// ── One-hot ───────────────────────────────────────────────────────────

/// One-hot step as written in a pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoding {
    pub source: String,
    /// Column-name prefix; defaults to the source name.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl OneHotEncoding {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prefix: None,
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.source)
    }
}

/// Fitted category-to-column mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    source: String,
    prefix: String,
    categories: Vec<String>,
}

/// Outcome of [`OneHotEncoder::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OneHotApplyReport {
    /// Indicator columns added, in category order.
    pub columns: Vec<String>,
    /// Rows with a missing source value.
    pub missing: usize,
    /// Rows whose value was not among the fitted categories.
    pub unseen: usize,
}

impl OneHotEncoder {
    /// Observes the present values of `source` and fixes them in byte order.
    pub fn fit(table: &Table, source: &str, prefix: &str) -> Result<Self> {
        let column = table.require_grouping(source)?;
        let categories: BTreeSet<String> =
            (0..table.row_count()).filter_map(|i| column.key_at(i)).collect();
        if categories.is_empty() {
            return Err(SurveyError::EmptyColumn {
                column: source.to_string(),
            });
        }
        tracing::debug!(
            source,
            categories = categories.len(),
            "fitted one-hot categories"
        );
        Ok(Self {
            source: source.to_string(),
            prefix: prefix.to_string(),
            categories: categories.into_iter().collect(),
        })
    }

    /// Column the encoder was fitted on.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fitted categories in emission order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Names of the indicator columns, `prefix_category`.
    pub fn column_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.prefix, c))
            .collect()
    }

    /// Writes one indicator column per fitted category into `table`.
    ///
    /// All target names are checked before any column is added.
    pub fn apply(&self, table: &mut Table) -> Result<OneHotApplyReport> {
        let source = table.require_grouping(&self.source)?;
        let names = self.column_names();
        if let Some(taken) = names.iter().find(|n| table.has_column(n)) {
            return Err(SurveyError::DuplicateColumn {
                name: taken.clone(),
            });
        }

        let lookup: HashMap<&str, usize> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let rows = table.row_count();
        let mut indicators = vec![vec![0u8; rows]; self.categories.len()];
        let mut report = OneHotApplyReport::default();

        for row in 0..rows {
            match source.key_at(row) {
                None => report.missing += 1,
                Some(key) => match lookup.get(key.as_str()) {
                    Some(&slot) => indicators[slot][row] = 1,
                    None => report.unseen += 1,
                },
            }
        }

        if report.unseen > 0 {
            tracing::warn!(
                source = %self.source,
                rows = report.unseen,
                "categories not seen at fit time encoded as all zeros"
            );
        }

        for (name, values) in names.iter().zip(indicators) {
            let column = Column::indicator_from_options(values.into_iter().map(Some).collect());
            table.add_column(name.clone(), column)?;
        }
        report.columns = names;
        Ok(report)
    }
}
