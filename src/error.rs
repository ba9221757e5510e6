//! Error types for survey-insight.

use thiserror::Error;

/// All errors produced by survey-insight operations.
///
/// Every failure is terminal for the single transform or statistic being
/// computed. Transforms never leave a table partially updated.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// A column an operation reads from does not exist.
    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },

    /// A column exists but holds the wrong kind of values.
    #[error("column '{column}' is {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// The target column name is already taken and overwrite was not requested.
    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },

    /// Every value in the column is missing, so no fill statistic exists.
    #[error("column '{column}' has no non-missing values")]
    EmptyColumn { column: String },

    /// Too few observations (or zero variance) for the requested statistic.
    #[error("insufficient data for {context}: {detail}")]
    InsufficientData { context: String, detail: String },

    /// A pipeline stage depends on a column absent from the input table.
    #[error("required column '{column}' missing for stage '{stage}'")]
    MissingRequiredColumn { column: String, stage: String },

    /// CSV parsing failed.
    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: usize, message: String },

    /// A column's length does not match the table's row count.
    #[error("expected {expected} rows, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A binning specification has gaps, overlaps, or mismatched labels.
    #[error("invalid binning: {0}")]
    InvalidBinning(String),

    /// Binary encoding was requested for a column with more than two values.
    #[error("column '{column}' has {distinct} distinct values, binary encoding needs at most 2")]
    NotBinary { column: String, distinct: usize },

    /// Pipeline configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading input or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SurveyError {
    pub(crate) fn not_found(name: &str) -> Self {
        Self::ColumnNotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn type_mismatch(column: &str, expected: &str, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            column: column.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Fewer observations than `min_required`.
    pub(crate) fn too_few(context: &str, min_required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.to_string(),
            detail: format!("need at least {min_required} observations, got {actual}"),
        }
    }

    pub(crate) fn zero_variance(context: &str, column: &str) -> Self {
        Self::InsufficientData {
            context: context.to_string(),
            detail: format!("column '{column}' has zero variance"),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SurveyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_column() {
        let err = SurveyError::not_found("Height");
        assert_eq!(err.to_string(), "column 'Height' not found");

        let err = SurveyError::too_few("Welch t-test on 'math_score'", 2, 1);
        assert_eq!(
            err.to_string(),
            "insufficient data for Welch t-test on 'math_score': need at least 2 observations, got 1"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SurveyError = io.into();
        assert!(matches!(err, SurveyError::Io(_)));
    }
}
