//! Flat-file ingestion: delimited text in, [`Table`] out, and back again.
//!
//! Parsing follows RFC 4180 (quoted fields, escaped quotes, embedded
//! delimiters and newlines). Column types are inferred per column with the
//! priority Numeric → Boolean → Categorical. Recognised null markers become
//! missing values.
//!
//! # Example
//!
//! ```
//! use survey_insight::ingest::CsvReader;
//! use survey_insight::table::DataType;
//!
//! let csv = "Height,Weight,Frailty\n65.8,112,N\n71.5,136.5,Y\n,153,N\n";
//! let table = CsvReader::new().read_str(csv).unwrap();
//! assert_eq!(table.row_count(), 3);
//! assert_eq!(table.schema()[0], ("Height", DataType::Numeric));
//! assert_eq!(table.schema()[2], ("Frailty", DataType::Categorical));
//! assert_eq!(table.column(0).unwrap().null_count(), 1);
//! ```

use crate::error::{Result, SurveyError};
use crate::table::{Column, DataType, Table, ValidityBitmap};
use serde::Serialize;
use std::path::Path;

/// Null markers recognised by default.
const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "null", "NULL", "None", "NaN", "nan", "#N/A",
];

/// Delimited-text reader with type inference.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
    clean_headers: bool,
    null_markers: Vec<String>,
}

impl CsvReader {
    /// Creates a reader with comma delimiter and standard null markers.
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            clean_headers: false,
            null_markers: DEFAULT_NULL_MARKERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Sets the field delimiter (default: comma).
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Normalises header names with [`clean_header`] (default: off).
    pub fn clean_headers(mut self, clean: bool) -> Self {
        self.clean_headers = clean;
        self
    }

    /// Replaces the null markers.
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers;
        self
    }

    /// Parses delimited text into a table. The first row is the header.
    pub fn read_str(&self, input: &str) -> Result<Table> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let rows = self.split_records(input);
        let Some((header, data_rows)) = rows.split_first() else {
            return Ok(Table::new());
        };

        let headers: Vec<String> = header
            .iter()
            .map(|h| {
                if self.clean_headers {
                    clean_header(h)
                } else {
                    h.trim().to_string()
                }
            })
            .collect();
        let n_cols = headers.len();

        let mut raw_columns: Vec<Vec<&str>> = vec![Vec::with_capacity(data_rows.len()); n_cols];
        for (offset, row) in data_rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(SurveyError::CsvParse {
                    line: offset + 2,
                    message: format!("expected {n_cols} fields, got {}", row.len()),
                });
            }
            for (col_idx, field) in row.iter().enumerate() {
                raw_columns[col_idx].push(field.trim());
            }
        }

        let mut table = Table::new();
        for (name, raw) in headers.into_iter().zip(raw_columns) {
            let column = self.build_column(&raw);
            tracing::debug!(column = %name, data_type = %column.data_type(), "inferred column type");
            table.add_column(name, column)?;
        }
        Ok(table)
    }

    /// Reads and parses a file.
    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let table = self.read_str(&content)?;
        tracing::info!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "loaded table"
        );
        Ok(table)
    }

    // ── Internal parsing ─────────────────────────────────────────

    /// Splits text into records of raw fields. Empty lines are skipped.
    fn split_records(&self, input: &str) -> Vec<Vec<String>> {
        let delim = self.delimiter as char;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut row: Vec<String> = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();

        let mut finish_row = |row: &mut Vec<String>, field: &mut String| {
            row.push(std::mem::take(field));
            if row.len() == 1 && row[0].is_empty() {
                row.clear();
            } else {
                rows.push(std::mem::take(row));
            }
        };

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(c);
                }
            } else if c == '"' && field.is_empty() {
                in_quotes = true;
            } else if c == delim {
                row.push(std::mem::take(&mut field));
            } else if c == '\n' {
                finish_row(&mut row, &mut field);
            } else if c == '\r' {
                if chars.peek() != Some(&'\n') {
                    finish_row(&mut row, &mut field);
                }
            } else {
                field.push(c);
            }
        }
        if !field.is_empty() || !row.is_empty() {
            finish_row(&mut row, &mut field);
        }
        rows
    }

    fn is_null(&self, value: &str) -> bool {
        self.null_markers.iter().any(|m| m == value)
    }

    fn build_column(&self, raw: &[&str]) -> Column {
        let present: Vec<bool> = raw.iter().map(|v| !self.is_null(v)).collect();
        let values = || raw.iter().zip(&present).filter(|(_, &p)| p).map(|(v, _)| *v);

        if values().next().is_none() {
            return Column::numeric(vec![0.0; raw.len()], ValidityBitmap::all_invalid(raw.len()));
        }

        if values().all(|v| v.parse::<f64>().is_ok()) {
            let nums = raw
                .iter()
                .zip(&present)
                .map(|(v, &p)| if p { v.parse::<f64>().unwrap_or(0.0) } else { 0.0 })
                .collect();
            return Column::numeric(nums, ValidityBitmap::from_flags(present));
        }

        if values().all(|v| parse_bool(v).is_some()) {
            let bools = raw
                .iter()
                .zip(&present)
                .map(|(v, &p)| p && parse_bool(v).unwrap_or(false))
                .collect();
            return Column::boolean(bools, ValidityBitmap::from_flags(present));
        }

        let labels: Vec<Option<&str>> = raw
            .iter()
            .zip(&present)
            .map(|(v, &p)| p.then_some(*v))
            .collect();
        Column::from_labels(&labels)
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `true`/`false` (case-insensitive). Survey codes such as `Y`/`N`
/// stay categorical so they can be binary-encoded explicitly.
fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Normalises a header: strips surrounding quotes and whitespace, replaces
/// spaces and `/` with `_`.
///
/// ```
/// use survey_insight::ingest::clean_header;
///
/// assert_eq!(clean_header("\"race/ethnicity\""), "race_ethnicity");
/// assert_eq!(clean_header("math score"), "math_score");
/// ```
pub fn clean_header(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .replace([' ', '/'], "_")
}

// ── Ingestion summary ─────────────────────────────────────────────────

/// Shape, column types and missing counts of a freshly loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Number of data rows.
    pub rows: usize,
    /// Number of columns.
    pub columns: usize,
    /// `(name, type)` per column, in table order.
    pub dtypes: Vec<(String, DataType)>,
    /// `(name, missing count)` for columns with at least one missing value.
    pub missing: Vec<(String, usize)>,
}

impl IngestSummary {
    /// Summarises `table`.
    pub fn of(table: &Table) -> Self {
        Self {
            rows: table.row_count(),
            columns: table.column_count(),
            dtypes: table
                .schema()
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            missing: table
                .iter()
                .filter(|(_, c)| c.null_count() > 0)
                .map(|(n, c)| (n.to_string(), c.null_count()))
                .collect(),
        }
    }

    /// Total missing values across all columns.
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|(_, n)| n).sum()
    }
}

// ── Writing ───────────────────────────────────────────────────────────

/// Serialises `table` as comma-separated text with a header row.
///
/// Missing values become empty fields; fields containing the delimiter,
/// quotes or newlines are quoted.
pub fn to_csv_string(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.column_names().iter().map(|n| quote(n)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in 0..table.row_count() {
        let fields: Vec<String> = table
            .iter()
            .map(|(_, col)| col.key_at(row).map(|v| quote(&v)).unwrap_or_default())
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Writes `table` to `path` as CSV, creating parent directories.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_csv_string(table))?;
    tracing::info!(path = %path.display(), rows = table.row_count(), "wrote table");
    Ok(())
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
