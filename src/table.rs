//! Column-major table shared by every pipeline stage.
//!
//! The [`Table`] stores named, typed columns of equal length. Missing values
//! are tracked explicitly with a compact [`ValidityBitmap`] rather than being
//! encoded as `NaN`, so "missing" stays distinct from a computed `NaN`.
//!
//! # Column Types
//!
//! | Type | Storage | Use case |
//! |------|---------|----------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | Measurements, scores, derived ratios |
//! | [`Indicator`](Column::Indicator) | `Vec<u8>` (0/1) + bitmap | Binary and one-hot encodings |
//! | [`Boolean`](Column::Boolean) | `Vec<bool>` + bitmap | `true`/`false` input columns |
//! | [`Categorical`](Column::Categorical) | Dictionary + `Vec<u32>` | Group labels, bins, free text |
//!
//! # Example
//!
//! ```
//! use survey_insight::table::{Column, Table};
//!
//! let mut table = Table::new();
//! table
//!     .add_column("Height", Column::from_options(vec![Some(70.0), None, Some(64.0)]))
//!     .unwrap();
//! assert_eq!(table.row_count(), 3);
//! assert_eq!(table.column_by_name("Height").unwrap().null_count(), 1);
//! ```

use crate::error::{Result, SurveyError};
use std::collections::HashMap;

// ── ValidityBitmap ────────────────────────────────────────────────────

/// Per-row presence flags packed 64 to a word; a set bit means present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityBitmap {
    bits: Vec<u64>,
    len: usize,
}

#[inline]
fn word_bit(idx: usize) -> (usize, u64) {
    (idx / 64, 1u64 << (idx % 64))
}

impl ValidityBitmap {
    /// `len` rows, all present.
    pub fn all_valid(len: usize) -> Self {
        let mut bits = vec![u64::MAX; len.div_ceil(64)];
        if let (Some(last), tail @ 1..) = (bits.last_mut(), len % 64) {
            *last = (1u64 << tail) - 1;
        }
        Self { bits, len }
    }

    /// `len` rows, all missing.
    pub fn all_invalid(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn from_flags<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        let mut bitmap = Self {
            bits: Vec::new(),
            len: 0,
        };
        for valid in flags {
            bitmap.push(valid);
        }
        bitmap
    }

    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "row {idx} past end ({})", self.len);
        let (word, mask) = word_bit(idx);
        self.bits[word] & mask != 0
    }

    #[inline]
    pub fn set_valid(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "row {idx} past end ({})", self.len);
        let (word, mask) = word_bit(idx);
        self.bits[word] |= mask;
    }

    pub fn push(&mut self, valid: bool) {
        let (word, mask) = word_bit(self.len);
        if word == self.bits.len() {
            self.bits.push(0);
        }
        if valid {
            self.bits[word] |= mask;
        }
        self.len += 1;
    }

    /// Rows tracked.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn valid_count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn null_count(&self) -> usize {
        self.len - self.valid_count()
    }

    /// Present rows in ascending order.
    pub fn valid_indices(&self) -> ValidIndicesIter<'_> {
        ValidIndicesIter {
            bitmap: self,
            next: 0,
        }
    }

    /// Missing rows in ascending order.
    pub fn null_indices(&self) -> Vec<usize> {
        (0..self.len).filter(|&i| !self.is_valid(i)).collect()
    }
}

/// See [`ValidityBitmap::valid_indices`].
pub struct ValidIndicesIter<'a> {
    bitmap: &'a ValidityBitmap,
    next: usize,
}

impl Iterator for ValidIndicesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let found = (self.next..self.bitmap.len).find(|&i| self.bitmap.is_valid(i))?;
        self.next = found + 1;
        Some(found)
    }
}

// ── DataType ──────────────────────────────────────────────────────────

/// Declared type of a column. Fixed once the column is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DataType {
    /// 64-bit floating values.
    Numeric,
    /// 0/1 integers produced by the encoders.
    Indicator,
    /// `true`/`false` values.
    Boolean,
    /// Dictionary-encoded strings.
    Categorical,
}

impl DataType {
    /// Returns `true` for types that have a numeric reading
    /// (numeric, indicator, boolean as 0/1).
    pub fn is_numeric_like(self) -> bool {
        !matches!(self, Self::Categorical)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Indicator => write!(f, "Indicator"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Categorical => write!(f, "Categorical"),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column with a validity bitmap for missing values.
///
/// Missing positions hold a placeholder (0.0, 0, false, or dictionary
/// index 0) that must be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Dense `f64` values. Missing positions hold `0.0`.
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    /// 0/1 values. Missing positions hold `0`.
    Indicator {
        values: Vec<u8>,
        validity: ValidityBitmap,
    },
    /// Boolean values. Missing positions hold `false`.
    Boolean {
        values: Vec<bool>,
        validity: ValidityBitmap,
    },
    /// Dictionary-encoded strings.
    ///
    /// `dictionary` holds the distinct labels in first-seen (or declared)
    /// order; `indices` maps each row into it.
    Categorical {
        dictionary: Vec<String>,
        indices: Vec<u32>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column.
    pub fn numeric(values: Vec<f64>, validity: ValidityBitmap) -> Self {
        Self::Numeric { values, validity }
    }

    /// Creates a numeric column from optional values (`None` = missing).
    pub fn from_options(values: Vec<Option<f64>>) -> Self {
        let validity = ValidityBitmap::from_flags(values.iter().map(Option::is_some));
        let values = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        Self::Numeric { values, validity }
    }

    /// Creates a fully present numeric column.
    pub fn from_values(values: Vec<f64>) -> Self {
        let validity = ValidityBitmap::all_valid(values.len());
        Self::Numeric { values, validity }
    }

    /// Creates an indicator column from optional 0/1 values.
    ///
    /// Any non-zero value is stored as `1`.
    pub fn indicator_from_options(values: Vec<Option<u8>>) -> Self {
        let validity = ValidityBitmap::from_flags(values.iter().map(Option::is_some));
        let values = values
            .into_iter()
            .map(|v| u8::from(v.is_some_and(|b| b != 0)))
            .collect();
        Self::Indicator { values, validity }
    }

    /// Creates a boolean column.
    pub fn boolean(values: Vec<bool>, validity: ValidityBitmap) -> Self {
        Self::Boolean { values, validity }
    }

    /// Creates a categorical column from a dictionary and indices.
    pub fn categorical(
        dictionary: Vec<String>,
        indices: Vec<u32>,
        validity: ValidityBitmap,
    ) -> Self {
        Self::Categorical {
            dictionary,
            indices,
            validity,
        }
    }

    /// Creates a categorical column from optional labels.
    ///
    /// The dictionary follows first-seen order.
    pub fn from_labels<S: AsRef<str>>(labels: &[Option<S>]) -> Self {
        Self::from_labels_with_dictionary(labels, Vec::new())
    }

    /// Creates a categorical column whose dictionary starts with `declared`
    /// (in that order); labels not in `declared` are appended as seen.
    pub fn from_labels_with_dictionary<S: AsRef<str>>(
        labels: &[Option<S>],
        declared: Vec<String>,
    ) -> Self {
        let mut lookup: HashMap<String, u32> = declared
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        let mut dictionary = declared;
        let mut indices = Vec::with_capacity(labels.len());
        let mut validity = ValidityBitmap::all_invalid(0);

        for label in labels {
            match label {
                Some(label) => {
                    let label = label.as_ref();
                    let idx = match lookup.get(label) {
                        Some(&idx) => idx,
                        None => {
                            let idx = dictionary.len() as u32;
                            dictionary.push(label.to_string());
                            lookup.insert(label.to_string(), idx);
                            idx
                        }
                    };
                    indices.push(idx);
                    validity.push(true);
                }
                None => {
                    indices.push(0);
                    validity.push(false);
                }
            }
        }

        Self::Categorical {
            dictionary,
            indices,
            validity,
        }
    }

    /// Returns the data type of this column.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric { .. } => DataType::Numeric,
            Self::Indicator { .. } => DataType::Indicator,
            Self::Boolean { .. } => DataType::Boolean,
            Self::Categorical { .. } => DataType::Categorical,
        }
    }

    /// Returns the number of rows in this column.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Indicator { validity, .. }
            | Self::Boolean { validity, .. }
            | Self::Categorical { validity, .. } => validity,
        }
    }

    /// Returns the number of missing values.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Returns the number of present values.
    pub fn valid_count(&self) -> usize {
        self.validity().valid_count()
    }

    /// Returns `true` if the value at `idx` is present.
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().is_valid(idx)
    }

    /// Returns the raw numeric values, or `None` if not a numeric column.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Returns the raw indicator values, or `None` if not an indicator column.
    pub fn as_indicator(&self) -> Option<&[u8]> {
        match self {
            Self::Indicator { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Numeric reading of row `idx`: `None` if missing or categorical.
    ///
    /// Indicators read as 0.0/1.0 and booleans as 1.0 for `true`.
    pub fn numeric_at(&self, idx: usize) -> Option<f64> {
        if !self.is_valid(idx) {
            return None;
        }
        match self {
            Self::Numeric { values, .. } => Some(values[idx]),
            Self::Indicator { values, .. } => Some(f64::from(values[idx])),
            Self::Boolean { values, .. } => Some(if values[idx] { 1.0 } else { 0.0 }),
            Self::Categorical { .. } => None,
        }
    }

    /// Returns present numeric readings (missing excluded), or `None`
    /// for categorical columns.
    pub fn valid_numeric_values(&self) -> Option<Vec<f64>> {
        if !self.data_type().is_numeric_like() {
            return None;
        }
        Some(
            self.validity()
                .valid_indices()
                .filter_map(|i| self.numeric_at(i))
                .collect(),
        )
    }

    /// Returns the category label at `idx` in a categorical column.
    pub fn category_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Categorical {
                dictionary,
                indices,
                validity,
            } if validity.is_valid(idx) => {
                dictionary.get(indices[idx] as usize).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Textual key of row `idx` for grouping and output, `None` if missing.
    ///
    /// Numbers use Rust's shortest round-trip formatting.
    pub fn key_at(&self, idx: usize) -> Option<String> {
        if !self.is_valid(idx) {
            return None;
        }
        match self {
            Self::Numeric { values, .. } => Some(values[idx].to_string()),
            Self::Indicator { values, .. } => Some(values[idx].to_string()),
            Self::Boolean { values, .. } => Some(values[idx].to_string()),
            Self::Categorical { .. } => self.category_at(idx).map(str::to_string),
        }
    }
}

// ── Table ─────────────────────────────────────────────────────────────

/// Column-major tabular data structure.
///
/// Invariants: every column has the table's row count, names are unique,
/// and a column's type never changes after it is added.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Creates an empty table with no columns or rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, column)` pairs in order.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, column) in columns {
            table.add_column(name, column)?;
        }
        Ok(table)
    }

    /// Appends a named column.
    ///
    /// Fails with [`SurveyError::DuplicateColumn`] if the name is taken and
    /// with [`SurveyError::LengthMismatch`] if the length differs from the
    /// existing row count (unless this is the first column).
    pub fn add_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(SurveyError::DuplicateColumn { name });
        }
        self.check_length(&column)?;
        if self.columns.is_empty() {
            self.row_count = column.len();
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Adds `column` under `name`, replacing an existing column only when
    /// `overwrite` is set. A replacement must keep the existing type.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        column: Column,
        overwrite: bool,
    ) -> Result<()> {
        let name = name.into();
        match self.column_index(&name) {
            None => self.add_column(name, column),
            Some(_) if !overwrite => Err(SurveyError::DuplicateColumn { name }),
            Some(idx) => {
                self.check_length(&column)?;
                let existing = self.columns[idx].data_type();
                if existing != column.data_type() {
                    return Err(SurveyError::type_mismatch(
                        &name,
                        &existing.to_string(),
                        column.data_type(),
                    ));
                }
                self.columns[idx] = column;
                Ok(())
            }
        }
    }

    /// Renames a column in place.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return self.require(from).map(|_| ());
        }
        let idx = self.column_index(from).ok_or_else(|| SurveyError::not_found(from))?;
        if self.column_index(to).is_some() {
            return Err(SurveyError::DuplicateColumn {
                name: to.to_string(),
            });
        }
        self.names[idx] = to.to_string();
        Ok(())
    }

    fn check_length(&self, column: &Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.row_count {
            return Err(SurveyError::LengthMismatch {
                expected: self.row_count,
                actual: column.len(),
            });
        }
        Ok(())
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns `true` if a column with `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns a reference to the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns a reference to the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Returns the index of the column with the given `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Looks up a column, failing with [`SurveyError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column_by_name(name)
            .ok_or_else(|| SurveyError::not_found(name))
    }

    /// Looks up a column that has a numeric reading
    /// (numeric, indicator, or boolean).
    pub fn require_numeric(&self, name: &str) -> Result<&Column> {
        let column = self.require(name)?;
        if column.data_type().is_numeric_like() {
            Ok(column)
        } else {
            Err(SurveyError::type_mismatch(name, "numeric", column.data_type()))
        }
    }

    /// Looks up a column that can serve as a group key
    /// (categorical, boolean, or indicator).
    pub fn require_grouping(&self, name: &str) -> Result<&Column> {
        let column = self.require(name)?;
        if column.data_type() == DataType::Numeric {
            Err(SurveyError::type_mismatch(name, "categorical", column.data_type()))
        } else {
            Ok(column)
        }
    }

    /// Returns an iterator over `(name, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Returns the declared type of every column.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.iter().map(|(name, col)| (name, col.data_type())).collect()
    }

    /// Returns the total number of missing values across all columns.
    pub fn total_null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    /// Indices of rows whose key in `group_column` equals `group`.
    pub fn rows_where(&self, group_column: &str, group: &str) -> Result<Vec<usize>> {
        let column = self.require_grouping(group_column)?;
        Ok((0..self.row_count)
            .filter(|&i| column.key_at(i).as_deref() == Some(group))
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
