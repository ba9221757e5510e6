//! Missing-value imputation.
//!
//! Numeric columns are filled with the median of their present values.
//! Categorical, boolean, and indicator columns are filled with their most
//! frequent present value; ties go to the value encountered first in row
//! order. Fill values for every column are computed before any column is
//! written, so an [`EmptyColumn`](crate::error::SurveyError::EmptyColumn)
//! failure leaves the table untouched.
//!
//! ```
//! use survey_insight::impute::impute;
//! use survey_insight::table::{Column, Table};
//!
//! let mut table = Table::from_columns([
//!     ("x", Column::from_options(vec![Some(1.0), Some(2.0), None, Some(4.0)])),
//! ]).unwrap();
//! let report = impute(&mut table).unwrap();
//!
//! assert_eq!(table.column_by_name("x").unwrap().numeric_at(2), Some(2.0));
//! assert_eq!(report.total_filled(), 1);
//! ```

use crate::error::{Result, SurveyError};
use crate::table::{Column, Table};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// How a column's fill value was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImputeStrategy {
    Median,
    Mode,
}

/// The value written into missing positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FillValue {
    Number(f64),
    Indicator(u8),
    Boolean(bool),
    Category(String),
}

/// One imputed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputedColumn {
    pub column: String,
    pub strategy: ImputeStrategy,
    pub value: FillValue,
    pub filled: usize,
}

/// Columns filled by [`impute`], in table order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ImputeReport {
    pub columns: Vec<ImputedColumn>,
}

impl ImputeReport {
    pub fn total_filled(&self) -> usize {
        self.columns.iter().map(|c| c.filled).sum()
    }
}

enum Fill {
    Number(f64),
    Indicator(u8),
    Boolean(bool),
    Category(u32),
}

/// Most frequent value; ties resolved by first occurrence.
fn first_mode<T: Copy + Eq + Hash>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (order, v) in values.enumerate() {
        counts.entry(v).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(v, _)| v)
}

fn plan(name: &str, column: &Column) -> Result<(Fill, ImputeStrategy, FillValue)> {
    let empty = || SurveyError::EmptyColumn {
        column: name.to_string(),
    };
    let validity = column.validity();
    match column {
        Column::Numeric { values, .. } => {
            let present: Vec<f64> = validity.valid_indices().map(|i| values[i]).collect();
            let median = u_numflow::stats::median(&present).ok_or_else(empty)?;
            Ok((
                Fill::Number(median),
                ImputeStrategy::Median,
                FillValue::Number(median),
            ))
        }
        Column::Indicator { values, .. } => {
            let mode = first_mode(validity.valid_indices().map(|i| values[i])).ok_or_else(empty)?;
            Ok((
                Fill::Indicator(mode),
                ImputeStrategy::Mode,
                FillValue::Indicator(mode),
            ))
        }
        Column::Boolean { values, .. } => {
            let mode = first_mode(validity.valid_indices().map(|i| values[i])).ok_or_else(empty)?;
            Ok((
                Fill::Boolean(mode),
                ImputeStrategy::Mode,
                FillValue::Boolean(mode),
            ))
        }
        Column::Categorical {
            dictionary,
            indices,
            ..
        } => {
            let mode = first_mode(validity.valid_indices().map(|i| indices[i])).ok_or_else(empty)?;
            let label = dictionary.get(mode as usize).cloned().ok_or_else(empty)?;
            Ok((
                Fill::Category(mode),
                ImputeStrategy::Mode,
                FillValue::Category(label),
            ))
        }
    }
}

fn fill(column: &mut Column, with: &Fill) {
    match (column, with) {
        (Column::Numeric { values, validity }, Fill::Number(v)) => {
            for i in validity.null_indices() {
                values[i] = *v;
                validity.set_valid(i);
            }
        }
        (Column::Indicator { values, validity }, Fill::Indicator(v)) => {
            for i in validity.null_indices() {
                values[i] = *v;
                validity.set_valid(i);
            }
        }
        (Column::Boolean { values, validity }, Fill::Boolean(v)) => {
            for i in validity.null_indices() {
                values[i] = *v;
                validity.set_valid(i);
            }
        }
        (Column::Categorical { indices, validity, .. }, Fill::Category(v)) => {
            for i in validity.null_indices() {
                indices[i] = *v;
                validity.set_valid(i);
            }
        }
        _ => {}
    }
}

/// Fills every missing value in `table`, column by column.
///
/// Columns without missing values are left alone and do not appear in the
/// report.
pub fn impute(table: &mut Table) -> Result<ImputeReport> {
    let mut plans = Vec::new();
    let mut report = ImputeReport::default();
    for (index, (name, column)) in table.iter().enumerate() {
        let filled = column.null_count();
        if filled == 0 {
            continue;
        }
        let (fill, strategy, value) = plan(name, column)?;
        plans.push((index, fill));
        report.columns.push(ImputedColumn {
            column: name.to_string(),
            strategy,
            value,
            filled,
        });
    }

    for (index, with) in &plans {
        if let Some(column) = table.column_mut(*index) {
            fill(column, with);
        }
    }
    for imputed in &report.columns {
        tracing::debug!(
            column = %imputed.column,
            filled = imputed.filled,
            strategy = ?imputed.strategy,
            "imputed missing values"
        );
    }
    Ok(report)
}
