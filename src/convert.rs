//! Unit conversion: element-wise `value * scale + offset` on numeric columns.
//!
//! ```
//! use survey_insight::convert::{convert, UnitConversion, INCHES_TO_METERS};
//! use survey_insight::table::{Column, Table};
//!
//! let mut table = Table::from_columns([
//!     ("Height", Column::from_options(vec![Some(70.0), None])),
//! ]).unwrap();
//! let step = UnitConversion::new("Height", "Height_m", INCHES_TO_METERS, 0.0);
//! convert(&mut table, &step, false).unwrap();
//!
//! let h = table.column_by_name("Height_m").unwrap();
//! assert!((h.numeric_at(0).unwrap() - 1.778).abs() < 1e-12);
//! assert_eq!(h.numeric_at(1), None);
//! ```

use crate::error::{Result, SurveyError};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};

/// Exact inch-to-metre factor.
pub const INCHES_TO_METERS: f64 = 0.0254;

/// Exact avoirdupois pound-to-kilogram factor.
pub const POUNDS_TO_KILOGRAMS: f64 = 0.453_592_37;

/// One conversion step: read `source`, write `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub source: String,
    pub target: String,
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

impl UnitConversion {
    /// `target = source * scale + offset`.
    pub fn new(source: impl Into<String>, target: impl Into<String>, scale: f64, offset: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            scale,
            offset,
        }
    }

    /// The conversion that undoes this one (`target` back to `source`).
    ///
    /// Panics in debug builds if `scale` is zero.
    pub fn inverse(&self) -> Self {
        debug_assert!(self.scale != 0.0, "zero scale has no inverse");
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
            scale: 1.0 / self.scale,
            offset: -self.offset / self.scale,
        }
    }
}

/// Applies `value * scale + offset` to every present value of `column`.
///
/// Missing values stay missing. Fails with [`SurveyError::TypeMismatch`]
/// for anything but a numeric column.
pub fn convert_column(name: &str, column: &Column, scale: f64, offset: f64) -> Result<Column> {
    match column {
        Column::Numeric { values, validity } => {
            let converted = values
                .iter()
                .enumerate()
                .map(|(i, &v)| if validity.is_valid(i) { v * scale + offset } else { 0.0 })
                .collect();
            Ok(Column::numeric(converted, validity.clone()))
        }
        other => Err(SurveyError::type_mismatch(name, "Numeric", other.data_type())),
    }
}

/// Runs `step` against `table`, appending the converted column.
///
/// An existing `target` is replaced only when `overwrite` is set; otherwise
/// the call fails with [`SurveyError::DuplicateColumn`] and the table is
/// left unchanged.
pub fn convert(table: &mut Table, step: &UnitConversion, overwrite: bool) -> Result<()> {
    if !overwrite && table.has_column(&step.target) {
        return Err(SurveyError::DuplicateColumn {
            name: step.target.clone(),
        });
    }
    let source = table.require(&step.source)?;
    let converted = convert_column(&step.source, source, step.scale, step.offset)?;
    table.insert_column(step.target.clone(), converted, overwrite)?;
    tracing::debug!(
        source = %step.source,
        target = %step.target,
        scale = step.scale,
        offset = step.offset,
        "converted column"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heights() -> Table {
        Table::from_columns([
            ("Height", Column::from_options(vec![Some(70.0), None, Some(64.5)])),
            ("Frailty", Column::from_labels(&[Some("Y"), Some("N"), Some("N")])),
        ])
        .unwrap()
    }

    #[test]
    fn inches_round_trip() {
        let mut table = heights();
        let step = UnitConversion::new("Height", "Height_m", INCHES_TO_METERS, 0.0);
        convert(&mut table, &step, false).unwrap();
        convert(&mut table, &step.inverse(), true).unwrap();

        let back = table.require("Height").unwrap();
        assert!((back.numeric_at(0).unwrap() - 70.0).abs() < 1e-3);
        assert!((back.numeric_at(2).unwrap() - 64.5).abs() < 1e-3);
        assert_eq!(back.numeric_at(1), None);
    }

    #[test]
    fn pounds_to_kilograms() {
        let mut table = Table::from_columns([("Weight", Column::from_values(vec![154.0]))]).unwrap();
        let step = UnitConversion::new("Weight", "Weight_kg", POUNDS_TO_KILOGRAMS, 0.0);
        convert(&mut table, &step, false).unwrap();
        let kg = table.require("Weight_kg").unwrap().numeric_at(0).unwrap();
        assert!((kg - 69.853_225).abs() < 1e-6);
    }

    #[test]
    fn offset_is_applied() {
        let mut table = Table::from_columns([("temp_f", Column::from_values(vec![212.0]))]).unwrap();
        let step = UnitConversion::new("temp_f", "temp_c", 5.0 / 9.0, -160.0 / 9.0);
        convert(&mut table, &step, false).unwrap();
        let c = table.require("temp_c").unwrap().numeric_at(0).unwrap();
        assert!((c - 100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_source_column() {
        let mut table = heights();
        let step = UnitConversion::new("Weight", "Weight_kg", POUNDS_TO_KILOGRAMS, 0.0);
        let err = convert(&mut table, &step, false).unwrap_err();
        assert!(matches!(err, SurveyError::ColumnNotFound { .. }));
    }

    #[test]
    fn categorical_source_rejected() {
        let mut table = heights();
        let step = UnitConversion::new("Frailty", "Frailty_x", 2.0, 0.0);
        let err = convert(&mut table, &step, false).unwrap_err();
        assert!(matches!(err, SurveyError::TypeMismatch { .. }));
        assert!(!table.has_column("Frailty_x"));
    }

    #[test]
    fn existing_target_not_overwritten() {
        let mut table = heights();
        let step = UnitConversion::new("Height", "Height", INCHES_TO_METERS, 0.0);
        let err = convert(&mut table, &step, false).unwrap_err();
        assert!(matches!(err, SurveyError::DuplicateColumn { .. }));
        assert_eq!(table.require("Height").unwrap().numeric_at(0), Some(70.0));
    }
}
