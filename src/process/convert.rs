use arrow::array::{ArrayRef, Date32Builder, Float32Builder, StringBuilder, UInt8Builder};
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::process::{date_parser, utils};
use crate::schema::{FieldSpec, FieldType};

/// A single typed value, in the Arrow physical representation of its field type.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Utf8(String),
    Float32(f32),
    UInt8(u8),
    /// Days since 1970-01-01.
    Date32(i32),
}

/// Amounts are finite and never negative.
fn parse_float(s: &str) -> Option<f32> {
    s.parse::<f32>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_bounded(s: &str, max: u8) -> Option<u8> {
    s.parse::<u8>().ok().filter(|v| *v <= max)
}

/// Coerce one raw text value. Blank text is `Ok(None)`; text that does not
/// fit the type is `Err(expected-type-name)`.
pub fn coerce_scalar(ty: FieldType, raw: &str) -> Result<Option<Scalar>, &'static str> {
    let cleaned = utils::clean_str(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    let value = match ty {
        FieldType::String | FieldType::Category | FieldType::Time => Some(Scalar::Utf8(cleaned)),
        FieldType::Float => parse_float(&cleaned).map(Scalar::Float32),
        FieldType::Hour => parse_bounded(&cleaned, 23).map(Scalar::UInt8),
        FieldType::Minute => parse_bounded(&cleaned, 59).map(Scalar::UInt8),
        FieldType::Date => date_parser::parse_date32(&cleaned)
            .filter(|days| *days >= 0)
            .map(Scalar::Date32),
    };
    value.map(Some).ok_or(ty.as_str())
}

/// The typed default for `field`, if it declares one.
pub fn default_scalar(field: &FieldSpec) -> PipelineResult<Option<Scalar>> {
    match &field.default {
        None => Ok(None),
        Some(raw) => coerce_scalar(field.ty, raw).map_err(|expected| {
            PipelineError::Config(format!(
                "default {:?} for `{}` is not a valid {}",
                raw, field.name, expected
            ))
        }),
    }
}

fn mismatch(field: &FieldSpec, row: usize, raw: &str, expected: &str) -> PipelineError {
    PipelineError::SchemaMismatch {
        field: field.name.clone(),
        row,
        value: raw.to_string(),
        expected: expected.to_string(),
    }
}

/// Build one typed Arrow column from raw text cells. The first value that
/// fails to coerce aborts the whole column.
pub fn coerce_column(field: &FieldSpec, cells: &[Option<&str>]) -> PipelineResult<ArrayRef> {
    let mut typed = Vec::with_capacity(cells.len());
    for (row, cell) in cells.iter().enumerate() {
        let value = match cell {
            None => None,
            Some(raw) => {
                coerce_scalar(field.ty, raw).map_err(|exp| mismatch(field, row, raw, exp))?
            }
        };
        typed.push(value);
    }
    build_array(field, typed)
}

/// Assemble a column of `field`'s Arrow type from already-typed values.
pub fn build_array(field: &FieldSpec, values: Vec<Option<Scalar>>) -> PipelineResult<ArrayRef> {
    let wrong = |row: usize, v: &Scalar| mismatch(field, row, &format!("{:?}", v), field.ty.as_str());

    match field.ty {
        FieldType::String | FieldType::Category | FieldType::Time => {
            let mut b = StringBuilder::with_capacity(values.len(), values.len() * 16);
            for (row, v) in values.iter().enumerate() {
                match v {
                    None => b.append_null(),
                    Some(Scalar::Utf8(s)) => b.append_value(s),
                    Some(other) => return Err(wrong(row, other)),
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }
        FieldType::Float => {
            let mut b = Float32Builder::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                match v {
                    None => b.append_null(),
                    Some(Scalar::Float32(f)) => b.append_value(*f),
                    Some(other) => return Err(wrong(row, other)),
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }
        FieldType::Hour | FieldType::Minute => {
            let mut b = UInt8Builder::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                match v {
                    None => b.append_null(),
                    Some(Scalar::UInt8(n)) => b.append_value(*n),
                    Some(other) => return Err(wrong(row, other)),
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }
        FieldType::Date => {
            let mut b = Date32Builder::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                match v {
                    None => b.append_null(),
                    Some(Scalar::Date32(d)) => b.append_value(*d),
                    Some(other) => return Err(wrong(row, other)),
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Date32Array, Float32Array};

    #[test]
    fn blank_cells_become_null() -> PipelineResult<()> {
        let field = FieldSpec::new("fine_amount", FieldType::Float, None);
        let col = coerce_column(&field, &[Some("65.00"), Some("  "), None])?;
        let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
        assert_eq!(arr.value(0), 65.0);
        assert!(arr.is_null(1));
        assert!(arr.is_null(2));
        Ok(())
    }

    #[test]
    fn unparsable_value_names_field_and_row() {
        let field = FieldSpec::new("issue_date", FieldType::Date, None);
        let err = coerce_column(&field, &[Some("08/31/2023"), Some("yesterday")]).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, row, value, .. } => {
                assert_eq!(field, "issue_date");
                assert_eq!(row, 1);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn dates_are_days_since_epoch() -> PipelineResult<()> {
        let field = FieldSpec::new("issue_date", FieldType::Date, None);
        let col = coerce_column(&field, &[Some("01/11/1970")])?;
        let arr = col.as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(arr.value(0), 10);
        Ok(())
    }

    #[test]
    fn clock_fields_are_range_checked() {
        assert_eq!(coerce_scalar(FieldType::Hour, "23"), Ok(Some(Scalar::UInt8(23))));
        assert_eq!(coerce_scalar(FieldType::Hour, "24"), Err("hour"));
        assert_eq!(coerce_scalar(FieldType::Minute, "60"), Err("minute"));
        assert_eq!(coerce_scalar(FieldType::Float, "NaN"), Err("float"));
    }

    #[test]
    fn negative_amounts_and_pre_epoch_dates_do_not_coerce() {
        assert_eq!(coerce_scalar(FieldType::Float, "-5.00"), Err("float"));
        assert_eq!(coerce_scalar(FieldType::Float, "0"), Ok(Some(Scalar::Float32(0.0))));
        assert_eq!(coerce_scalar(FieldType::Date, "12/31/1969"), Err("date"));
        assert_eq!(coerce_scalar(FieldType::Date, "01/01/1970"), Ok(Some(Scalar::Date32(0))));

        let field = FieldSpec::new("amount_due", FieldType::Float, Some("0"));
        let err = coerce_column(&field, &[Some("10"), Some("-1")]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaMismatch { ref field, row: 1, .. } if field == "amount_due"
        ));
    }
}
