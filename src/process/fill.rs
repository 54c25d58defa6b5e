use arrow::{
    array::{Array, ArrayRef, Date32Array, Float32Array, StringArray, UInt8Array},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::process::convert::{default_scalar, Scalar};
use crate::schema::TargetSchema;

fn fill_column(name: &str, arr: &ArrayRef, default: &Scalar) -> PipelineResult<ArrayRef> {
    let any = arr.as_any();
    let filled: Option<ArrayRef> = match default {
        Scalar::Utf8(d) => any.downcast_ref::<StringArray>().map(|a| {
            let out: StringArray = a.iter().map(|v| Some(v.unwrap_or(d.as_str()))).collect();
            Arc::new(out) as ArrayRef
        }),
        Scalar::Float32(d) => any.downcast_ref::<Float32Array>().map(|a| {
            let out: Float32Array = a.iter().map(|v| Some(v.unwrap_or(*d))).collect();
            Arc::new(out) as ArrayRef
        }),
        Scalar::UInt8(d) => any.downcast_ref::<UInt8Array>().map(|a| {
            let out: UInt8Array = a.iter().map(|v| Some(v.unwrap_or(*d))).collect();
            Arc::new(out) as ArrayRef
        }),
        Scalar::Date32(d) => any.downcast_ref::<Date32Array>().map(|a| {
            let out: Date32Array = a.iter().map(|v| Some(v.unwrap_or(*d))).collect();
            Arc::new(out) as ArrayRef
        }),
    };
    filled.ok_or_else(|| {
        PipelineError::Config(format!(
            "default {:?} does not match column `{}` of type {}",
            default,
            name,
            arr.data_type()
        ))
    })
}

/// Replace nulls in every column that has a default in `schema`. Columns
/// without a default are left as they are; a null left anywhere afterwards is
/// reported as [`PipelineError::UnfilledNull`]. Applying it twice changes
/// nothing.
#[instrument(level = "info", skip_all, fields(rows = batch.num_rows()))]
pub fn fill_defaults(batch: &RecordBatch, schema: &TargetSchema) -> PipelineResult<RecordBatch> {
    let batch_schema = batch.schema();
    let mut cols = Vec::with_capacity(batch.num_columns());

    for (field, arr) in batch_schema.fields().iter().zip(batch.columns()) {
        let nulls = arr.null_count();
        let default = match schema.field(field.name()) {
            Some(spec) => default_scalar(spec)?,
            None => None,
        };
        match default {
            Some(d) if nulls > 0 => {
                debug!(column = %field.name(), nulls, "filling defaults");
                cols.push(fill_column(field.name(), arr, &d)?);
            }
            _ => cols.push(arr.clone()),
        }
    }

    let out = RecordBatch::try_new(batch_schema.clone(), cols)?;

    for (field, arr) in out.schema().fields().iter().zip(out.columns()) {
        if arr.null_count() > 0 {
            return Err(PipelineError::UnfilledNull {
                field: field.name().clone(),
                count: arr.null_count(),
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use arrow::datatypes::{DataType, Field, Schema};

    fn schema() -> TargetSchema {
        TargetSchema::new(vec![
            FieldSpec::new("county", FieldType::Category, Some("Not specified")),
            FieldSpec::new("fine_amount", FieldType::Float, Some("0")),
            FieldSpec::new("violation_hour", FieldType::Hour, Some("0")),
            FieldSpec::new("issue_date", FieldType::Date, Some("01/01/1970")),
        ])
        .unwrap()
    }

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("county", DataType::Utf8, true),
            Field::new("fine_amount", DataType::Float32, true),
            Field::new("violation_hour", DataType::UInt8, true),
            Field::new("issue_date", DataType::Date32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("K"), None])) as ArrayRef,
                Arc::new(Float32Array::from(vec![None, Some(65.0)])) as ArrayRef,
                Arc::new(UInt8Array::from(vec![Some(16), None])) as ArrayRef,
                Arc::new(Date32Array::from(vec![None, Some(19600)])) as ArrayRef,
            ],
        )
        .unwrap()
    }

    #[test]
    fn nulls_take_the_column_default() -> PipelineResult<()> {
        let out = fill_defaults(&batch(), &schema())?;
        let county = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        let fine = out.column(1).as_any().downcast_ref::<Float32Array>().unwrap();
        let hour = out.column(2).as_any().downcast_ref::<UInt8Array>().unwrap();
        let date = out.column(3).as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(county.value(1), "Not specified");
        assert_eq!(fine.value(0), 0.0);
        assert_eq!(hour.value(1), 0);
        assert_eq!(date.value(0), 0);
        assert_eq!(date.value(1), 19600);
        Ok(())
    }

    #[test]
    fn filling_is_idempotent() -> PipelineResult<()> {
        let once = fill_defaults(&batch(), &schema())?;
        let twice = fill_defaults(&once, &schema())?;
        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn null_in_undefaulted_column_is_surfaced() {
        let partial = TargetSchema::new(vec![
            FieldSpec::new("county", FieldType::Category, Some("Not specified")),
            FieldSpec::new("fine_amount", FieldType::Float, None),
            FieldSpec::new("violation_hour", FieldType::Hour, Some("0")),
            FieldSpec::new("issue_date", FieldType::Date, Some("01/01/1970")),
        ])
        .unwrap();
        let err = fill_defaults(&batch(), &partial).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnfilledNull { ref field, count: 1 } if field == "fine_amount"
        ));
    }
}
