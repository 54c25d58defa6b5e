use arrow::{
    array::{Array, Date32Array, Float32Array, UInt8Array},
    record_batch::RecordBatch,
};
use tracing::{debug, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::process::date_parser;
use crate::process::utils::column_index;
use crate::schema::{map_to_arrow_type, FieldType, TargetSchema};

fn constraint(field: &str, row: usize, detail: String) -> PipelineError {
    PipelineError::Constraint {
        field: field.to_string(),
        row,
        detail,
    }
}

fn check_values(name: &str, ty: FieldType, arr: &dyn Array) -> PipelineResult<()> {
    match ty {
        FieldType::Float => {
            if let Some(a) = arr.as_any().downcast_ref::<Float32Array>() {
                if let Some((row, v)) = a
                    .iter()
                    .enumerate()
                    .find_map(|(i, v)| v.filter(|v| *v < 0.0 || v.is_nan()).map(|v| (i, v)))
                {
                    return Err(constraint(name, row, format!("{} is below 0", v)));
                }
            }
        }
        FieldType::Hour | FieldType::Minute => {
            let max = if ty == FieldType::Hour { 23 } else { 59 };
            if let Some(a) = arr.as_any().downcast_ref::<UInt8Array>() {
                if let Some((row, v)) = a
                    .iter()
                    .enumerate()
                    .find_map(|(i, v)| v.filter(|v| *v > max).map(|v| (i, v)))
                {
                    return Err(constraint(name, row, format!("{} is above {}", v, max)));
                }
            }
        }
        FieldType::Date => {
            if let Some(a) = arr.as_any().downcast_ref::<Date32Array>() {
                if let Some((row, v)) = a
                    .iter()
                    .enumerate()
                    .find_map(|(i, v)| v.filter(|v| *v < 0).map(|v| (i, v)))
                {
                    let shown = date_parser::date32_to_naive(v)
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| v.to_string());
                    return Err(constraint(name, row, format!("{} is before 1970-01-01", shown)));
                }
            }
        }
        FieldType::String | FieldType::Category | FieldType::Time => {}
    }
    Ok(())
}

/// Project `batch` onto `schema` (exact columns, exact order, exact types)
/// and check the value constraints every load-ready batch must meet:
/// amounts ≥ 0, dates ≥ 1970-01-01, clock fields in range, and no nulls in
/// defaulted fields.
#[instrument(level = "info", skip_all, fields(rows = batch.num_rows()))]
pub fn conform(batch: &RecordBatch, schema: &TargetSchema) -> PipelineResult<RecordBatch> {
    let mut indices = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        let idx = column_index(batch, &field.name)?;
        let actual = batch.column(idx).data_type();
        let expected = map_to_arrow_type(field.ty);
        if *actual != expected {
            return Err(PipelineError::SchemaMismatch {
                field: field.name.clone(),
                row: 0,
                value: actual.to_string(),
                expected: expected.to_string(),
            });
        }
        indices.push(idx);
    }
    if indices.len() < batch.num_columns() {
        debug!(
            dropped = batch.num_columns() - indices.len(),
            "columns outside the load schema"
        );
    }

    let projected = batch.project(&indices)?;
    for (field, arr) in schema.fields().iter().zip(projected.columns()) {
        if field.default.is_some() && arr.null_count() > 0 {
            return Err(PipelineError::UnfilledNull {
                field: field.name.clone(),
                count: arr.null_count(),
            });
        }
        check_values(&field.name, field.ty, arr.as_ref())?;
    }

    Ok(RecordBatch::try_new(
        schema.output_schema(),
        projected.columns().to_vec(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn target() -> TargetSchema {
        TargetSchema::new(vec![
            FieldSpec::new("plate", FieldType::String, Some("Not specified")),
            FieldSpec::new("fine_amount", FieldType::Float, Some("0")),
            FieldSpec::new("violation_minute", FieldType::Minute, Some("0")),
        ])
        .unwrap()
    }

    fn batch(fine: f32, minute: u8) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("violation_minute", DataType::UInt8, true),
            Field::new("extra", DataType::Utf8, true),
            Field::new("fine_amount", DataType::Float32, true),
            Field::new("plate", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(UInt8Array::from(vec![minute])) as ArrayRef,
                Arc::new(StringArray::from(vec!["x"])) as ArrayRef,
                Arc::new(Float32Array::from(vec![fine])) as ArrayRef,
                Arc::new(StringArray::from(vec!["ABC"])) as ArrayRef,
            ],
        )
        .unwrap()
    }

    #[test]
    fn reorders_to_schema_and_marks_defaulted_fields_required() -> PipelineResult<()> {
        let out = conform(&batch(65.0, 30), &target())?;
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["plate", "fine_amount", "violation_minute"]);
        assert!(out.schema().fields().iter().all(|f| !f.is_nullable()));
        Ok(())
    }

    #[test]
    fn negative_amount_is_a_constraint_violation() {
        let err = conform(&batch(-5.0, 30), &target()).unwrap_err();
        assert!(matches!(err, PipelineError::Constraint { ref field, .. } if field == "fine_amount"));
    }

    #[test]
    fn minute_above_59_is_a_constraint_violation() {
        let err = conform(&batch(5.0, 60), &target()).unwrap_err();
        assert!(matches!(err, PipelineError::Constraint { ref field, .. } if field == "violation_minute"));
    }

    #[test]
    fn missing_column_is_a_schema_mismatch() {
        let wider = TargetSchema::new(vec![FieldSpec::new("county", FieldType::Category, None)]).unwrap();
        let err = conform(&batch(5.0, 5), &wider).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }
}
