use arrow::{
    array::ArrayRef,
    record_batch::{RecordBatch, RecordBatchOptions},
};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::error::PipelineResult;
use crate::process::{convert, RawRecordBatch};
use crate::schema::TargetSchema;

/// Make `raw` match `schema`: fields no record carries are injected with
/// their default, every value is coerced to its declared type, and columns
/// come out in schema order. Source fields outside the schema are dropped.
///
/// Any value that fails coercion fails the whole batch.
#[instrument(level = "info", skip_all, fields(rows = raw.len(), fields = schema.len()))]
pub fn reconcile(raw: &RawRecordBatch, schema: &TargetSchema) -> PipelineResult<RecordBatch> {
    let rows = raw.len();
    let missing = raw.missing_fields(schema);
    if !missing.is_empty() {
        warn!(?missing, "injecting fields absent from the batch");
    }

    let extra: Vec<&str> = raw
        .field_names()
        .into_iter()
        .filter(|n| schema.field(n).is_none())
        .collect();
    if !extra.is_empty() {
        debug!(?extra, "dropping fields outside the schema");
    }

    let columns: Vec<ArrayRef> = schema
        .fields()
        .par_iter()
        .map(|field| {
            if missing.contains(&field.name.as_str()) {
                let cells = vec![field.default.as_deref(); rows];
                convert::coerce_column(field, &cells)
            } else {
                convert::coerce_column(field, &raw.cells(&field.name))
            }
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        schema.arrow_schema(),
        columns,
        &options,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::process::RawRecord;
    use crate::schema::{FieldSpec, FieldType};
    use arrow::array::{Array, Float32Array, StringArray};

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    fn schema() -> TargetSchema {
        TargetSchema::new(vec![
            FieldSpec::new("plate", FieldType::String, Some("Not specified")),
            FieldSpec::new("county", FieldType::Category, Some("Not specified")),
            FieldSpec::new("fine_amount", FieldType::Float, Some("0")),
            FieldSpec::new("summons_image", FieldType::String, None),
        ])
        .unwrap()
    }

    #[test]
    fn missing_field_is_injected_with_default_for_every_record() -> PipelineResult<()> {
        let raw = RawRecordBatch::new(vec![
            record(&[("plate", "A1"), ("fine_amount", "50")]),
            record(&[("plate", "B2"), ("fine_amount", "65.5")]),
        ]);
        let out = reconcile(&raw, &schema())?;

        assert_eq!(out.num_rows(), 2);
        let county = out.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(county.iter().all(|v| v == Some("Not specified")));
        // no default declared: injected as null
        assert_eq!(out.column(3).null_count(), 2);
        Ok(())
    }

    #[test]
    fn columns_follow_schema_order_and_drop_extras() -> PipelineResult<()> {
        let raw = RawRecordBatch::new(vec![record(&[
            ("fine_amount", "10"),
            (":@computed_region", "17"),
            ("plate", "A1"),
        ])]);
        let out = reconcile(&raw, &schema())?;
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["plate", "county", "fine_amount", "summons_image"]);
        let fine = out.column(2).as_any().downcast_ref::<Float32Array>().unwrap();
        assert_eq!(fine.value(0), 10.0);
        Ok(())
    }

    #[test]
    fn field_missing_from_some_records_stays_null() -> PipelineResult<()> {
        let raw = RawRecordBatch::new(vec![
            record(&[("plate", "A1"), ("county", "K")]),
            record(&[("plate", "B2")]),
        ]);
        let out = reconcile(&raw, &schema())?;
        let county = out.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(county.value(0), "K");
        assert!(county.is_null(1));
        Ok(())
    }

    #[test]
    fn coercion_failure_aborts_the_batch() {
        let raw = RawRecordBatch::new(vec![
            record(&[("plate", "A1"), ("fine_amount", "50")]),
            record(&[("plate", "B2"), ("fine_amount", "fifty")]),
        ]);
        let err = reconcile(&raw, &schema()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaMismatch { ref field, row: 1, .. } if field == "fine_amount"
        ));
    }

    #[test]
    fn empty_batch_reconciles_to_zero_rows() -> PipelineResult<()> {
        let out = reconcile(&RawRecordBatch::default(), &schema())?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.num_columns(), 4);
        Ok(())
    }
}
