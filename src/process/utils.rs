use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Position of `name` in the batch, or a mismatch error naming the column.
pub fn column_index(batch: &RecordBatch, name: &str) -> PipelineResult<usize> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| PipelineError::SchemaMismatch {
            field: name.to_string(),
            row: 0,
            value: String::new(),
            expected: "column present in batch".into(),
        })
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> PipelineResult<&'a StringArray> {
    let idx = column_index(batch, name)?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::SchemaMismatch {
            field: name.to_string(),
            row: 0,
            value: format!("{}", batch.column(idx).data_type()),
            expected: "Utf8".into(),
        })
}

/// Swap the column at `idx` for `replacement` (one or more columns), keeping
/// every other column and the row count as they were.
pub fn splice_columns(
    batch: &RecordBatch,
    idx: usize,
    replacement: Vec<(Field, ArrayRef)>,
) -> PipelineResult<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns() + replacement.len());
    let mut cols = Vec::with_capacity(fields.capacity());

    for (i, field) in schema.fields().iter().enumerate() {
        if i == idx {
            for (f, col) in &replacement {
                fields.push(f.clone());
                cols.push(col.clone());
            }
            continue;
        }
        fields.push(field.as_ref().clone());
        cols.push(batch.column(i).clone());
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), cols, &options)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;

    #[test]
    fn clean_str_strips_quotes_and_space() {
        assert_eq!(clean_str("  \"NY\" "), "NY");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str(" 10:05A"), "10:05A");
    }

    #[test]
    fn splice_replaces_one_column_with_two() -> PipelineResult<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["x"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["y"])) as ArrayRef,
            ],
        )?;
        let out = splice_columns(
            &batch,
            0,
            vec![
                (
                    Field::new("a1", DataType::Utf8, true),
                    Arc::new(StringArray::from(vec!["1"])) as ArrayRef,
                ),
                (
                    Field::new("a2", DataType::Utf8, true),
                    Arc::new(StringArray::from(vec!["2"])) as ArrayRef,
                ),
            ],
        )?;
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["a1", "a2", "b"]);
        assert_eq!(out.num_rows(), 1);
        Ok(())
    }
}
