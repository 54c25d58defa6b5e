use arrow::{
    array::{Array, ArrayRef, StringBuilder},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::instrument;

use crate::error::PipelineResult;
use crate::process::utils::{column_index, splice_columns, string_column};
use crate::schema::camera::NOT_SPECIFIED;

pub const DELIMITER: char = '-';

/// A compound column and the name of the sub-category column split out of it.
#[derive(Debug, Clone)]
pub struct CategorySplit {
    pub source: String,
    pub sub: String,
}

impl CategorySplit {
    pub fn new(source: &str, sub: &str) -> Self {
        Self {
            source: source.to_string(),
            sub: sub.to_string(),
        }
    }
}

/// `"NO PARKING-STREET CLEANING"` → `("NO PARKING", "STREET CLEANING")`.
/// Without a delimiter the sub-category is `"Not specified"`.
pub fn split_category(raw: &str) -> (&str, &str) {
    raw.split_once(DELIMITER).unwrap_or((raw, NOT_SPECIFIED))
}

/// For every split, the source column keeps the primary category and the sub
/// column is inserted right after it. Null stays null in both.
#[instrument(level = "info", skip_all, fields(rows = batch.num_rows(), splits = splits.len()))]
pub fn split_categories(batch: &RecordBatch, splits: &[CategorySplit]) -> PipelineResult<RecordBatch> {
    let mut out = batch.clone();

    for split in splits {
        let idx = column_index(&out, &split.source)?;
        let source = string_column(&out, &split.source)?;

        let mut primary = StringBuilder::with_capacity(source.len(), source.value_data().len());
        let mut sub = StringBuilder::with_capacity(source.len(), source.len() * 8);
        for value in source.iter() {
            match value.map(split_category) {
                Some((p, s)) => {
                    primary.append_value(p);
                    sub.append_value(s);
                }
                None => {
                    primary.append_null();
                    sub.append_null();
                }
            }
        }

        out = splice_columns(
            &out,
            idx,
            vec![
                (
                    Field::new(&split.source, DataType::Utf8, true),
                    Arc::new(primary.finish()) as ArrayRef,
                ),
                (
                    Field::new(&split.sub, DataType::Utf8, true),
                    Arc::new(sub.finish()) as ArrayRef,
                ),
            ],
        )?;
    }

    Ok(out)
}
