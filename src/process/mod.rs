// src/process/mod.rs
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::schema::TargetSchema;

pub mod category;
pub mod convert;
pub mod date_parser;
pub mod fill;
pub mod reconcile;
pub mod time;
pub mod utils;
pub mod validate;

pub use category::{split_categories, split_category, CategorySplit};
pub use fill::fill_defaults;
pub use reconcile::reconcile;
pub use time::{normalize_time, normalize_time_column, HourMinute, TimeSplit};
pub use validate::conform;

/// One source record: field name → raw text. A field may be missing entirely
/// or present with a null value; both read back as `None`.
pub type RawRecord = BTreeMap<String, Option<String>>;

/// Records exactly as extracted, before any typing. Fields are not uniform
/// across records or across runs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawRecordBatch {
    records: Vec<RawRecord>,
}

impl RawRecordBatch {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    /// Build from JSON objects as the source API returns them. Scalars are
    /// kept as text; nested values are kept as their JSON text.
    pub fn from_json_rows(rows: Vec<Map<String, Value>>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::Null => None,
                            Value::String(s) => Some(s),
                            other => Some(other.to_string()),
                        };
                        (k, text)
                    })
                    .collect()
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every field name seen in at least one record.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect()
    }

    /// Schema fields that no record carries, in schema order. An empty batch
    /// is missing nothing.
    pub fn missing_fields<'s>(&self, schema: &'s TargetSchema) -> Vec<&'s str> {
        if self.is_empty() {
            return Vec::new();
        }
        let present = self.field_names();
        schema.names().filter(|n| !present.contains(n)).collect()
    }

    /// The cells of one field across all records.
    pub fn cells(&self, name: &str) -> Vec<Option<&str>> {
        self.records
            .iter()
            .map(|r| r.get(name).and_then(|v| v.as_deref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_become_text() {
        let rows = vec![json!({"plate": "ABC123", "fine_amount": 65, "county": null})]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        let batch = RawRecordBatch::from_json_rows(rows);
        assert_eq!(batch.cells("plate"), vec![Some("ABC123")]);
        assert_eq!(batch.cells("fine_amount"), vec![Some("65")]);
        assert_eq!(batch.cells("county"), vec![None]);
        assert_eq!(batch.cells("state"), vec![None]);
    }

    #[test]
    fn field_presence_is_the_union_over_records() {
        let mut a = RawRecord::new();
        a.insert("plate".into(), Some("A".into()));
        let mut b = RawRecord::new();
        b.insert("state".into(), None);
        let batch = RawRecordBatch::new(vec![a, b]);
        assert_eq!(
            batch.field_names().into_iter().collect::<Vec<_>>(),
            vec!["plate", "state"]
        );
    }

    #[test]
    fn empty_batch_reports_no_missing_fields() -> crate::error::PipelineResult<()> {
        let schema = crate::schema::camera::intake_schema()?;
        assert!(RawRecordBatch::default().missing_fields(&schema).is_empty());

        let mut only_plate = RawRecord::new();
        only_plate.insert("plate".into(), Some("A".into()));
        let missing = RawRecordBatch::new(vec![only_plate]).missing_fields(&schema);
        assert_eq!(missing.len(), schema.len() - 1);
        assert!(!missing.contains(&"plate"));
        Ok(())
    }
}
