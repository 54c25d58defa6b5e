// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

use super::types::{FieldSpec, FieldType, TargetSchema};

/// Map a semantic field type onto its Arrow DataType.
///
/// - STRING, CATEGORY, TIME → Utf8
/// - FLOAT                  → Float32
/// - HOUR, MINUTE           → UInt8
/// - DATE                   → Date32
pub fn map_to_arrow_type(ty: FieldType) -> DataType {
    match ty {
        FieldType::String | FieldType::Category | FieldType::Time => DataType::Utf8,
        FieldType::Float => DataType::Float32,
        FieldType::Hour | FieldType::Minute => DataType::UInt8,
        FieldType::Date => DataType::Date32,
    }
}

/// Build an ArrowSchema where every field is nullable (intermediate batches).
pub fn build_arrow_schema(cols: &[FieldSpec]) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = cols
        .iter()
        .map(|col| ArrowField::new(&col.name, map_to_arrow_type(col.ty), /* nullable = */ true))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

/// Build the load-side ArrowSchema: fields with a default are non-nullable.
pub fn build_output_schema(cols: &[FieldSpec]) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = cols
        .iter()
        .map(|col| ArrowField::new(&col.name, map_to_arrow_type(col.ty), col.default.is_none()))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

impl TargetSchema {
    pub fn arrow_schema(&self) -> Arc<ArrowSchema> {
        build_arrow_schema(self.fields())
    }

    pub fn output_schema(&self) -> Arc<ArrowSchema> {
        build_output_schema(self.fields())
    }
}
