pub mod arrow;
pub mod camera;
pub mod types;

pub use arrow::{build_arrow_schema, build_output_schema, map_to_arrow_type};
pub use types::{FieldSpec, FieldType, TargetSchema};
