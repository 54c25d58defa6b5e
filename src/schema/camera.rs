// src/schema/camera.rs
//! Built-in schemas for the NYC "Open Parking and Camera Violations" dataset.

use super::types::{FieldSpec, FieldType, TargetSchema};
use crate::error::PipelineResult;

pub const NOT_SPECIFIED: &str = "Not specified";
pub const DEFAULT_DATE: &str = "01/01/1970";
pub const DEFAULT_TIME: &str = "12:00AM";
pub const DEFAULT_AMOUNT: &str = "0";
pub const DEFAULT_CLOCK: &str = "0";

pub const VIOLATION: &str = "violation";
pub const SUB_VIOLATION: &str = "sub_violation";
pub const VIOLATION_STATUS: &str = "violation_status";
pub const SUB_VIOLATION_STATUS: &str = "sub_violation_status";
pub const VIOLATION_TIME: &str = "violation_time";
pub const VIOLATION_HOUR: &str = "violation_hour";
pub const VIOLATION_MINUTE: &str = "violation_minute";

fn text(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::String, Some(NOT_SPECIFIED))
}

fn category(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Category, Some(NOT_SPECIFIED))
}

fn date(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Date, Some(DEFAULT_DATE))
}

fn amount(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Float, Some(DEFAULT_AMOUNT))
}

const AMOUNTS: [&str; 6] = [
    "fine_amount",
    "penalty_amount",
    "interest_amount",
    "reduction_amount",
    "payment_amount",
    "amount_due",
];

/// Shape of a raw record as the source publishes it.
pub fn intake_schema() -> PipelineResult<TargetSchema> {
    let mut fields = vec![
        text("plate"),
        category("state"),
        category("license_type"),
        text("summons_number"),
        date("issue_date"),
        category(VIOLATION),
        FieldSpec::new(VIOLATION_TIME, FieldType::Time, Some(DEFAULT_TIME)),
    ];
    fields.extend(AMOUNTS.iter().map(|name| amount(name)));
    fields.extend([
        category("precinct"),
        category("county"),
        category("issuing_agency"),
        category(VIOLATION_STATUS),
        text("summons_image"),
        date("judgment_entry_date"),
    ]);
    TargetSchema::new(fields)
}

/// Shape of the load-ready batch, in target table column order.
pub fn cleaned_schema() -> PipelineResult<TargetSchema> {
    let mut fields = vec![
        text("plate"),
        category("state"),
        category("license_type"),
        text("summons_number"),
        date("issue_date"),
        category(VIOLATION),
        category(SUB_VIOLATION),
        FieldSpec::new(VIOLATION_HOUR, FieldType::Hour, Some(DEFAULT_CLOCK)),
        FieldSpec::new(VIOLATION_MINUTE, FieldType::Minute, Some(DEFAULT_CLOCK)),
    ];
    fields.extend(AMOUNTS.iter().map(|name| amount(name)));
    fields.extend([
        category("precinct"),
        category("county"),
        category("issuing_agency"),
        category(VIOLATION_STATUS),
        category(SUB_VIOLATION_STATUS),
        text("summons_image"),
        date("judgment_entry_date"),
    ]);
    TargetSchema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaned_schema_swaps_time_for_clock_fields() -> PipelineResult<()> {
        let intake = intake_schema()?;
        let cleaned = cleaned_schema()?;
        assert_eq!(intake.len(), 19);
        assert_eq!(cleaned.len(), 22);
        assert!(cleaned.field(VIOLATION_TIME).is_none());
        assert!(cleaned.field(VIOLATION_HOUR).is_some());
        assert!(cleaned.fields().iter().all(|f| f.default.is_some()));
        Ok(())
    }
}
