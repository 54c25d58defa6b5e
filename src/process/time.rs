//! Repair of the free-form `violation_time` strings.
//!
//! The source writes times as `HH:MM` followed by an optional one- or
//! two-letter meridiem (`10:05A`, `10:05AM`, `10:0 A`). Some rows are
//! corrupted: digits dropped, stray characters, or hour and minute written
//! the wrong way round. [`normalize_time`] recovers what it can and returns
//! `None` for everything else; it never fails the batch.

use arrow::{
    array::{Array, ArrayRef, UInt8Builder},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use chrono::{NaiveTime, Timelike};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::PipelineResult;
use crate::process::utils::{column_index, splice_columns, string_column};

/// A repaired time of day, 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourMinute {
    pub hour: u8,
    pub minute: u8,
}

impl HourMinute {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }
}

/// Which text column to repair and the two columns that replace it.
#[derive(Debug, Clone)]
pub struct TimeSplit {
    pub source: String,
    pub hour: String,
    pub minute: String,
}

impl TimeSplit {
    pub fn new(source: &str, hour: &str, minute: &str) -> Self {
        Self {
            source: source.to_string(),
            hour: hour.to_string(),
            minute: minute.to_string(),
        }
    }
}

/// Keep only the digits of `part`; a lone digit gets a leading zero.
/// Returns the digits and everything that was not a digit.
fn split_digits(part: &str) -> (String, String) {
    let mut digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
    let rest: String = part.chars().filter(|c| !c.is_ascii_digit()).collect();
    if digits.len() == 1 {
        digits.insert(0, '0');
    }
    (digits, rest)
}

fn meridiem(suffix: &str) -> String {
    let upper = suffix.to_ascii_uppercase();
    match upper.as_str() {
        "A" => "AM".to_string(),
        "P" => "PM".to_string(),
        _ => upper,
    }
}

/// Repair one raw time string into an hour and minute, or `None` when the
/// value cannot be recovered.
pub fn normalize_time(raw: &str) -> Option<HourMinute> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    let (hour_part, minute_part) = compact.split_once(':')?;
    if minute_part.contains(':') {
        return None;
    }

    let (hour_digits, _) = split_digits(hour_part);
    let (minute_digits, suffix) = split_digits(minute_part);
    let mut hour: u32 = hour_digits.parse().ok()?;
    let mut minute: u32 = minute_digits.parse().ok()?;

    // e.g. 38:76PM
    if hour > 23 && minute > 23 {
        return None;
    }
    if hour > 60 || minute > 60 {
        return None;
    }
    // hour and minute written the wrong way round
    if hour > 23 && minute <= 23 {
        std::mem::swap(&mut hour, &mut minute);
    }

    let meridiem = meridiem(&suffix);
    let parsed = if meridiem.is_empty() {
        NaiveTime::parse_from_str(&format!("{}:{:02}", hour, minute), "%H:%M")
    } else {
        NaiveTime::parse_from_str(&format!("{}:{:02}{}", hour, minute, meridiem), "%I:%M%p")
    };

    let time = parsed.ok()?;
    Some(HourMinute::new(time.hour() as u8, time.minute() as u8))
}

/// Replace the text time column with `UInt8` hour and minute columns at the
/// same position. Returns the new batch and how many non-null values could
/// not be recovered (those rows get null hour and minute).
#[instrument(level = "info", skip_all, fields(column = %split.source, rows = batch.num_rows()))]
pub fn normalize_time_column(
    batch: &RecordBatch,
    split: &TimeSplit,
) -> PipelineResult<(RecordBatch, usize)> {
    let idx = column_index(batch, &split.source)?;
    let raw = string_column(batch, &split.source)?;

    let mut hours = UInt8Builder::with_capacity(raw.len());
    let mut minutes = UInt8Builder::with_capacity(raw.len());
    let mut unrecoverable = 0usize;

    for (row, value) in raw.iter().enumerate() {
        match value.map(|v| (v, normalize_time(v))) {
            Some((_, Some(t))) => {
                hours.append_value(t.hour);
                minutes.append_value(t.minute);
            }
            Some((v, None)) => {
                debug!(row, value = v, "unrecoverable time");
                unrecoverable += 1;
                hours.append_null();
                minutes.append_null();
            }
            None => {
                hours.append_null();
                minutes.append_null();
            }
        }
    }

    if unrecoverable > 0 {
        info!(unrecoverable, "time values left for default filling");
    }

    let out = splice_columns(
        batch,
        idx,
        vec![
            (
                Field::new(&split.hour, DataType::UInt8, true),
                Arc::new(hours.finish()) as ArrayRef,
            ),
            (
                Field::new(&split.minute, DataType::UInt8, true),
                Arc::new(minutes.finish()) as ArrayRef,
            ),
        ],
    )?;
    Ok((out, unrecoverable))
}
