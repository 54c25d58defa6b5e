use chrono::{NaiveDate, NaiveDateTime};

/// Formats the source has been seen to publish dates in.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d"];
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

pub fn unix_epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Parse `"MM/DD/YYYY"`, `"YYYY-MM-DD"` or a floating timestamp into a date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Days since 1970-01-01, the Arrow Date32 representation.
pub fn parse_date32(s: &str) -> Option<i32> {
    let date = parse_date(s)?;
    i32::try_from((date - unix_epoch()).num_days()).ok()
}

pub fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    unix_epoch().checked_add_signed(chrono::Duration::days(days as i64))
}
