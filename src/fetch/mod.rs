// src/fetch/mod.rs

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::process::RawRecordBatch;

pub mod retry;

pub use retry::{with_retry, RetryPolicy};

pub const NYC_OPEN_DATA: &str = "https://data.cityofnewyork.us";
/// Open Parking and Camera Violations.
pub const CAMERA_VIOLATIONS_DATASET: &str = "nc67-uf89";

/// Which issue dates a run pulls. Resolved against an explicit "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Yesterday,
    /// The `n` days before today, most recent first.
    LastDays(u32),
    On(NaiveDate),
}

impl DateWindow {
    /// The issue dates in the window, most recent first. A window reaching
    /// past the calendar's range is a configuration error.
    pub fn dates(&self, today: NaiveDate) -> PipelineResult<Vec<NaiveDate>> {
        let days_back = |d: i64| {
            today.checked_sub_signed(Duration::days(d)).ok_or_else(|| {
                PipelineError::Config(format!(
                    "date window {:?} reaches before {}",
                    self,
                    NaiveDate::MIN
                ))
            })
        };
        match self {
            DateWindow::Yesterday => Ok(vec![days_back(1)?]),
            DateWindow::LastDays(n) => {
                let n = i64::from(*n);
                // reject before building the list
                days_back(n)?;
                (1..=n).map(days_back).collect()
            }
            DateWindow::On(date) => Ok(vec![*date]),
        }
    }

    /// The window as a SoQL `$where` predicate on `issue_date`, which the
    /// dataset stores as `MM/DD/YYYY` text.
    pub fn where_clause(&self, today: NaiveDate) -> PipelineResult<String> {
        let quoted: Vec<String> = self
            .dates(today)?
            .iter()
            .map(|d| format!("'{}'", d.format("%m/%d/%Y")))
            .collect();
        match quoted.as_slice() {
            [] => Err(PipelineError::Config(format!("empty date window {:?}", self))),
            [one] => Ok(format!("issue_date = {}", one)),
            many => Ok(format!("issue_date in ({})", many.join(", "))),
        }
    }
}

impl FromStr for DateWindow {
    type Err = String;

    /// `yesterday`, `last-<n>-days`, or an ISO date.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "yesterday" {
            return Ok(DateWindow::Yesterday);
        }
        if let Some(n) = s
            .strip_prefix("last-")
            .and_then(|rest| rest.strip_suffix("-days"))
        {
            return n
                .parse()
                .map(DateWindow::LastDays)
                .map_err(|_| format!("bad day count in `{}`", s));
        }
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(DateWindow::On)
            .map_err(|_| format!("expected yesterday, last-<n>-days or YYYY-MM-DD, got `{}`", s))
    }
}

/// Where raw records come from. Implementations must tolerate records that
/// lack fields; they should report connectivity trouble as
/// [`PipelineError::TransientSource`] so the caller can retry.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, predicate: &str) -> PipelineResult<RawRecordBatch>;
}

/// Credentials for the Socrata API. All optional; anonymous access is throttled.
#[derive(Debug, Clone, Default)]
pub struct SocrataAuth {
    pub app_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Pages through a Socrata dataset's JSON endpoint.
pub struct SocrataSource {
    client: Client,
    base_url: String,
    dataset: String,
    auth: SocrataAuth,
    page_size: usize,
    max_records: usize,
}

impl SocrataSource {
    pub fn new(client: Client, auth: SocrataAuth, max_records: usize) -> Self {
        Self {
            client,
            base_url: NYC_OPEN_DATA.to_string(),
            dataset: CAMERA_VIOLATIONS_DATASET.to_string(),
            auth,
            page_size: 50_000.min(max_records.max(1)),
            max_records,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_dataset(mut self, dataset: &str) -> Self {
        self.dataset = dataset.to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/resource/{}.json", self.base_url, self.dataset)
    }

    async fn fetch_page(
        &self,
        predicate: &str,
        limit: usize,
        offset: usize,
    ) -> PipelineResult<Vec<Map<String, Value>>> {
        let mut req = self.client.get(self.endpoint()).query(&[
            ("$where", predicate.to_string()),
            ("$order", ":id".to_string()),
            ("$limit", limit.to_string()),
            ("$offset", offset.to_string()),
        ]);
        if let Some(token) = &self.auth.app_token {
            req = req.header("X-App-Token", token);
        }
        if let Some(user) = &self.auth.username {
            req = req.basic_auth(user, self.auth.password.as_ref());
        }

        let resp = req
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?;
        resp.json::<Vec<Map<String, Value>>>().await.map_err(classify)
    }
}

/// Connection trouble, timeouts, throttling and 5xx are worth retrying;
/// anything else means the request itself is wrong.
fn classify(err: reqwest::Error) -> PipelineError {
    let retryable_status = err
        .status()
        .map_or(false, |s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS);
    if err.is_connect() || err.is_timeout() || retryable_status {
        PipelineError::TransientSource(err.to_string())
    } else {
        PipelineError::Source(err.to_string())
    }
}

#[async_trait]
impl RecordSource for SocrataSource {
    #[instrument(level = "info", skip(self), fields(dataset = %self.dataset))]
    async fn fetch(&self, predicate: &str) -> PipelineResult<RawRecordBatch> {
        let mut rows = Vec::new();
        loop {
            let remaining = self.max_records - rows.len();
            if remaining == 0 {
                // a full cap only counts if nothing lies beyond it
                let beyond = self.fetch_page(predicate, 1, rows.len()).await?;
                if !beyond.is_empty() {
                    warn!(max_records = self.max_records, "window exceeds record limit");
                    return Err(PipelineError::Config(format!(
                        "window `{}` holds more than {} records; raise the record limit",
                        predicate, self.max_records
                    )));
                }
                break;
            }
            let limit = self.page_size.min(remaining);
            let page = self.fetch_page(predicate, limit, rows.len()).await?;
            let got = page.len();
            debug!(offset = rows.len(), got, "fetched page");
            rows.extend(page);
            if got < limit {
                break;
            }
        }
        info!(records = rows.len(), "extracted");
        Ok(RawRecordBatch::from_json_rows(rows))
    }
}
