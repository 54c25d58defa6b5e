// src/pipeline.rs
//! Stage sequencing: extract → reconcile → split categories + normalize time
//! → fill defaults → conform → load. Only extraction is retried; every other
//! stage is a pure function of its input batch.

use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use crate::error::PipelineResult;
use crate::fetch::{with_retry, DateWindow, RecordSource, RetryPolicy};
use crate::load::LoadSink;
use crate::process::{self, CategorySplit, RawRecordBatch, TimeSplit};
use crate::schema::{camera, TargetSchema};

/// Everything a pipeline version fixes up front. Built once, shared by
/// reference, never mutated.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub intake: TargetSchema,
    pub cleaned: TargetSchema,
    pub splits: Vec<CategorySplit>,
    pub time: TimeSplit,
}

/// The load-ready batch plus what happened on the way.
#[derive(Debug)]
pub struct Transformed {
    pub batch: RecordBatch,
    pub injected_fields: Vec<String>,
    pub unrecoverable_times: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub predicate: String,
    pub extracted: usize,
    pub loaded: usize,
    pub injected_fields: Vec<String>,
    pub unrecoverable_times: usize,
    pub elapsed: Duration,
}

impl Pipeline {
    pub fn camera_violations() -> PipelineResult<Self> {
        Ok(Self {
            intake: camera::intake_schema()?,
            cleaned: camera::cleaned_schema()?,
            splits: vec![
                CategorySplit::new(camera::VIOLATION, camera::SUB_VIOLATION),
                CategorySplit::new(camera::VIOLATION_STATUS, camera::SUB_VIOLATION_STATUS),
            ],
            time: TimeSplit::new(
                camera::VIOLATION_TIME,
                camera::VIOLATION_HOUR,
                camera::VIOLATION_MINUTE,
            ),
        })
    }

    /// Same stages, with the intake schema read from a YAML file.
    pub fn with_intake(mut self, intake: TargetSchema) -> Self {
        self.intake = intake;
        self
    }

    /// Run every transformation stage over the whole batch. Either the full
    /// cleaned batch comes back or an error does.
    #[instrument(level = "info", skip_all, fields(records = raw.len()))]
    pub fn transform(&self, raw: &RawRecordBatch) -> PipelineResult<Transformed> {
        let injected_fields = raw
            .missing_fields(&self.intake)
            .into_iter()
            .map(str::to_string)
            .collect();

        let reconciled = process::reconcile(raw, &self.intake)?;
        let split = process::split_categories(&reconciled, &self.splits)?;
        let (timed, unrecoverable_times) = process::normalize_time_column(&split, &self.time)?;
        let filled = process::fill_defaults(&timed, &self.cleaned)?;
        let batch = process::conform(&filled, &self.cleaned)?;

        Ok(Transformed {
            batch,
            injected_fields,
            unrecoverable_times,
        })
    }

    /// One scheduled run: extract the window, transform, create the table if
    /// needed, load. Nothing reaches the sink unless every stage succeeded.
    #[instrument(level = "info", skip(self, source, sink))]
    pub async fn run(
        &self,
        source: &dyn RecordSource,
        sink: &dyn LoadSink,
        window: DateWindow,
        today: NaiveDate,
        table: &str,
        retry: RetryPolicy,
    ) -> PipelineResult<RunSummary> {
        let start = Instant::now();
        let predicate = window.where_clause(today)?;
        info!(%predicate, "extracting");

        let where_clause = predicate.as_str();
        let raw = with_retry("extract", retry, move || source.fetch(where_clause)).await?;
        let extracted = raw.len();

        let transformed = self.transform(&raw)?;

        sink.ensure_table(table, &self.cleaned).await?;
        sink.load(table, &transformed.batch).await?;

        let summary = RunSummary {
            predicate,
            extracted,
            loaded: transformed.batch.num_rows(),
            injected_fields: transformed.injected_fields,
            unrecoverable_times: transformed.unrecoverable_times,
            elapsed: start.elapsed(),
        };
        info!(
            extracted = summary.extracted,
            loaded = summary.loaded,
            unrecoverable_times = summary.unrecoverable_times,
            injected = ?summary.injected_fields,
            elapsed = ?summary.elapsed,
            "run complete"
        );
        Ok(summary)
    }
}
