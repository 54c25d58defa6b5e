// src/error.rs

use arrow::error::ArrowError;
use thiserror::Error;

/// Batch-level failures. Row-local problems (an unreadable time string) never
/// show up here; they travel through the data as nulls.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Connectivity failure talking to the extraction source. Retryable.
    #[error("transient source error: {0}")]
    TransientSource(String),

    #[error("source error: {0}")]
    Source(String),

    /// A present value could not be coerced to its declared type.
    #[error("field `{field}` row {row}: cannot coerce {value:?} to {expected}")]
    SchemaMismatch {
        field: String,
        row: usize,
        value: String,
        expected: String,
    },

    #[error("field `{field}` still has {count} null value(s) after filling defaults")]
    UnfilledNull { field: String, count: usize },

    #[error("field `{field}` row {row}: {detail}")]
    Constraint {
        field: String,
        row: usize,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("load error: {0}")]
    Load(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl PipelineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::TransientSource(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
