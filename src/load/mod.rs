// src/load/mod.rs

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::schema::TargetSchema;

pub mod clickhouse;
pub mod parquet_sink;

pub use self::clickhouse::{ClickHouseAuth, ClickHouseSink};
pub use self::parquet_sink::ParquetSink;

/// Analytical store that receives cleaned batches.
#[async_trait]
pub trait LoadSink: Send + Sync {
    /// Create the target table if it does not exist yet. Must be idempotent.
    async fn ensure_table(&self, table: &str, schema: &TargetSchema) -> PipelineResult<()>;

    /// Insert the whole batch. The batch's columns already match the table.
    async fn load(&self, table: &str, batch: &RecordBatch) -> PipelineResult<()>;
}
