use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use super::LoadSink;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::TargetSchema;

/// Writes each loaded batch as one SNAPPY-compressed Parquet file under
/// `<dir>/<table>/`.
pub struct ParquetSink {
    dir: PathBuf,
}

impl ParquetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.dir.join(table)
    }
}

fn load_err(path: &Path, what: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Load(format!("{} {:?}: {}", what, path, e))
}

fn write_tmp(tmp: &Path, batch: &RecordBatch) -> PipelineResult<()> {
    let file = File::create(tmp).map_err(|e| load_err(tmp, "creating", e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| load_err(tmp, "opening writer for", e))?;
    writer.write(batch).map_err(|e| load_err(tmp, "writing", e))?;
    writer.close().map_err(|e| load_err(tmp, "closing", e))?;
    Ok(())
}

/// Write through a `.tmp` sibling so only complete files become visible.
/// Nothing is left behind on failure.
fn write_parquet(path: &Path, batch: &RecordBatch) -> PipelineResult<()> {
    let tmp = path.with_extension("parquet.tmp");
    let result = write_tmp(&tmp, batch)
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| load_err(path, "renaming into", e)));
    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %e, "could not remove partial file");
        }
    }
    result
}

#[async_trait]
impl LoadSink for ParquetSink {
    async fn ensure_table(&self, table: &str, _schema: &TargetSchema) -> PipelineResult<()> {
        let dir = self.table_dir(table);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| load_err(&dir, "creating", e))
    }

    async fn load(&self, table: &str, batch: &RecordBatch) -> PipelineResult<()> {
        if batch.num_rows() == 0 {
            info!("empty batch, nothing to write");
            return Ok(());
        }
        let ts = Utc::now().timestamp_micros();
        let path = self.table_dir(table).join(format!("{}_{}.parquet", table, ts));
        let batch = batch.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_parquet(&target, &batch))
            .await
            .map_err(|e| PipelineError::Load(format!("writer task failed: {}", e)))??;
        info!(path = %path.display(), "wrote parquet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_one_readable_file_per_load() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let sink = ParquetSink::new(dir.path());
        let schema = TargetSchema::new(vec![FieldSpec::new("plate", FieldType::String, None)])?;

        sink.ensure_table("camera_violations", &schema).await?;
        sink.ensure_table("camera_violations", &schema).await?;

        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("plate", DataType::Utf8, false)])),
            vec![Arc::new(StringArray::from(vec!["ABC", "XYZ"])) as ArrayRef],
        )?;
        sink.load("camera_violations", &batch).await?;

        let files: Vec<_> = fs::read_dir(sink.table_dir("camera_violations"))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extension().and_then(|s| s.to_str()), Some("parquet"));

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&files[0])?)?.build()?;
        let rows: usize = reader.map(|b| b.map(|b| b.num_rows()).unwrap_or(0)).sum();
        assert_eq!(rows, 2);
        Ok(())
    }

    fn one_row() -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("plate", DataType::Utf8, false)])),
            vec![Arc::new(StringArray::from(vec!["ABC"])) as ArrayRef],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_batch_writes_no_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let sink = ParquetSink::new(dir.path());
        let schema = TargetSchema::new(vec![FieldSpec::new("plate", FieldType::String, None)])?;
        sink.ensure_table("camera_violations", &schema).await?;

        sink.load("camera_violations", &one_row().slice(0, 0)).await?;

        assert_eq!(fs::read_dir(sink.table_dir("camera_violations"))?.count(), 0);
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_partial_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        // a non-empty directory where the file should land makes the rename fail
        let target = dir.path().join("camera_violations_1.parquet");
        fs::create_dir(&target)?;
        fs::write(target.join("occupied"), b"x")?;

        assert!(write_parquet(&target, &one_row()).is_err());
        assert!(!target.with_extension("parquet.tmp").exists());
        Ok(())
    }
}
