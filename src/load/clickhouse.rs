use arrow::{json::LineDelimitedWriter, record_batch::RecordBatch};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};

use super::LoadSink;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{FieldSpec, FieldType, TargetSchema};

#[derive(Debug, Clone, Default)]
pub struct ClickHouseAuth {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Physical layout of the MergeTree table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub partition_by: Option<String>,
    pub order_by: Vec<String>,
}

impl TableLayout {
    pub fn camera_violations() -> Self {
        Self {
            partition_by: Some("toYYYYMM(issue_date)".into()),
            order_by: vec!["violation".into(), "issue_date".into()],
        }
    }
}

/// Map a field onto its ClickHouse column type; fields without a default may
/// hold nulls and become `Nullable`.
pub fn column_type(field: &FieldSpec) -> String {
    let base = match field.ty {
        FieldType::String | FieldType::Time => "String",
        FieldType::Category => "LowCardinality(String)",
        FieldType::Float => "Float32",
        FieldType::Hour | FieldType::Minute => "UInt8",
        FieldType::Date => "Date",
    };
    if field.default.is_some() {
        base.to_string()
    } else if field.ty == FieldType::Category {
        "LowCardinality(Nullable(String))".to_string()
    } else {
        format!("Nullable({})", base)
    }
}

/// `CREATE TABLE IF NOT EXISTS` for `table`, columns in schema order.
pub fn create_table_ddl(table: &str, schema: &TargetSchema, layout: &TableLayout) -> String {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("    {} {}", f.name, column_type(f)))
        .collect();
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {}\n(\n{}\n)\nENGINE = MergeTree",
        table,
        columns.join(",\n")
    );
    if let Some(partition) = &layout.partition_by {
        ddl.push_str(&format!("\nPARTITION BY {}", partition));
    }
    if layout.order_by.is_empty() {
        ddl.push_str("\nORDER BY tuple()");
    } else {
        ddl.push_str(&format!("\nORDER BY ({})", layout.order_by.join(", ")));
    }
    ddl
}

/// Talks to ClickHouse over its HTTP interface.
pub struct ClickHouseSink {
    client: Client,
    url: String,
    auth: ClickHouseAuth,
    layout: TableLayout,
}

impl ClickHouseSink {
    pub fn new(client: Client, url: &str, auth: ClickHouseAuth, layout: TableLayout) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            auth,
            layout,
        }
    }

    async fn execute(&self, query: Option<&str>, body: Vec<u8>) -> PipelineResult<()> {
        let mut req = self.client.post(&self.url).body(body);
        if let Some(q) = query {
            req = req.query(&[("query", q)]);
        }
        if let Some(user) = &self.auth.username {
            req = req.header("X-ClickHouse-User", user);
        }
        if let Some(pass) = &self.auth.password {
            req = req.header("X-ClickHouse-Key", pass);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| PipelineError::Load(format!("clickhouse request: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Load(format!(
                "clickhouse returned {}: {}",
                status,
                text.trim()
            )));
        }
        Ok(())
    }
}

/// Encode a batch as newline-delimited JSON objects (`FORMAT JSONEachRow`).
pub fn encode_json_each_row(batch: &RecordBatch) -> PipelineResult<Vec<u8>> {
    let mut writer = LineDelimitedWriter::new(Vec::new());
    writer.write_batches(&[batch])?;
    writer.finish()?;
    Ok(writer.into_inner())
}

#[async_trait]
impl LoadSink for ClickHouseSink {
    #[instrument(level = "info", skip(self, schema))]
    async fn ensure_table(&self, table: &str, schema: &TargetSchema) -> PipelineResult<()> {
        if let Some((database, _)) = table.split_once('.') {
            let ddl = format!("CREATE DATABASE IF NOT EXISTS {}", database);
            debug!(%ddl, "ensuring database");
            self.execute(None, ddl.into_bytes()).await?;
        }
        let ddl = create_table_ddl(table, schema, &self.layout);
        debug!(%ddl, "ensuring table");
        self.execute(None, ddl.into_bytes()).await
    }

    #[instrument(level = "info", skip(self, batch), fields(rows = batch.num_rows()))]
    async fn load(&self, table: &str, batch: &RecordBatch) -> PipelineResult<()> {
        if batch.num_rows() == 0 {
            info!("empty batch, nothing to insert");
            return Ok(());
        }
        let body = encode_json_each_row(batch)?;
        let query = format!("INSERT INTO {} FORMAT JSONEachRow", table);
        self.execute(Some(&query), body).await?;
        info!("inserted");
        Ok(())
    }
}
