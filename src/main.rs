use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use reqwest::Client;
use std::{path::PathBuf, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use violations_etl::{
    config::Config,
    fetch::{DateWindow, RetryPolicy, SocrataSource},
    load::{clickhouse::TableLayout, ClickHouseSink, LoadSink, ParquetSink},
    schema::TargetSchema,
    Pipeline,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkKind {
    Clickhouse,
    Parquet,
}

/// Extract one window of camera violations, clean it, and load it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// `yesterday`, `last-<n>-days`, or a single date `YYYY-MM-DD`
    #[arg(long, default_value = "yesterday")]
    window: DateWindow,

    #[arg(long, value_enum, default_value = "clickhouse")]
    sink: SinkKind,

    /// Target table (`database.table` for ClickHouse)
    #[arg(long, default_value = "nyc_data.camera_violations")]
    table: String,

    /// Output directory for the parquet sink
    #[arg(long, default_value = "parquet")]
    out_dir: PathBuf,

    /// Upper bound on records pulled per run
    #[arg(long, default_value_t = 100_000)]
    limit: usize,

    /// Extraction retries after the first attempt
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Seconds between extraction attempts
    #[arg(long, default_value_t = 15)]
    retry_delay: u64,

    /// Replace the built-in intake schema with one read from YAML
    #[arg(long, env = "VIOLATIONS_SCHEMA")]
    schema: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let cli = Cli::parse();
    let config = Config::from_env();

    // ─── 2) pipeline version ─────────────────────────────────────────
    let mut pipeline = Pipeline::camera_violations().context("building built-in schemas")?;
    if let Some(path) = &cli.schema {
        let intake = TargetSchema::from_yaml_path(path)
            .with_context(|| format!("loading schema {}", path.display()))?;
        info!(path = %path.display(), fields = intake.len(), "using intake schema from file");
        pipeline = pipeline.with_intake(intake);
    }

    // ─── 3) collaborators ────────────────────────────────────────────
    let client = Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("building http client")?;
    let source = SocrataSource::new(client.clone(), config.socrata.clone(), cli.limit);
    let sink: Box<dyn LoadSink> = match cli.sink {
        SinkKind::Clickhouse => Box::new(ClickHouseSink::new(
            client,
            &config.clickhouse_url,
            config.clickhouse.clone(),
            TableLayout::camera_violations(),
        )),
        SinkKind::Parquet => Box::new(ParquetSink::new(&cli.out_dir)),
    };
    let retry = RetryPolicy {
        max_retries: cli.retries,
        delay: Duration::from_secs(cli.retry_delay),
    };

    // ─── 4) one run ──────────────────────────────────────────────────
    let today = Local::now().date_naive();
    match pipeline
        .run(&source, sink.as_ref(), cli.window, today, &cli.table, retry)
        .await
    {
        Ok(summary) => {
            info!(
                loaded = summary.loaded,
                unrecoverable_times = summary.unrecoverable_times,
                "all done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run failed, nothing loaded");
            Err(e).context("pipeline run")
        }
    }
}
