use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{env, fs::File, path::Path, process::exit};

const PREVIEW_ROWS: usize = 5;

fn main() {
    // Expect exactly one CLI argument: path to a Parquet file written by the parquet sink.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <PARQUET_FILE>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_batch(Path::new(&args[1])) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

/// Print row count, column types, empty values per column, and a short preview.
fn inspect_batch(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut rows = 0usize;
    let mut nulls = vec![0usize; schema.fields().len()];
    let mut preview: Vec<Vec<String>> = Vec::new();
    let options = FormatOptions::default().with_null("<null>");

    for batch in reader {
        let batch = batch?;
        for (i, col) in batch.columns().iter().enumerate() {
            nulls[i] += col.null_count();
        }
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;
        for row in 0..batch.num_rows() {
            if preview.len() >= PREVIEW_ROWS {
                break;
            }
            preview.push(formatters.iter().map(|f| f.value(row).to_string()).collect());
        }
        rows += batch.num_rows();
    }

    println!("=== {} ===", path.display());
    println!("Total rows: {}", rows);
    println!();

    println!("=== Columns ===");
    for (field, n) in schema.fields().iter().zip(&nulls) {
        println!(
            "- {:<24} | {:<10} | nullable: {:<5} | empty: {}",
            field.name(),
            format!("{}", field.data_type()),
            field.is_nullable(),
            n
        );
    }
    println!();

    println!("=== Preview ===");
    for row in &preview {
        println!("{}", row.join(" | "));
    }
    Ok(())
}
