use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::layout::Layout;
use crate::manifest::Manifest;

pub mod html;
pub mod sheet;

/// One extracted table: header row plus data rows, all text, column names
/// verbatim from the source. Semantic cleanup is the consumer's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Convert each fetched file in `download/` into CSV next to it. HTML pages
/// yield `<id>.csv`; workbooks yield one `<id>--<sheet>.csv` per sheet.
pub fn run(layout: &Layout, manifest: &Manifest) -> Result<()> {
    let download = layout.download();
    for ds in &manifest.datasets {
        let src = find_fetched(&download, &ds.id)
            .with_context(|| format!("extract stage: dataset `{}`", ds.id))?;

        match src.extension().and_then(|e| e.to_str()) {
            Some("xlsx") => {
                let sheets = sheet::extract_sheets(&src)
                    .with_context(|| format!("extract stage: dataset `{}`", ds.id))?;
                if sheets.is_empty() {
                    bail!(
                        "extract stage: dataset `{}`: workbook yielded no tables",
                        ds.id
                    );
                }
                for (name, table) in &sheets {
                    let dest = download.join(format!("{}--{}.csv", ds.id, sanitize(name)));
                    write_csv(table, &dest)?;
                    info!(dataset = %ds.id, sheet = %name, rows = table.rows.len(), "extracted sheet");
                }
            }
            _ => {
                // Archived pages are not always clean UTF-8; decode lossily
                // rather than failing the dataset on a stray byte.
                let bytes =
                    fs::read(&src).with_context(|| format!("reading {}", src.display()))?;
                let text = String::from_utf8_lossy(&bytes);
                let table = html::extract_table(&text)
                    .with_context(|| format!("extract stage: dataset `{}`", ds.id))?;
                let dest = download.join(format!("{}.csv", ds.id));
                write_csv(&table, &dest)?;
                info!(dataset = %ds.id, rows = table.rows.len(), "extracted table");
            }
        }
    }
    Ok(())
}

/// Locate the raw fetched file for a dataset. The fetcher writes exactly one
/// of these two names.
fn find_fetched(download: &Path, id: &str) -> Result<PathBuf> {
    for ext in ["html", "xlsx"] {
        let candidate = download.join(format!("{id}.{ext}"));
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    bail!(
        "no fetched file for dataset `{}` in {} (run the fetch stage first)",
        id,
        download.display()
    )
}

/// Write a table as CSV with an explicit header row. A table with zero data
/// rows still produces a header-only file.
pub fn write_csv(table: &Table, dest: &Path) -> Result<()> {
    let fields: Vec<Field> = table
        .headers
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let batch = if table.rows.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        let width = table.headers.len();
        let columns: Vec<ArrayRef> = (0..width)
            .map(|col| {
                let values: Vec<&str> = table
                    .rows
                    .iter()
                    .map(|row| row.get(col).map(String::as_str).unwrap_or(""))
                    .collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();
        RecordBatch::try_new(schema, columns).context("building CSV record batch")?
    };

    let file =
        File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(&batch)
        .with_context(|| format!("writing {}", dest.display()))?;
    Ok(())
}

/// Sheet names become file name components; keep them tame.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
