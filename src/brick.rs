//! Read-side helpers for the published brick files.
//!
//! Column names vary slightly per dataset, so consumers discover columns by
//! name pattern instead of fixed position. The one lookup everybody needs,
//! CAS number, matches the column whose name contains "cas"
//! (case-insensitive) and filters rows by substring.

use anyhow::{anyhow, Context, Result};
use arrow::array::{BooleanArray, StringArray};
use arrow::compute::{cast, concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Read a brick file into a single record batch.
pub fn read_brick(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .with_context(|| format!("opening parquet reader for {}", path.display()))?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("reading {}", path.display()))?;
    concat_batches(&schema, &batches).context("concatenating parquet batches")
}

/// Index of the CAS-number column, discovered by name pattern.
pub fn cas_column(schema: &Schema) -> Option<usize> {
    schema
        .fields()
        .iter()
        .position(|f| f.name().to_lowercase().contains("cas"))
}

/// Rows whose CAS value contains `needle`. All columns of matching rows are
/// kept. Errors if the batch has no CAS column at all.
pub fn filter_by_cas(batch: &RecordBatch, needle: &str) -> Result<RecordBatch> {
    let idx = cas_column(batch.schema().as_ref())
        .ok_or_else(|| anyhow!("no column name contains \"cas\""))?;

    // Cast first so dictionary-encoded columns work too.
    let col = cast(batch.column(idx), &DataType::Utf8).context("casting CAS column to text")?;
    let values = col
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("CAS column did not cast to text"))?;

    let mask: BooleanArray = values
        .iter()
        .map(|v| Some(v.map_or(false, |s| s.contains(needle))))
        .collect();
    filter_record_batch(batch, &mask).context("filtering by CAS substring")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::ArrayRef;
    use arrow::datatypes::Field;
    use std::sync::Arc;

    fn batch(cas_header: &str) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Name and abbreviation", DataType::Utf8, true),
            Field::new(cas_header, DataType::Utf8, true),
            Field::new("Status", DataType::Utf8, true),
        ]));
        let cols: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["Bisphenol A", "4-MBC"])),
            Arc::new(StringArray::from(vec!["80-05-7", ""])),
            Arc::new(StringArray::from(vec!["Legally adopted", "Under assessment"])),
        ];
        RecordBatch::try_new(schema, cols).unwrap()
    }

    #[test]
    fn cas_column_is_found_case_insensitively() {
        for header in ["CAS no.", "cas_number", "Cas Number"] {
            let b = batch(header);
            assert_eq!(cas_column(b.schema().as_ref()), Some(1), "header: {header}");
        }
    }

    #[test]
    fn filter_keeps_whole_matching_rows() {
        let b = batch("CAS no.");
        let hit = filter_by_cas(&b, "80-05-7").unwrap();
        assert_eq!(hit.num_rows(), 1);
        let name = hit.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        let status = hit.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(name.value(0), "Bisphenol A");
        assert_eq!(status.value(0), "Legally adopted");
    }

    #[test]
    fn no_match_yields_empty_batch() {
        let b = batch("CAS no.");
        let miss = filter_by_cas(&b, "0000-00-0").unwrap();
        assert_eq!(miss.num_rows(), 0);
    }

    #[test]
    fn missing_cas_column_is_an_error() {
        let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, true)]));
        let cols: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec!["x"]))];
        let b = RecordBatch::try_new(schema, cols).unwrap();
        assert!(filter_by_cas(&b, "80").is_err());
    }
}
