use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, Int64Builder, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use glob::glob;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::layout::Layout;
use crate::manifest::Manifest;

pub mod infer;

use infer::{infer_kind, ColumnKind};

/// Encode every staged CSV in `raw/` into `brick/<dataset>.parquet`.
pub fn run(layout: &Layout, manifest: &Manifest) -> Result<()> {
    let raw = layout.raw();
    let brick = layout.brick();
    // Published artifacts are replaced wholesale; a dataset dropped from the
    // manifest must not stay published from an earlier run.
    if brick.exists() {
        fs::remove_dir_all(&brick).with_context(|| format!("clearing {}", brick.display()))?;
    }
    fs::create_dir_all(&brick).with_context(|| format!("creating {}", brick.display()))?;

    for ds in &manifest.datasets {
        let src = raw.join(format!("{}.csv", ds.id));
        if !src.exists() {
            bail!(
                "encode stage: no staged CSV for dataset `{}` at {} \
                 (run the normalize stage first)",
                ds.id,
                src.display()
            );
        }
        let dest = brick.join(format!("{}.parquet", ds.id));
        let rows = encode_csv(&src, &dest)
            .with_context(|| format!("encode stage: dataset `{}`", ds.id))?;
        info!(dataset = %ds.id, rows, path = %dest.display(), "encoded");
    }

    let produced = glob(&format!("{}/*.parquet", brick.display()))
        .context("globbing brick directory")?
        .filter_map(|p| p.ok())
        .count();
    if produced != manifest.datasets.len() {
        bail!(
            "encode stage: produced {} artifact(s) in {}, expected {}",
            produced,
            brick.display(),
            manifest.datasets.len()
        );
    }
    Ok(())
}

/// Convert one CSV into a Brotli-compressed Parquet file. Returns the data
/// row count. Column order follows the CSV header; all values are read as
/// text first and only refined to sturdier types when that loses nothing.
pub fn encode_csv(src: &Path, dest: &Path) -> Result<usize> {
    // 1) Header names come from arrow's CSV schema inference; the inferred
    //    types are ignored on purpose.
    let mut file = File::open(src).with_context(|| format!("opening {}", src.display()))?;
    let format = Format::default().with_header(true);
    let (inferred, _) = format
        .infer_schema(&mut file, None)
        .with_context(|| format!("reading CSV header of {}", src.display()))?;
    file.rewind().context("rewinding CSV")?;

    // 2) Read everything as Utf8 so nothing gets coerced on the way in.
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let read_schema = Arc::new(Schema::new(fields));
    let reader = ReaderBuilder::new(read_schema.clone())
        .with_header(true)
        .build(file)
        .with_context(|| format!("creating CSV reader for {}", src.display()))?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", src.display()))?;
    let batch = concat_batches(&read_schema, &batches).context("concatenating CSV batches")?;

    // 3) Refine column types, then write via temp file + rename.
    let typed = refine_types(&batch)?;
    write_parquet(&typed, dest)?;
    Ok(typed.num_rows())
}

/// Apply conservative per-column type inference to an all-text batch.
fn refine_types(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        let col = batch.column(idx);
        let values = col
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("column `{}` was not read as text", field.name()))?;

        match infer_kind(values) {
            ColumnKind::Text => {
                fields.push(Field::new(field.name(), DataType::Utf8, true));
                columns.push(col.clone());
            }
            ColumnKind::Integer => {
                let mut builder = Int64Builder::with_capacity(values.len());
                for i in 0..values.len() {
                    let v = values.value(i).parse::<i64>().with_context(|| {
                        format!("column `{}` row {i} is not an integer", field.name())
                    })?;
                    builder.append_value(v);
                }
                fields.push(Field::new(field.name(), DataType::Int64, true));
                columns.push(Arc::new(builder.finish()) as ArrayRef);
            }
            ColumnKind::Categorical => {
                let dict_type =
                    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
                let dict = cast(col, &dict_type).with_context(|| {
                    format!("dictionary-encoding column `{}`", field.name())
                })?;
                fields.push(Field::new(field.name(), dict_type, true));
                columns.push(dict);
            }
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building typed record batch")
}

fn write_parquet(batch: &RecordBatch, dest: &Path) -> Result<()> {
    let tmp = dest.with_extension("parquet.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .set_dictionary_enabled(true)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    fs::rename(&tmp, dest)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brick;
    use arrow::array::Int64Array;
    use tempfile::TempDir;

    fn encode_str(csv: &str) -> Result<(RecordBatch, usize)> {
        let dir = TempDir::new()?;
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.parquet");
        fs::write(&src, csv)?;
        let rows = encode_csv(&src, &dest)?;
        let batch = brick::read_brick(&dest)?;
        Ok((batch, rows))
    }

    #[test]
    fn cas_numbers_round_trip_byte_for_byte() -> Result<()> {
        let (batch, rows) =
            encode_str("Name and abbreviation,CAS no.\nBisphenol A,80-05-7\n4-MBC,\n")?;
        assert_eq!(rows, 2);
        let cas = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(cas.value(0), "80-05-7");
        assert_eq!(cas.value(1), "");
        Ok(())
    }

    #[test]
    fn fully_populated_year_column_becomes_int64() -> Result<()> {
        let (batch, _) = encode_str("name,Year\na,2018\nb,2021\n")?;
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
        let years = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(years.value(0), 2018);
        Ok(())
    }

    #[test]
    fn low_cardinality_columns_are_dictionary_encoded() -> Result<()> {
        let mut csv = String::from("name,Health Effects\n");
        for i in 0..12 {
            csv.push_str(&format!("s{i},{}\n", if i % 2 == 0 { "yes" } else { "no" }));
        }
        let (batch, rows) = encode_str(&csv)?;
        assert_eq!(rows, 12);
        assert!(matches!(
            batch.schema().field(1).data_type(),
            DataType::Dictionary(_, _)
        ));
        Ok(())
    }

    #[test]
    fn header_only_csv_yields_zero_row_artifact() -> Result<()> {
        let (batch, rows) = encode_str("name,CAS no.,Status\n")?;
        assert_eq!(rows, 0);
        assert_eq!(batch.num_columns(), 3);
        assert_eq!(batch.schema().field(1).name(), "CAS no.");
        Ok(())
    }

    #[test]
    fn column_order_follows_the_header() -> Result<()> {
        let (batch, _) = encode_str("b,a,c\n1x,2x,3x\n")?;
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        Ok(())
    }

    #[test]
    fn reencoding_unchanged_input_is_row_identical() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.parquet");
        fs::write(&src, "name,CAS no.\nBisphenol A,80-05-7\n")?;

        encode_csv(&src, &dest)?;
        let first = brick::read_brick(&dest)?;
        encode_csv(&src, &dest)?;
        let second = brick::read_brick(&dest)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn rerun_with_smaller_manifest_unpublishes_stale_bricks() -> Result<()> {
        use crate::layout::Layout;
        use crate::manifest::{Dataset, Manifest};

        let manifest = |ids: &[&str]| Manifest {
            wayback_timestamp: "20240203050304".into(),
            archive_base_url: "https://web.archive.org/web".into(),
            datasets: ids
                .iter()
                .map(|id| Dataset {
                    id: id.to_string(),
                    page_url: format!("https://example.org/{id}"),
                    wayback_timestamp: None,
                    description: String::new(),
                })
                .collect(),
        };

        let dir = TempDir::new()?;
        let layout = Layout::new(dir.path());
        layout.ensure()?;
        fs::write(layout.raw().join("a.csv"), "name,CAS no.\nBisphenol A,80-05-7\n")?;
        fs::write(layout.raw().join("b.csv"), "name,CAS no.\nTriclosan,3380-34-5\n")?;
        run(&layout, &manifest(&["a", "b"]))?;
        assert!(layout.brick().join("b.parquet").exists());

        run(&layout, &manifest(&["a"]))?;
        assert!(layout.brick().join("a.parquet").exists());
        assert!(
            !layout.brick().join("b.parquet").exists(),
            "a dataset dropped from the manifest must not stay published"
        );
        Ok(())
    }

    #[test]
    fn no_temp_file_left_behind() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.parquet");
        fs::write(&src, "a\n1\n")?;
        encode_csv(&src, &dest)?;
        assert!(dest.exists());
        assert!(!dest.with_extension("parquet.tmp").exists());
        Ok(())
    }
}
