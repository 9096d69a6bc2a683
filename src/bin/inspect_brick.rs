use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use edbrick::brick;
use std::{env, path::Path, process::exit};

fn main() {
    // One required argument (brick file), one optional CAS substring.
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <BRICK_FILE> [CAS_SUBSTRING]", args[0]);
        exit(1);
    }
    if let Err(e) = inspect(Path::new(&args[1]), args.get(2).map(String::as_str)) {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn inspect(path: &Path, cas_needle: Option<&str>) -> anyhow::Result<()> {
    let batch = brick::read_brick(path)?;

    println!("=== Brick: {} ===", path.display());
    println!("Rows:    {}", batch.num_rows());
    println!("Columns: {}", batch.num_columns());
    println!();
    println!("=== Schema ===");
    for field in batch.schema().fields() {
        println!("- {:<30} {:?}", field.name(), field.data_type());
    }

    let Some(needle) = cas_needle else {
        return Ok(());
    };

    let hits = brick::filter_by_cas(&batch, needle)?;
    println!();
    println!("=== Rows with CAS containing \"{}\": {} ===", needle, hits.num_rows());
    for row in 0..hits.num_rows() {
        println!("--- Row {row} ---");
        for (idx, field) in hits.schema().fields().iter().enumerate() {
            // Cast per column so dictionary-encoded and integer columns
            // print their textual form.
            let col = cast(hits.column(idx), &DataType::Utf8)?;
            let values = col
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("cast to Utf8 yields a string array");
            let text = if values.is_null(row) { "" } else { values.value(row) };
            println!("  {:<30} {}", field.name(), text);
        }
    }
    Ok(())
}
