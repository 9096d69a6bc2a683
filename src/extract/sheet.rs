use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::warn;

use super::Table;

/// Read every sheet of a workbook into its own table. The first row of a
/// sheet is its header row; remaining rows are data. A sheet with only a
/// header row yields a header-only table rather than being skipped.
pub fn extract_sheets(path: &Path) -> Result<Vec<(String, Table)>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("opening workbook {}", path.display()))?;

    let mut out = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("reading sheet `{}` of {}", name, path.display()))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            warn!(sheet = %name, "sheet is completely empty, skipping");
            continue;
        };
        let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            warn!(sheet = %name, "sheet has no usable header row, skipping");
            continue;
        }

        let width = headers.len();
        let data: Vec<Vec<String>> = rows
            .filter_map(|row| {
                let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
                if cells.iter().all(|c| c.is_empty()) {
                    return None;
                }
                cells.resize(width, String::new());
                Some(cells)
            })
            .collect();

        out.push((name, Table { headers, rows: data }));
    }
    Ok(out)
}

/// Render a cell as text without losing information. Whole floats print as
/// integers (spreadsheets store entered integers as floats); everything
/// else keeps its textual form. Empty stays empty, never a sentinel.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}
