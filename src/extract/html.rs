use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::Table;

// The ED lists render their substance table with a cols-7 class; fall back
// to the first table on the page if that ever changes.
static TABLE_PRIMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.cols-7").expect("selector should parse"));
static TABLE_ANY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("selector should parse"));
static HEADER_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead th").expect("selector should parse"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("selector should parse"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("selector should parse"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("regex should parse"));

/// Header set used when the table carries no `<thead>`, matching the
/// published structure of the ED lists.
const FALLBACK_HEADERS: &[&str] = &[
    "name",
    "cas_number",
    "ec_list_number",
    "health_effects",
    "environmental_effects",
    "status",
    "regulatory_field",
];

/// Parse the substance table out of a fetched page. Column names are taken
/// verbatim from the source header cells. Zero data rows is not an error;
/// a missing table is.
pub fn extract_table(html: &str) -> Result<Table> {
    let doc = Html::parse_document(html);

    let table = doc
        .select(&TABLE_PRIMARY)
        .next()
        .or_else(|| doc.select(&TABLE_ANY).next())
        .ok_or_else(|| anyhow!("no <table> element found in page"))?;

    let mut headers: Vec<String> = table
        .select(&HEADER_CELL)
        .map(|th| clean_text(&cell_text(th)))
        .collect();
    if headers.is_empty() {
        headers = FALLBACK_HEADERS.iter().map(|s| s.to_string()).collect();
    }

    let mut rows = Vec::new();
    for tr in table.select(&ROW) {
        let mut cells: Vec<String> = tr
            .select(&CELL)
            .map(|td| clean_text(&cell_text(td)))
            .collect();
        // Header rows carry <th> cells and fall out here; so do spacers.
        if cells.is_empty() || cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        cells.resize(headers.len(), String::new());
        rows.push(cells);
    }

    Ok(Table { headers, rows })
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace (the archived pages are full of layout
/// newlines inside cells) and trim.
fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}
