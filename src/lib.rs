//! edbrick republishes the three public EU Endocrine Disruptor lists
//! (EU-identified, under evaluation, national-authority) as compressed
//! Parquet tables.
//!
//! The pipeline is four sequential stages, each reading the previous
//! stage's directory and owning its own output wholesale:
//!
//! 1. [`fetch`] — live page first, Wayback Machine snapshot as fallback,
//!    into `download/`.
//! 2. [`extract`] — HTML table or XLSX workbook into per-dataset CSV.
//! 3. [`normalize`] — stage extracted CSVs into `raw/`, one per dataset.
//! 4. [`encode`] — raw CSV into `brick/<dataset>.parquet`.
//!
//! Reruns replace stage outputs entirely; nothing is patched in place.

pub mod brick;
pub mod encode;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod manifest;
pub mod normalize;
