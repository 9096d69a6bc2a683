use anyhow::{bail, Context, Result};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::layout::Layout;
use crate::manifest::Manifest;

/// Stage extracted CSVs into `raw/`, exactly one `<id>.csv` per manifest
/// dataset. A dataset with no extracted CSV is fatal; an extracted CSV with
/// zero data rows is fine (that is the extractor's header-only case).
pub fn run(layout: &Layout, manifest: &Manifest) -> Result<()> {
    let download = layout.download();
    let raw = layout.raw();
    // Reruns replace the staged set wholesale; stale files from a prior
    // manifest must not survive.
    if raw.exists() {
        fs::remove_dir_all(&raw).with_context(|| format!("clearing {}", raw.display()))?;
    }
    fs::create_dir_all(&raw).with_context(|| format!("creating {}", raw.display()))?;

    for ds in &manifest.datasets {
        let candidates = extracted_for(&download, &ds.id)?;
        let src = match candidates.as_slice() {
            [] => bail!(
                "normalize stage: no extracted table for dataset `{}` in {} \
                 (run the extract stage first)",
                ds.id,
                download.display()
            ),
            [only] => only.clone(),
            [first, ..] => {
                warn!(
                    dataset = %ds.id,
                    count = candidates.len(),
                    chosen = %first.display(),
                    "multiple extracted tables for dataset, staging the first"
                );
                first.clone()
            }
        };

        let dest = raw.join(format!("{}.csv", ds.id));
        fs::copy(&src, &dest).with_context(|| {
            format!("staging {} -> {}", src.display(), dest.display())
        })?;
        info!(dataset = %ds.id, path = %dest.display(), "staged");
    }

    // Count check before anything downstream runs.
    let staged = glob(&format!("{}/*.csv", raw.display()))
        .context("globbing raw directory")?
        .filter_map(|p| p.ok())
        .count();
    if staged != manifest.datasets.len() {
        bail!(
            "normalize stage: staged {} file(s) in {}, expected {}",
            staged,
            raw.display(),
            manifest.datasets.len()
        );
    }
    Ok(())
}

/// Extracted CSVs for one dataset, sorted. Matches both `<id>.csv` and the
/// per-sheet `<id>--<sheet>.csv` shape.
fn extracted_for(download: &Path, id: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/{}*.csv", download.display(), id);
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("globbing {pattern}"))?
        .filter_map(|p| p.ok())
        .collect();
    paths.sort();
    Ok(paths)
}
