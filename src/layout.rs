use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout inside one working directory. These three directories
/// are the only handoff points between stages.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw fetched files and the CSVs extracted from them.
    pub fn download(&self) -> PathBuf {
        self.root.join("download")
    }

    /// One staged CSV per dataset.
    pub fn raw(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Final published Parquet artifacts.
    pub fn brick(&self) -> PathBuf {
        self.root.join("brick")
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [self.download(), self.raw(), self.brick()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(())
    }
}
