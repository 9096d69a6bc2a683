use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// File name of the optional on-disk manifest inside the working directory.
pub const MANIFEST_FILE: &str = "lists.yaml";

/// Known-good Wayback Machine capture of edlists.org (February 2024).
const DEFAULT_WAYBACK_TIMESTAMP: &str = "20240203050304";

fn default_archive_base_url() -> String {
    "https://web.archive.org/web".to_string()
}

/// One regulatory dataset: a stable identifier plus where to get it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Stable identifier, used as the file stem at every stage.
    pub id: String,
    /// Live source page.
    pub page_url: String,
    /// Per-dataset capture override; falls back to the manifest-wide stamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wayback_timestamp: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Authoritative list of datasets the pipeline must produce, plus the
/// archival capture date used when the live site is unreachable.
///
/// Loaded from `lists.yaml` in the working directory when present;
/// otherwise the compiled-in ED list defaults apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub wayback_timestamp: String,
    /// Web-archive replay endpoint the snapshot URL is built on.
    #[serde(default = "default_archive_base_url")]
    pub archive_base_url: String,
    pub datasets: Vec<Dataset>,
}

impl Default for Manifest {
    fn default() -> Self {
        let ds = |id: &str, slug: &str, ts: &str, description: &str| Dataset {
            id: id.to_string(),
            page_url: format!("https://edlists.org/the-ed-lists/{slug}"),
            wayback_timestamp: Some(ts.to_string()),
            description: description.to_string(),
        };
        Manifest {
            wayback_timestamp: DEFAULT_WAYBACK_TIMESTAMP.to_string(),
            archive_base_url: default_archive_base_url(),
            datasets: vec![
                ds(
                    "list_i_eu_identified",
                    "list-i-substances-identified-as-endocrine-disruptors-by-the-eu",
                    "20240203050304",
                    "Substances identified as endocrine disruptors at EU level",
                ),
                ds(
                    "list_ii_under_evaluation",
                    "list-ii-substances-under-eu-investigation-endocrine-disruption",
                    "20240203050308",
                    "Substances under EU investigation for endocrine disruption",
                ),
                ds(
                    "list_iii_national_authority",
                    "list-iii-substances-identified-as-endocrine-disruptors-by-participating-national-authorities",
                    "20240203050312",
                    "Substances identified by participating national authorities",
                ),
            ],
        }
    }
}

impl Manifest {
    /// Load `lists.yaml` from `work_dir`, or the built-in defaults when the
    /// file does not exist.
    pub fn load(work_dir: &Path) -> Result<Manifest> {
        let path = work_dir.join(MANIFEST_FILE);
        let manifest = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Manifest::default()
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            bail!("manifest lists no datasets");
        }
        let mut seen = HashSet::new();
        for ds in &self.datasets {
            if ds.id.trim().is_empty() {
                bail!("manifest contains a dataset with an empty id");
            }
            if !seen.insert(ds.id.as_str()) {
                bail!("duplicate dataset id `{}` in manifest", ds.id);
            }
        }
        Ok(())
    }

    /// Archive replay URL for a dataset's capture, derived from the
    /// configured base so it never has to be edited per dataset.
    pub fn snapshot_url(&self, dataset: &Dataset) -> String {
        let stamp = dataset
            .wayback_timestamp
            .as_deref()
            .unwrap_or(&self.wayback_timestamp);
        format!(
            "{}/{}/{}",
            self.archive_base_url.trim_end_matches('/'),
            stamp,
            dataset.page_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_all_three_lists() {
        let m = Manifest::default();
        assert_eq!(m.datasets.len(), 3);
        let ids: Vec<&str> = m.datasets.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "list_i_eu_identified",
                "list_ii_under_evaluation",
                "list_iii_national_authority"
            ]
        );
        m.validate().unwrap();
    }

    #[test]
    fn snapshot_url_uses_per_dataset_stamp() {
        let m = Manifest::default();
        let url = m.snapshot_url(&m.datasets[1]);
        assert_eq!(
            url,
            "https://web.archive.org/web/20240203050308/https://edlists.org/the-ed-lists/list-ii-substances-under-eu-investigation-endocrine-disruption"
        );
    }

    #[test]
    fn snapshot_url_falls_back_to_manifest_stamp() {
        let mut m = Manifest::default();
        m.datasets[0].wayback_timestamp = None;
        let url = m.snapshot_url(&m.datasets[0]);
        assert!(url.starts_with("https://web.archive.org/web/20240203050304/"));
    }

    #[test]
    fn custom_archive_base_overrides_wayback() {
        let mut m = Manifest::default();
        m.archive_base_url = "http://127.0.0.1:8080/web/".into();
        let url = m.snapshot_url(&m.datasets[0]);
        assert!(
            url.starts_with("http://127.0.0.1:8080/web/20240203050304/https://edlists.org/"),
            "got: {url}"
        );
    }

    #[test]
    fn load_reads_yaml_when_present() -> Result<()> {
        let dir = TempDir::new()?;
        let mut f = std::fs::File::create(dir.path().join(MANIFEST_FILE))?;
        writeln!(
            f,
            "wayback_timestamp: \"20300101000000\"\n\
             datasets:\n\
             - id: only_one\n  page_url: https://example.org/only-one"
        )?;
        let m = Manifest::load(dir.path())?;
        assert_eq!(m.wayback_timestamp, "20300101000000");
        assert_eq!(m.datasets.len(), 1);
        assert_eq!(
            m.snapshot_url(&m.datasets[0]),
            "https://web.archive.org/web/20300101000000/https://example.org/only-one"
        );
        Ok(())
    }

    #[test]
    fn load_falls_back_to_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let m = Manifest::load(dir.path())?;
        assert_eq!(m.datasets.len(), 3);
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut m = Manifest::default();
        let dup = m.datasets[0].clone();
        m.datasets.push(dup);
        assert!(m.validate().is_err());
    }
}
