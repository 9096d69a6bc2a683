use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::layout::Layout;
use crate::manifest::{Dataset, Manifest};

/// edlists.org sits behind bot protection; a bare client UA gets blocked,
/// and the Wayback Machine is also happier with a browser-like one.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry and timeout tuning for one source.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts per URL before giving up on it.
    pub attempts: usize,
    /// Delay before the first retry; doubles on each subsequent one.
    pub backoff: Duration,
    /// Overall timeout applied to each request.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            attempts: MAX_ATTEMPTS,
            backoff: RETRY_DELAY,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Build the HTTP client used for both live and archived sources.
pub fn client(cfg: &FetchConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(cfg.timeout)
        .cookie_store(true)
        .build()
        .context("building HTTP client")
}

/// Fetch every dataset in the manifest into `download/`, one raw file per
/// dataset. Any dataset for which both the live source and the archived
/// snapshot fail aborts the stage.
pub async fn run(layout: &Layout, manifest: &Manifest, cfg: &FetchConfig) -> Result<()> {
    let download = layout.download();
    tokio::fs::create_dir_all(&download)
        .await
        .with_context(|| format!("creating {}", download.display()))?;

    let client = client(cfg)?;
    for ds in &manifest.datasets {
        let path = fetch_dataset(&client, manifest, ds, cfg, &download)
            .await
            .with_context(|| format!("fetch stage: dataset `{}`", ds.id))?;
        info!(dataset = %ds.id, path = %path.display(), "fetched");
    }
    Ok(())
}

/// Try the live page first, then the archived snapshot. Returns the path
/// the raw payload was written to.
async fn fetch_dataset(
    client: &Client,
    manifest: &Manifest,
    ds: &Dataset,
    cfg: &FetchConfig,
    download: &Path,
) -> Result<PathBuf> {
    Url::parse(&ds.page_url).with_context(|| format!("parsing source URL {}", ds.page_url))?;

    let body = match get_with_retry(client, &ds.page_url, cfg).await {
        Ok(body) => body,
        Err(live_err) => {
            let snapshot = manifest.snapshot_url(ds);
            warn!(
                dataset = %ds.id,
                error = %format!("{live_err:#}"),
                snapshot = %snapshot,
                "live source unreachable, falling back to archived snapshot"
            );
            get_with_retry(client, &snapshot, cfg).await.with_context(|| {
                format!(
                    "both live ({}) and archived ({}) sources failed",
                    ds.page_url, snapshot
                )
            })?
        }
    };

    let dest = download.join(format!("{}.{}", ds.id, sniff_extension(&body)));
    tokio::fs::write(&dest, &body)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    Ok(dest)
}

/// GET with bounded retries and doubling backoff.
async fn get_with_retry(client: &Client, url: &str, cfg: &FetchConfig) -> Result<Vec<u8>> {
    let mut attempt = 0;
    let mut delay = cfg.backoff;
    loop {
        attempt += 1;
        let err = match client.get(url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.bytes().await {
                    Ok(body) => return Ok(body.to_vec()),
                    Err(e) => anyhow::Error::new(e).context("reading response body"),
                },
                Err(e) => anyhow::Error::new(e),
            },
            Err(e) => anyhow::Error::new(e),
        };

        if attempt < cfg.attempts {
            warn!(url = %url, attempt, "request failed, retrying in {:?}", delay);
            sleep(delay).await;
            delay *= 2;
        } else {
            return Err(err).with_context(|| format!("GET {url} ({attempt} attempts)"));
        }
    }
}

/// Decide the on-disk extension from the payload itself: XLSX workbooks are
/// ZIP containers, everything else the sources serve is an HTML page.
pub fn sniff_extension(body: &[u8]) -> &'static str {
    if body.starts_with(b"PK\x03\x04") {
        "xlsx"
    } else {
        "html"
    }
}
