use anyhow::Result;
use edbrick::{
    encode, extract,
    fetch::{self, FetchConfig},
    layout::Layout,
    manifest::Manifest,
    normalize,
};
use std::env;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {program} <fetch|extract|normalize|encode|run> [WORK_DIR]\n\
         \n\
         Stages run in order: fetch -> extract -> normalize -> encode.\n\
         WORK_DIR defaults to the current directory; `run` executes all four."
    );
    exit(2);
}

#[tokio::main]
async fn main() {
    // ─── init logging ────────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("edbrick");
    let stage = match args.get(1) {
        Some(s) => s.as_str(),
        None => usage(program),
    };
    let work = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("."));

    if let Err(err) = dispatch(stage, &work, program).await {
        error!("{err:#}");
        exit(1);
    }
}

async fn dispatch(stage: &str, work: &PathBuf, program: &str) -> Result<()> {
    let layout = Layout::new(work);
    let manifest = Manifest::load(work)?;
    let fetch_cfg = FetchConfig::default();

    match stage {
        "fetch" => fetch::run(&layout, &manifest, &fetch_cfg).await?,
        "extract" => extract::run(&layout, &manifest)?,
        "normalize" => normalize::run(&layout, &manifest)?,
        "encode" => encode::run(&layout, &manifest)?,
        "run" => {
            layout.ensure()?;
            fetch::run(&layout, &manifest, &fetch_cfg).await?;
            extract::run(&layout, &manifest)?;
            normalize::run(&layout, &manifest)?;
            encode::run(&layout, &manifest)?;
            info!(
                datasets = manifest.datasets.len(),
                work = %layout.root().display(),
                brick = %layout.brick().display(),
                "pipeline complete"
            );
        }
        _ => usage(program),
    }
    Ok(())
}
