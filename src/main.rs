//! # news_etl
//!
//! A batch pipeline that harvests news articles from configured sites,
//! cleans them and stores them in SQLite.
//!
//! ## Usage
//!
//! ```sh
//! news_etl --config config.yaml run
//! news_etl extract elpais
//! ```
//!
//! ## Architecture
//!
//! 1. **Extract**: read each site's homepage for article links and fetch the
//!    articles, skipping failures and articles without a body
//! 2. **Transform**: attach provenance, repair titles, derive ids, normalize
//!    text, count words and drop duplicates and incomplete rows
//! 3. **Load**: insert each site's clean batch in one transaction

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod stopwords;
mod storage;
mod transform;
mod utils;

use cli::{Cli, Command};
use config::Config;
use pipeline::Pipeline;
use scrapers::html::HtmlScraper;
use storage::SqliteStore;
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = dispatch(args).await;
    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(?elapsed, "Execution complete"),
        Err(e) => error!(?elapsed, error = %e, "Execution failed"),
    }
    result
}

async fn dispatch(args: Cli) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Extract { site, output_dir } => {
            let config = Config::load(&args.config)?;
            let site = config.site(&site)?;
            let scraper = HtmlScraper::new(&config)?;

            ensure_writable_dir(Path::new(&output_dir)).await?;
            let path = pipeline::extract_to_file(&scraper, site, Path::new(&output_dir)).await?;
            info!(path = %path.display(), "Extract finished");
            println!("{}", path.display());
        }
        Command::Transform { file } => {
            let path = pipeline::transform_file(&file)?;
            info!(path = %path.display(), "Transform finished");
            println!("{}", path.display());
        }
        Command::Load { file } => {
            let mut store = SqliteStore::open(&args.database)?;
            let loaded = pipeline::load_file(&file, &mut store)?;
            info!(loaded, total = store.count()?, "Load finished");
        }
        Command::Run { sites, stage_dir } => {
            let config = Config::load(&args.config)?;
            let sites = pipeline::resolve_sites(&config, &sites)?;
            let scraper = HtmlScraper::new(&config)?;
            let store = SqliteStore::open(&args.database)?;

            let mut pipeline = Pipeline::new(scraper, store);
            if let Some(dir) = stage_dir {
                ensure_writable_dir(Path::new(&dir)).await?;
                pipeline = pipeline.with_stage_dir(dir);
            }

            let report = pipeline.run_all(&sites).await;
            info!(
                sites = report.sites.len(),
                loaded = report.loaded(),
                total = pipeline.sink().count()?,
                "Pipeline run finished"
            );

            let failed: Vec<_> = report.failed().map(|s| s.site.as_str()).collect();
            if !failed.is_empty() {
                return Err(format!("pipeline failed for: {}", failed.join(", ")).into());
            }
        }
    }
    Ok(())
}
