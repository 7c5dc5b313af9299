//! Stage orchestration.
//!
//! Stages run as plain function calls: each site is extracted, transformed and
//! loaded before the next site starts. When a staging directory is set, the
//! raw and clean batches are also written out as CSV artifacts, so each
//! finished stage leaves a file behind.
//!
//! The single-stage entry points ([`extract_to_file`], [`transform_file`],
//! [`load_file`]) read and write those same artifacts and back the CLI's
//! per-stage subcommands.

use crate::config::{Config, SiteConfig};
use crate::error::Result;
use crate::models::CleanArticle;
use crate::outputs::artifacts;
use crate::scrapers::{self, ScrapingClient};
use crate::storage::ArticleSink;
use crate::transform;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// Row counts for one site after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteCounts {
    pub extracted: usize,
    pub cleaned: usize,
    pub loaded: usize,
}

#[derive(Debug)]
pub struct SiteReport {
    pub site: String,
    pub outcome: Result<SiteCounts>,
}

/// Outcome of a run over several sites.
#[derive(Debug, Default)]
pub struct RunReport {
    pub sites: Vec<SiteReport>,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &SiteReport> {
        self.sites.iter().filter(|s| s.outcome.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn loaded(&self) -> usize {
        self.sites
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok())
            .map(|c| c.loaded)
            .sum()
    }
}

pub struct Pipeline<C, S> {
    client: C,
    sink: S,
    stage_dir: Option<PathBuf>,
    run_date: NaiveDate,
}

impl<C: ScrapingClient, S: ArticleSink> Pipeline<C, S> {
    pub fn new(client: C, sink: S) -> Self {
        Pipeline {
            client,
            sink,
            stage_dir: None,
            run_date: Local::now().date_naive(),
        }
    }

    /// Mirror each stage's output into `dir`.
    pub fn with_stage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stage_dir = Some(dir.into());
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run every site in `sites`, in order. A failing site is logged and
    /// recorded in the report; the remaining sites still run.
    #[instrument(level = "info", skip_all, fields(sites = sites.len()))]
    pub async fn run_all(&mut self, sites: &[&SiteConfig]) -> RunReport {
        let mut report = RunReport::default();
        for site in sites {
            let outcome = self.run_site(site).await;
            match &outcome {
                Ok(counts) => info!(
                    site = %site.uid,
                    extracted = counts.extracted,
                    cleaned = counts.cleaned,
                    loaded = counts.loaded,
                    "Site finished"
                ),
                Err(e) => error!(site = %site.uid, error = %e, "Site failed"),
            }
            report.sites.push(SiteReport {
                site: site.uid.clone(),
                outcome,
            });
        }
        report
    }

    /// Extract, transform and load a single site.
    #[instrument(level = "info", skip_all, fields(site = %site.uid))]
    pub async fn run_site(&mut self, site: &SiteConfig) -> Result<SiteCounts> {
        info!("Starting extract");
        let raw = scrapers::extract(&self.client, site).await?;
        let extracted = raw.len();

        let raw_path = match &self.stage_dir {
            Some(dir) => {
                let path = dir.join(artifacts::raw_filename(&site.uid, self.run_date));
                artifacts::write_raw(&path, &raw)?;
                Some(path)
            }
            None => None,
        };

        info!("Starting transform");
        let clean = transform::transform(raw, &site.uid);
        if let Some(path) = &raw_path {
            artifacts::write_clean(&artifacts::clean_path(path), &clean)?;
        }

        info!("Starting load");
        let loaded = load(&mut self.sink, &clean)?;

        Ok(SiteCounts {
            extracted,
            cleaned: clean.len(),
            loaded,
        })
    }
}

fn load<S: ArticleSink>(sink: &mut S, articles: &[CleanArticle]) -> Result<usize> {
    sink.ensure_schema()?;
    sink.insert_batch(articles)
}

/// Extract one site into `{output_dir}/{site}_{date}_articles.csv`.
#[instrument(level = "info", skip_all, fields(site = %site.uid))]
pub async fn extract_to_file<C: ScrapingClient>(
    client: &C,
    site: &SiteConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let raw = scrapers::extract(client, site).await?;
    let path = output_dir.join(artifacts::raw_filename(&site.uid, Local::now().date_naive()));
    artifacts::write_raw(&path, &raw)?;
    Ok(path)
}

/// Transform a raw artifact into `clean_<name>` next to it. The batch's
/// source is taken from the file name.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn transform_file(path: &Path) -> Result<PathBuf> {
    let source_uid = transform::source_uid_from_filename(path);
    let raw = artifacts::read_raw(path)?;
    let clean = transform::transform(raw, &source_uid);
    let clean_path = artifacts::clean_path(path);
    artifacts::write_clean(&clean_path, &clean)?;
    Ok(clean_path)
}

/// Load a clean artifact into `sink` as one batch.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_file<S: ArticleSink>(path: &Path, sink: &mut S) -> Result<usize> {
    let clean = artifacts::read_clean(path)?;
    load(sink, &clean)
}

/// Sites resolved from the configuration for a run; unknown identifiers fail
/// here, before anything is fetched.
pub fn resolve_sites<'c>(config: &'c Config, requested: &[String]) -> Result<Vec<&'c SiteConfig>> {
    let sites = config.select_sites(requested)?;
    info!(
        sites = ?sites.iter().map(|s| s.uid.as_str()).collect::<Vec<_>>(),
        "Sites selected"
    );
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::scrapers::tests::{FakeClient, site};
    use crate::storage::SqliteStore;
    use crate::transform::article_id;
    use tempfile::tempdir;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_single_survivor() {
        // One article has no body and never leaves extraction; two share a title.
        let client = FakeClient::default()
            .with_article("/a", "http://x.com/a", Some("Misma noticia"), "El gato la casa")
            .with_article("/b", "http://x.com/b", Some("Otra"), "")
            .with_article("/c", "http://x.com/c", Some("Misma noticia"), "Otro cuerpo");

        let mut pipeline = Pipeline::new(client, store());
        let counts = pipeline.run_site(&site("x", "http://x.com")).await.unwrap();
        assert_eq!(
            counts,
            SiteCounts {
                extracted: 2,
                cleaned: 1,
                loaded: 1
            }
        );

        let stored = pipeline.sink().get(&article_id("http://x.com/a")).unwrap().unwrap();
        assert_eq!(stored.title, "Misma noticia");
        assert_eq!(stored.host, "x.com");
        assert_eq!(stored.source_uid, "x");
        assert_eq!(stored.n_tokens_body, 2);
        assert_eq!(stored.n_tokens_title, 2);
    }

    #[tokio::test]
    async fn test_run_all_isolates_failing_site() {
        let client = FakeClient::default().with_article("/a", "http://x.com/a", Some("A"), "texto");
        let mut pipeline = Pipeline::new(client, store());

        let good = site("x", "http://x.com");
        // Same article reached through a second site: its url is already stored.
        let clash = site("y", "http://x.com");
        let report = pipeline.run_all(&[&good, &clash]).await;

        assert_eq!(report.sites.len(), 2);
        assert!(report.sites[0].outcome.is_ok());
        assert!(matches!(
            report.sites[1].outcome,
            Err(PipelineError::Integrity(_))
        ));
        assert!(!report.is_success());
        assert_eq!(report.loaded(), 1);
        assert_eq!(pipeline.sink().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_homepage_failure_reported_per_site() {
        let client = FakeClient {
            homepage_down: true,
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(client, store());
        let a = site("a", "http://a.com");
        let b = site("b", "http://b.com");
        let report = pipeline.run_all(&[&a, &b]).await;
        assert_eq!(report.failed().count(), 2);
        assert!(report
            .failed()
            .all(|s| matches!(s.outcome, Err(PipelineError::Fetch { .. }))));
    }

    #[tokio::test]
    async fn test_stage_dir_receives_artifacts() {
        let dir = tempdir().unwrap();
        let client = FakeClient::default()
            .with_article("/nota-uno", "http://x.com/nota-uno", None, "uno\ndos");
        let mut pipeline = Pipeline::new(client, store()).with_stage_dir(dir.path());
        pipeline.run_site(&site("x", "http://x.com")).await.unwrap();

        let raw_name = artifacts::raw_filename("x", Local::now().date_naive());
        let raw_path = dir.path().join(&raw_name);
        assert!(raw_path.exists());

        let clean = artifacts::read_clean(&artifacts::clean_path(&raw_path)).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].title, "Nota uno");
        assert_eq!(clean[0].body, "uno dos");
    }

    #[tokio::test]
    async fn test_stage_by_stage_files() {
        let dir = tempdir().unwrap();
        let client = FakeClient::default()
            .with_article("/a", "http://x.com/a", Some("Primera"), "uno")
            .with_article("/b", "http://x.com/b", Some("Segunda"), "dos");

        let raw_path = extract_to_file(&client, &site("x", "http://x.com"), dir.path())
            .await
            .unwrap();
        let clean_path = transform_file(&raw_path).unwrap();

        let mut sink = store();
        assert_eq!(load_file(&clean_path, &mut sink).unwrap(), 2);
        assert_eq!(sink.get(&article_id("http://x.com/b")).unwrap().unwrap().source_uid, "x");

        // Loading the same file again collides on url.
        assert!(matches!(
            load_file(&clean_path, &mut sink),
            Err(PipelineError::Integrity(_))
        ));
        assert_eq!(sink.count().unwrap(), 2);
    }

    #[test]
    fn test_resolve_sites_rejects_unknown() {
        let config = Config::from_yaml(
            r#"
news_sites:
  x:
    url: http://x.com
    queries:
      homepage_article_links: a
      article_title: h1
      article_body: p
"#,
        )
        .unwrap();
        assert_eq!(resolve_sites(&config, &[]).unwrap().len(), 1);
        assert!(matches!(
            resolve_sites(&config, &["nbcsports".to_string()]),
            Err(PipelineError::Config(_))
        ));
    }
}
