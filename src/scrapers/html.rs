//! HTML scraper driven by per-site CSS selectors.
//!
//! Each configured site names three selectors: the homepage elements whose
//! `href` points at an article, the article headline, and the article body
//! paragraphs. Selectors are compiled once when the scraper is built, so a
//! typo in the configuration fails the run before any request goes out.

use super::ScrapingClient;
use crate::config::{Config, SiteConfig};
use crate::error::{PipelineError, Result};
use crate::models::{RawArticle, non_empty};
use crate::utils::truncate_for_log;
use itertools::Itertools;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Compiled selectors for one site.
#[derive(Debug)]
pub struct SiteSelectors {
    links: Selector,
    title: Selector,
    body: Selector,
}

impl SiteSelectors {
    pub fn compile(site: &SiteConfig) -> Result<Self> {
        let parse = |query: &str| {
            Selector::parse(query).map_err(|e| {
                PipelineError::Config(format!(
                    "invalid selector `{}` for site `{}`: {}",
                    query, site.uid, e
                ))
            })
        };
        Ok(SiteSelectors {
            links: parse(&site.queries.homepage_article_links)?,
            title: parse(&site.queries.article_title)?,
            body: parse(&site.queries.article_body)?,
        })
    }
}

/// [`ScrapingClient`] that fetches pages over HTTP and reads them with CSS
/// selectors.
pub struct HtmlScraper {
    client: reqwest::Client,
    selectors: HashMap<String, SiteSelectors>,
}

impl HtmlScraper {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {e}")))?;

        let selectors = config
            .news_sites
            .iter()
            .map(|(uid, site)| Ok((uid.clone(), SiteSelectors::compile(site)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(HtmlScraper { client, selectors })
    }

    fn selectors_for(&self, site: &SiteConfig) -> Result<&SiteSelectors> {
        self.selectors
            .get(&site.uid)
            .ok_or_else(|| PipelineError::Config(format!("no selectors for site `{}`", site.uid)))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PipelineError::fetch(url, e))?;
        response.text().await.map_err(|e| PipelineError::fetch(url, e))
    }
}

impl ScrapingClient for HtmlScraper {
    #[instrument(level = "info", skip_all, fields(site = %site.uid))]
    async fn fetch_homepage_links(&self, site: &SiteConfig) -> Result<Vec<String>> {
        let selectors = self.selectors_for(site)?;
        let html = self.get_text(&site.url).await?;
        let links = parse_homepage_links(&html, &selectors.links);
        info!(count = links.len(), source = %site.url, "Indexed homepage links");
        Ok(links)
    }

    #[instrument(level = "debug", skip_all, fields(site = %site.uid, %url))]
    async fn fetch_article(&self, site: &SiteConfig, url: &str) -> Result<RawArticle> {
        let selectors = self.selectors_for(site)?;
        let html = self.get_text(url).await?;
        let article = parse_article(url, &html, selectors);
        debug!(
            bytes = article.body.len(),
            preview = %truncate_for_log(&article.body, 80),
            "Parsed article"
        );
        Ok(article)
    }
}

/// `href` of every element matching `links`, in document order, without
/// repeats.
pub fn parse_homepage_links(html: &str, links: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(links)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Read the headline and body out of an article page.
///
/// The title is the text of the first headline match; the body joins the
/// text of every body match with newlines.
pub fn parse_article(url: &str, html: &str, selectors: &SiteSelectors) -> RawArticle {
    let document = Html::parse_document(html);

    let title = document
        .select(&selectors.title)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .and_then(non_empty);

    let body = document
        .select(&selectors.body)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .join("\n");

    RawArticle {
        url: url.to_string(),
        title,
        body,
    }
}
