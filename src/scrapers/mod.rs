//! The extract stage.
//!
//! Extraction follows the same two phases for every site:
//!
//! 1. **Indexing**: ask the scraping client for the article links on the
//!    site's homepage
//! 2. **Fetching**: resolve each link against the site's base URL with
//!    [`build_link`] and fetch the article
//!
//! An article whose fetch fails is logged and skipped, and so is an article
//! without a body. A failure to read the homepage fails the site as a whole,
//! as does any error other than a fetch failure (a site without compiled
//! selectors, for instance), since every later article would hit it too.
//!
//! The scraping itself sits behind [`ScrapingClient`]; [`html::HtmlScraper`]
//! is the implementation used in production.

pub mod html;

use crate::config::SiteConfig;
use crate::error::{PipelineError, Result};
use crate::models::RawArticle;
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

static PROPER_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://.+/.+$").expect("url regex"));
static ROOT_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/.+$").expect("root path regex"));

/// Source of homepage links and raw articles for a site.
pub trait ScrapingClient {
    /// Candidate article links on the site's homepage, in page order.
    async fn fetch_homepage_links(&self, site: &SiteConfig) -> Result<Vec<String>>;

    /// Fetch and parse the article at an absolute `url`. The body may come
    /// back empty; the caller decides what to do with it.
    async fn fetch_article(&self, site: &SiteConfig, url: &str) -> Result<RawArticle>;
}

/// Resolve a homepage link against the site's base URL.
///
/// Absolute links pass through untouched, root-relative links are appended
/// to the host, and anything else is joined to the host with a `/`.
pub fn build_link(host: &str, link: &str) -> String {
    if PROPER_URL.is_match(link) {
        link.to_string()
    } else if ROOT_PATH.is_match(link) {
        format!("{host}{link}")
    } else {
        format!("{host}/{link}")
    }
}

/// Extract the raw batch for one site.
///
/// # Returns
///
/// The articles that were fetched and had a body, in homepage order, or an
/// error if the homepage could not be read or an article failed with
/// anything but a fetch error.
#[instrument(level = "info", skip_all, fields(site = %site.uid, host = %site.url))]
pub async fn extract<C: ScrapingClient>(client: &C, site: &SiteConfig) -> Result<Vec<RawArticle>> {
    info!("Finding news links on homepage");
    let links = client.fetch_homepage_links(site).await?;
    info!(count = links.len(), "Indexed article links");

    let articles: Vec<RawArticle> = stream::iter(links)
        .then(|link| fetch_article(client, site, link))
        .try_filter_map(|article| std::future::ready(Ok(article)))
        .try_collect()
        .await?;

    info!(count = articles.len(), "Fetched article contents");
    Ok(articles)
}

/// Fetch a single article, returning `Ok(None)` when it has to be skipped.
async fn fetch_article<C: ScrapingClient>(
    client: &C,
    site: &SiteConfig,
    link: String,
) -> Result<Option<RawArticle>> {
    let url = build_link(&site.url, &link);
    debug!(%url, "Fetching article");

    match client.fetch_article(site, &url).await {
        Ok(article) if article.body.is_empty() => {
            warn!(%url, "Invalid article. Body is missing");
            Ok(None)
        }
        Ok(article) => {
            debug!(%url, title = ?article.title, "Article fetched");
            Ok(Some(article))
        }
        Err(e @ PipelineError::Fetch { .. }) => {
            warn!(%url, error = %e, "Error while fetching article");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
