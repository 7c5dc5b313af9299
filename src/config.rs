//! Site configuration.
//!
//! The configuration is a YAML document mapping each site identifier to its
//! base URL and the CSS selectors used to scrape it. It is loaded once at
//! start-up and handed to each component by reference; nothing reads it from
//! global state.
//!
//! ```yaml
//! news_sites:
//!   elpais:
//!     url: https://elpais.com
//!     queries:
//!       homepage_article_links: "article h2 a"
//!       article_title: "h1"
//!       article_body: "div.a_c p"
//! request_timeout_secs: 20
//! ```

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("news_etl/", env!("CARGO_PKG_VERSION"));

/// CSS selectors describing where a site keeps its links, titles and bodies.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteQueries {
    pub homepage_article_links: String,
    pub article_title: String,
    pub article_body: String,
}

/// A single news site.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    /// Filled in from the map key when the config is loaded.
    #[serde(skip)]
    pub uid: String,
    /// Base host URL, without a trailing slash.
    pub url: String,
    pub queries: SiteQueries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub news_sites: BTreeMap<String, SiteConfig>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    user_agent: Option<String>,
}

impl Config {
    /// Read and validate the configuration file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(sites = config.news_sites.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(raw)
            .map_err(|e| PipelineError::Config(format!("invalid YAML: {e}")))?;

        if config.news_sites.is_empty() {
            return Err(PipelineError::Config("no news_sites configured".into()));
        }

        for (uid, site) in config.news_sites.iter_mut() {
            if site.url.trim().is_empty() {
                return Err(PipelineError::Config(format!("site `{uid}` has an empty url")));
            }
            site.uid = uid.clone();
            site.url = site.url.trim().trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    /// Look up a site by identifier.
    pub fn site(&self, uid: &str) -> Result<&SiteConfig> {
        self.news_sites.get(uid).ok_or_else(|| {
            PipelineError::Config(format!(
                "unknown site `{}` (configured: {})",
                uid,
                self.site_uids().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Resolve a list of requested sites up front, so an unknown identifier
    /// fails the run before any stage starts. An empty request means all sites.
    pub fn select_sites(&self, requested: &[String]) -> Result<Vec<&SiteConfig>> {
        if requested.is_empty() {
            return Ok(self.news_sites.values().collect());
        }
        requested.iter().map(|uid| self.site(uid)).collect()
    }

    pub fn site_uids(&self) -> impl Iterator<Item = &str> {
        self.news_sites.keys().map(String::as_str)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
news_sites:
  elpais:
    url: https://elpais.com/
    queries:
      homepage_article_links: "article h2 a"
      article_title: "h1"
      article_body: "div.a_c p"
  eluniversal:
    url: https://www.eluniversal.com.mx
    queries:
      homepage_article_links: ".field-content a"
      article_title: ".pane-content h1"
      article_body: ".field-name-body p"
request_timeout_secs: 5
"#;

    #[test]
    fn test_load_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.news_sites.len(), 2);

        let site = config.site("elpais").unwrap();
        assert_eq!(site.uid, "elpais");
        assert_eq!(site.url, "https://elpais.com");
        assert_eq!(site.queries.article_title, "h1");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.user_agent().starts_with("news_etl/"));
    }

    #[test]
    fn test_unknown_site_is_config_error() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let err = config.site("nbcsports").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("elpais"));
    }

    #[test]
    fn test_select_sites() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        let all = config.select_sites(&[]).unwrap();
        let uids: Vec<_> = all.iter().map(|s| s.uid.as_str()).collect();
        assert_eq!(uids, vec!["elpais", "eluniversal"]);

        let one = config.select_sites(&["eluniversal".to_string()]).unwrap();
        assert_eq!(one.len(), 1);

        assert!(config
            .select_sites(&["elpais".to_string(), "missing".to_string()])
            .is_err());
    }

    #[test]
    fn test_empty_sites_rejected() {
        let err = Config::from_yaml("news_sites: {}\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(Config::from_yaml("news_sites: [").is_err());
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
news_sites:
  a:
    url: http://a.com
    queries:
      homepage_article_links: a
      article_title: h1
      article_body: p
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
