//! Article records as they move through the pipeline.
//!
//! - [`RawArticle`]: what the Extractor hands over, straight off the page
//! - [`ArticleRow`]: the in-flight shape inside the Transformer, where any
//!   column may still be missing
//! - [`CleanArticle`]: the validated record the Loader persists
//!
//! Column order for every serialized form is declared once, in the `FIELDS`
//! constants. Writers and readers walk those lists; there is no other source
//! of truth for the artifact layout.

use crate::error::PipelineError;

/// A raw article as scraped from a news site.
///
/// # Fields
///
/// * `url` - Absolute URL the article was fetched from
/// * `title` - Headline, if the page had one
/// * `body` - Article text; never empty once the Extractor has accepted it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub url: String,
    pub title: Option<String>,
    pub body: String,
}

impl RawArticle {
    pub const FIELDS: [&'static str; 3] = ["url", "title", "body"];

    pub fn to_record(&self) -> [&str; 3] {
        [
            self.url.as_str(),
            self.title.as_deref().unwrap_or(""),
            self.body.as_str(),
        ]
    }
}

/// A record being worked on by the transform passes.
///
/// Every column is optional: a pass that cannot produce a value leaves it
/// `None`, and the final pass drops any row that still has a hole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRow {
    pub id: Option<String>,
    pub source_uid: Option<String>,
    pub host: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub n_tokens_title: Option<u64>,
    pub n_tokens_body: Option<u64>,
    pub url: Option<String>,
}

impl From<RawArticle> for ArticleRow {
    fn from(raw: RawArticle) -> Self {
        ArticleRow {
            url: non_empty(raw.url),
            title: raw.title.and_then(non_empty),
            body: non_empty(raw.body),
            ..Default::default()
        }
    }
}

/// A cleaned, validated article ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanArticle {
    /// MD5 of the url, lowercase hex.
    pub id: String,
    pub body: String,
    /// Network authority of `url`.
    pub host: String,
    pub title: String,
    /// Site the batch came from.
    pub source_uid: String,
    pub n_tokens_body: u64,
    pub n_tokens_title: u64,
    pub url: String,
}

impl CleanArticle {
    /// Column layout of clean artifacts and of the `articles` table.
    pub const FIELDS: [&'static str; 8] = [
        "id",
        "body",
        "host",
        "title",
        "source_uid",
        "n_tokens_body",
        "n_tokens_title",
        "url",
    ];

    pub fn to_record(&self) -> [String; 8] {
        [
            self.id.clone(),
            self.body.clone(),
            self.host.clone(),
            self.title.clone(),
            self.source_uid.clone(),
            self.n_tokens_body.to_string(),
            self.n_tokens_title.to_string(),
            self.url.clone(),
        ]
    }
}

impl TryFrom<ArticleRow> for CleanArticle {
    type Error = PipelineError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            PipelineError::Validation(format!(
                "missing `{}` for {}",
                field,
                row.url.as_deref().unwrap_or("<no url>")
            ))
        };

        Ok(CleanArticle {
            id: row.id.clone().ok_or_else(|| missing("id"))?,
            body: row.body.clone().ok_or_else(|| missing("body"))?,
            host: row.host.clone().ok_or_else(|| missing("host"))?,
            title: row.title.clone().ok_or_else(|| missing("title"))?,
            source_uid: row.source_uid.clone().ok_or_else(|| missing("source_uid"))?,
            n_tokens_body: row.n_tokens_body.ok_or_else(|| missing("n_tokens_body"))?,
            n_tokens_title: row.n_tokens_title.ok_or_else(|| missing("n_tokens_title"))?,
            url: row.url.clone().ok_or_else(|| missing("url"))?,
        })
    }
}

/// Empty text is treated as absent, the same way an empty CSV cell is.
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
