//! The transform stage: raw batch in, clean batch out.
//!
//! A batch goes through a fixed sequence of passes. Each pass takes the whole
//! batch by value and returns a new one, and later passes read columns the
//! earlier ones filled in, so the order below is load-bearing:
//!
//! 1. attach the batch's `source_uid`
//! 2. extract `host` from `url`
//! 3. fill missing titles from the url's last path segment
//! 4. derive `id` from the url (MD5, lowercase hex)
//! 5. replace `\n` and `\t` in the body with spaces
//! 6. count valid words in body, then title
//! 7. drop rows with a repeated title
//! 8. drop rows with any missing column, then rows with a repeated id
//!
//! Rows lost along the way are not errors. A record that cannot be repaired
//! is logged and left out of the clean batch.

use crate::models::{ArticleRow, CleanArticle, RawArticle};
use crate::stopwords;
use itertools::Itertools;
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;
use tracing::{debug, info, instrument};
use url::Url;

// Word runs (keeping in-word apostrophes and hyphens together) or punctuation runs.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+(?:['’-]\w+)*|[^\w\s]+").expect("token regex"));

/// Text column that gets its words counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    Title,
    Body,
}

impl TextColumn {
    fn name(self) -> &'static str {
        match self {
            TextColumn::Title => "title",
            TextColumn::Body => "body",
        }
    }
}

/// Run every pass over `batch` and return the surviving clean records.
#[instrument(level = "info", skip_all, fields(%source_uid, rows = batch.len()))]
pub fn transform(batch: Vec<RawArticle>, source_uid: &str) -> Vec<CleanArticle> {
    info!("Data transformation has started");
    let stop_words = stopwords::spanish();

    let rows: Vec<ArticleRow> = batch.into_iter().map(ArticleRow::from).collect();
    let rows = add_source_uid(rows, source_uid);
    let rows = extract_host(rows);
    let rows = fill_missing_titles(rows);
    let rows = generate_ids(rows);
    let rows = remove_new_lines_from_body(rows);
    let rows = validate_words(rows, TextColumn::Body, stop_words);
    let rows = validate_words(rows, TextColumn::Title, stop_words);
    let rows = remove_duplicate_entries(rows);
    let clean = drop_rows_with_missing_values(rows);

    info!(count = clean.len(), "Data transformation finished");
    clean
}

/// The site identifier encoded in an artifact filename: everything before
/// the first `_` of the file name.
///
/// `elpais_2024_03_01_articles.csv` → `elpais`.
pub fn source_uid_from_filename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let uid = name.split('_').next().unwrap_or_default().to_string();
    info!(%uid, "Source uid detected");
    uid
}

/// Pass 1: stamp every row with the batch's source.
///
/// # Arguments
///
/// * `rows` - The in-flight batch
/// * `source_uid` - Config key of the site the batch came from
///
/// # Returns
///
/// The same rows with `source_uid` set.
pub fn add_source_uid(rows: Vec<ArticleRow>, source_uid: &str) -> Vec<ArticleRow> {
    info!(%source_uid, count = rows.len(), "Filling source_uid column");
    rows.into_iter()
        .map(|row| ArticleRow {
            source_uid: Some(source_uid.to_string()),
            ..row
        })
        .collect()
}

/// Pass 2: set `host` to the url's authority, or leave it missing when the
/// url does not parse.
pub fn extract_host(rows: Vec<ArticleRow>) -> Vec<ArticleRow> {
    info!(count = rows.len(), "Extracting host from urls");
    rows.into_iter()
        .map(|row| {
            let host = row.url.as_deref().and_then(authority);
            ArticleRow { host, ..row }
        })
        .collect()
}

/// Network authority of `url`: `[user[:password]@]host[:port]`.
pub fn authority(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;

    let mut out = String::new();
    if !parsed.username().is_empty() {
        out.push_str(parsed.username());
        if let Some(password) = parsed.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }
    out.push_str(host);
    if let Some(port) = parsed.port() {
        let _ = write!(out, ":{port}");
    }
    Some(out)
}

/// Pass 3: give untitled rows a title built by [`title_from_url`].
/// Rows that already have a title are left alone.
pub fn fill_missing_titles(rows: Vec<ArticleRow>) -> Vec<ArticleRow> {
    info!(
        missing = rows.iter().filter(|r| r.title.is_none()).count(),
        "Filling missing titles"
    );
    rows.into_iter()
        .map(|row| match row.title {
            Some(_) => row,
            None => {
                let title = row.url.as_deref().and_then(title_from_url);
                ArticleRow { title, ..row }
            }
        })
        .collect()
}

/// Build a title from the url's last path segment: `/breaking-news-today`
/// becomes `Breaking news today`. `None` when the url ends in `/`.
pub fn title_from_url(url: &str) -> Option<String> {
    let segment = url.rsplit('/').next().filter(|s| !s.is_empty())?;
    Some(capitalize(&segment.replace('-', " ")))
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    }
}

/// Pass 4: derive each row's `id` from its url with [`article_id`].
pub fn generate_ids(rows: Vec<ArticleRow>) -> Vec<ArticleRow> {
    info!(count = rows.len(), "Generating uids for rows");
    rows.into_iter()
        .map(|row| {
            let id = row.url.as_deref().map(article_id);
            ArticleRow { id, ..row }
        })
        .collect()
}

/// Content-derived id: MD5 of the url bytes as 32 lowercase hex characters.
pub fn article_id(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// Pass 5: replace every `\n` and `\t` in the body with a single space.
///
/// Other whitespace, including `\r`, is kept as is.
pub fn remove_new_lines_from_body(rows: Vec<ArticleRow>) -> Vec<ArticleRow> {
    info!(count = rows.len(), "Removing new lines from body");
    rows.into_iter()
        .map(|row| {
            let body = row
                .body
                .map(|body| body.replace('\n', " "))
                .map(|body| body.replace('\t', " "));
            ArticleRow { body, ..row }
        })
        .collect()
}

/// Pass 6: store the number of valid words of `column` in its `n_tokens_*`
/// column.
///
/// # Arguments
///
/// * `rows` - The in-flight batch
/// * `column` - Which text column to count
/// * `stop_words` - Lower-case words that never count
///
/// # Returns
///
/// The rows with the count filled in. Rows where the column is missing get
/// no count and are dropped later by pass 8.
pub fn validate_words(
    rows: Vec<ArticleRow>,
    column: TextColumn,
    stop_words: &HashSet<&str>,
) -> Vec<ArticleRow> {
    info!(column = column.name(), count = rows.len(), "Starting to validate words");
    rows.into_iter()
        .map(|row| match column {
            TextColumn::Body => ArticleRow {
                n_tokens_body: row.body.as_deref().map(|t| count_valid_words(t, stop_words)),
                ..row
            },
            TextColumn::Title => ArticleRow {
                n_tokens_title: row.title.as_deref().map(|t| count_valid_words(t, stop_words)),
                ..row
            },
        })
        .collect()
}

/// Split `text` into word and punctuation tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str())
}

/// Count tokens that are purely alphabetic and, once lower-cased, not in
/// `stop_words`.
pub fn count_valid_words(text: &str, stop_words: &HashSet<&str>) -> u64 {
    tokenize(text)
        .filter(|token| token.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .filter(|token| !stop_words.contains(token.as_str()))
        .count() as u64
}

/// Pass 7: keep the first row for each title.
///
/// Rows without a title share one key, so only the first of them survives;
/// pass 8 drops it anyway.
pub fn remove_duplicate_entries(rows: Vec<ArticleRow>) -> Vec<ArticleRow> {
    let before = rows.len();
    let kept: Vec<ArticleRow> = rows.into_iter().unique_by(|row| row.title.clone()).collect();
    info!(dropped = before - kept.len(), "Removing duplicate entries");
    kept
}

/// Pass 8: turn complete rows into [`CleanArticle`]s and drop the rest.
///
/// Repeated ids are dropped here, keeping the first complete row for each,
/// so an incomplete copy of a url never shadows a complete one.
///
/// # Arguments
///
/// * `rows` - The in-flight batch after title dedup
///
/// # Returns
///
/// The clean batch, in input order, with unique ids.
pub fn drop_rows_with_missing_values(rows: Vec<ArticleRow>) -> Vec<CleanArticle> {
    let before = rows.len();
    let complete: Vec<CleanArticle> = rows
        .into_iter()
        .filter_map(|row| match CleanArticle::try_from(row) {
            Ok(clean) => Some(clean),
            Err(e) => {
                debug!(error = %e, "Dropping incomplete row");
                None
            }
        })
        .collect();
    info!(dropped = before - complete.len(), "Dropping rows with missing values");

    let before = complete.len();
    let clean: Vec<CleanArticle> = complete.into_iter().unique_by(|a| a.id.clone()).collect();
    info!(dropped = before - clean.len(), "Removing repeated ids");
    clean
}
