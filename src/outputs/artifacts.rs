//! CSV artifacts handed between stages.
//!
//! ```text
//! stage_dir/
//! ├── elpais_2024_03_01_articles.csv        # extract output: url,title,body
//! └── clean_elpais_2024_03_01_articles.csv  # transform output: CleanArticle::FIELDS
//! ```
//!
//! Header rows are written from the declared field lists and checked on the
//! way back in. Columns are looked up by name, so extra columns are ignored
//! and a missing one is an error. An empty cell reads back as a missing value.

use crate::error::{PipelineError, Result};
use crate::models::{CleanArticle, RawArticle, non_empty};
use chrono::NaiveDate;
use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// `{site}_{YYYY_MM_DD}_articles.csv`
pub fn raw_filename(site_uid: &str, date: NaiveDate) -> String {
    format!("{}_{}_articles.csv", site_uid, date.format("%Y_%m_%d"))
}

/// The clean artifact sits next to the raw one, prefixed with `clean_`.
pub fn clean_path(raw_path: &Path) -> PathBuf {
    let name = raw_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    raw_path.with_file_name(format!("clean_{name}"))
}

#[instrument(level = "info", skip_all, fields(path = %path.display(), count = articles.len()))]
pub fn write_raw(path: &Path, articles: &[RawArticle]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(RawArticle::FIELDS)?;
    for article in articles {
        writer.write_record(article.to_record())?;
    }
    writer.flush()?;
    info!("Wrote raw articles");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_raw(path: &Path) -> Result<Vec<RawArticle>> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::locate(path, reader.headers()?, &RawArticle::FIELDS)?;

    let mut articles = Vec::new();
    for record in reader.records() {
        let record = record?;
        articles.push(RawArticle {
            url: columns.get(&record, 0).to_string(),
            title: non_empty(columns.get(&record, 1).to_string()),
            body: columns.get(&record, 2).to_string(),
        });
    }
    info!(count = articles.len(), "Read raw articles");
    Ok(articles)
}

#[instrument(level = "info", skip_all, fields(path = %path.display(), count = articles.len()))]
pub fn write_clean(path: &Path, articles: &[CleanArticle]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CleanArticle::FIELDS)?;
    for article in articles {
        writer.write_record(article.to_record())?;
    }
    writer.flush()?;
    info!("Saved clean articles");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_clean(path: &Path) -> Result<Vec<CleanArticle>> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::locate(path, reader.headers()?, &CleanArticle::FIELDS)?;

    let mut articles = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let text = |i: usize| -> Result<String> {
            non_empty(columns.get(&record, i).to_string()).ok_or_else(|| PipelineError::Artifact {
                path: path.display().to_string(),
                message: format!("row {}: empty `{}`", line + 1, CleanArticle::FIELDS[i]),
            })
        };
        let count = |i: usize| -> Result<u64> {
            columns.get(&record, i).parse().map_err(|_| PipelineError::Artifact {
                path: path.display().to_string(),
                message: format!("row {}: `{}` is not a count", line + 1, CleanArticle::FIELDS[i]),
            })
        };

        articles.push(CleanArticle {
            id: text(0)?,
            body: text(1)?,
            host: text(2)?,
            title: text(3)?,
            source_uid: text(4)?,
            n_tokens_body: count(5)?,
            n_tokens_title: count(6)?,
            url: text(7)?,
        });
    }
    info!(count = articles.len(), "Read clean articles");
    Ok(articles)
}

/// Position of each declared field within a file's header row.
struct Columns(Vec<usize>);

impl Columns {
    fn locate(path: &Path, headers: &StringRecord, fields: &[&str]) -> Result<Self> {
        fields
            .iter()
            .map(|field| {
                headers.iter().position(|h| h == *field).ok_or_else(|| PipelineError::Artifact {
                    path: path.display().to_string(),
                    message: format!("missing column `{field}`"),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Columns)
    }

    fn get<'r>(&self, record: &'r StringRecord, field: usize) -> &'r str {
        record.get(self.0[field]).unwrap_or("")
    }
}
