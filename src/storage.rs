//! The load stage: persisting clean batches into SQLite.
//!
//! One table, `articles`, keyed by the content-derived id with a unique url.
//! A batch is inserted inside a single transaction. Any failure, including a
//! url that is already stored, rolls the whole batch back and is reported to
//! the caller; the Loader never skips or replaces rows on its own.

use crate::error::{PipelineError, Result};
use crate::models::CleanArticle;
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Destination for clean batches.
pub trait ArticleSink {
    /// Create the destination table if it does not exist yet.
    fn ensure_schema(&self) -> Result<()>;

    /// Insert every row of `articles` or none of them.
    fn insert_batch(&mut self, articles: &[CleanArticle]) -> Result<usize>;
}

/// [`ArticleSink`] backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` in WAL mode.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the SQLite file
    ///
    /// # Returns
    ///
    /// The store, or [`PipelineError::Storage`] if the file cannot be opened.
    /// The schema is not created here; call [`ArticleSink::ensure_schema`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.as_ref().display(), "Opened article store");
        Ok(SqliteStore { conn })
    }

    /// A private database that lives as long as the store.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Number of stored articles.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Fetch a stored article by id.
    #[cfg(test)]
    pub fn get(&self, id: &str) -> Result<Option<CleanArticle>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, body, host, title, source_uid, n_tokens_body, n_tokens_title, url
             FROM articles WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], |row| {
            Ok(CleanArticle {
                id: row.get(0)?,
                body: row.get(1)?,
                host: row.get(2)?,
                title: row.get(3)?,
                source_uid: row.get(4)?,
                n_tokens_body: row.get::<_, i64>(5)? as u64,
                n_tokens_title: row.get::<_, i64>(6)? as u64,
                url: row.get(7)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }
}

impl ArticleSink for SqliteStore {
    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS articles (
                id             TEXT PRIMARY KEY,
                body           TEXT NOT NULL,
                host           TEXT NOT NULL,
                title          TEXT NOT NULL,
                source_uid     TEXT NOT NULL,
                n_tokens_body  INTEGER NOT NULL,
                n_tokens_title INTEGER NOT NULL,
                url            TEXT NOT NULL UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source_uid);
            ",
        )?;
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    fn insert_batch(&mut self, articles: &[CleanArticle]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO articles
                    (id, body, host, title, source_uid, n_tokens_body, n_tokens_title, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for article in articles {
                debug!(id = %article.id, "Loading article into DB");
                stmt.execute(params![
                    article.id,
                    article.body,
                    article.host,
                    article.title,
                    article.source_uid,
                    article.n_tokens_body as i64,
                    article.n_tokens_title as i64,
                    article.url,
                ])
                .map_err(PipelineError::from_storage)?;
            }
        }
        tx.commit().map_err(PipelineError::from_storage)?;
        info!("Committed batch");
        Ok(articles.len())
    }
}
