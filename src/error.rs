//! Error taxonomy for the pipeline.
//!
//! Per-record problems (a failed article fetch, a record missing a field) are
//! recovered inside the stage that sees them and only ever show up in the logs.
//! The variants that escape a stage are the ones that abort a batch or the run:
//! storage integrity violations, configuration problems and I/O on artifacts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid record: {0}")]
    Validation(String),

    #[error("integrity violation while loading batch: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed artifact {path}: {message}")]
    Artifact { path: String, message: String },
}

impl PipelineError {
    pub fn fetch(url: &str, source: reqwest::Error) -> Self {
        PipelineError::Fetch {
            url: url.to_string(),
            source,
        }
    }

    /// Maps a rusqlite failure onto the taxonomy, singling out constraint
    /// violations (duplicate `id` or `url`).
    pub fn from_storage(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                PipelineError::Integrity(msg.unwrap_or_else(|| e.to_string()))
            }
            other => PipelineError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_maps_to_integrity() {
        let err = rusqlite::Error::SqliteFailure(
            // SQLITE_CONSTRAINT_UNIQUE
            rusqlite::ffi::Error::new(2067),
            Some("UNIQUE constraint failed: articles.url".to_string()),
        );
        match PipelineError::from_storage(err) {
            PipelineError::Integrity(msg) => assert!(msg.contains("articles.url")),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_other_storage_errors_stay_storage() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(
            PipelineError::from_storage(err),
            PipelineError::Storage(_)
        ));
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::Config("unknown site `foo`".into());
        assert_eq!(err.to_string(), "configuration error: unknown site `foo`");
    }
}
