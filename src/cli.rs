//! Command-line interface definitions.
//!
//! Each stage can be run on its own, taking a site identifier or an artifact
//! file, or the whole pipeline can be run in one process with `run`.
//! Paths to the configuration and the database can also come from the
//! environment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for news_etl.
///
/// # Examples
///
/// ```sh
/// # Full pipeline for every configured site
/// news_etl run
///
/// # One stage at a time
/// news_etl extract elpais
/// news_etl transform elpais_2024_03_01_articles.csv
/// news_etl load clean_elpais_2024_03_01_articles.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the sites configuration (YAML)
    #[arg(short, long, env = "NEWS_ETL_CONFIG", default_value = "config.yaml", global = true)]
    pub config: PathBuf,

    /// SQLite database the load stage writes to
    #[arg(short, long, env = "NEWS_ETL_DATABASE", default_value = "articles.db", global = true)]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape a site and write its raw articles to a CSV file
    Extract {
        /// Site identifier from the configuration
        site: String,

        /// Directory the raw CSV is written to
        #[arg(short, long, default_value = ".")]
        output_dir: String,
    },
    /// Clean a raw CSV file into `clean_<file>`
    Transform {
        /// Raw articles CSV produced by `extract`
        file: PathBuf,
    },
    /// Insert a clean CSV file into the database
    Load {
        /// Clean articles CSV produced by `transform`
        file: PathBuf,
    },
    /// Extract, transform and load in one process
    Run {
        /// Sites to process (default: every configured site)
        sites: Vec<String>,

        /// Also write each stage's CSV output into this directory
        #[arg(short, long)]
        stage_dir: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_positional_site() {
        let cli = Cli::parse_from(["news_etl", "extract", "elpais"]);
        match cli.command {
            Command::Extract { site, output_dir } => {
                assert_eq!(site, "elpais");
                assert_eq!(output_dir, ".");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.database, PathBuf::from("articles.db"));
    }

    #[test]
    fn test_transform_and_load_take_a_file() {
        let cli = Cli::parse_from(["news_etl", "transform", "elpais_2024_03_01_articles.csv"]);
        assert!(matches!(
            cli.command,
            Command::Transform { file } if file == PathBuf::from("elpais_2024_03_01_articles.csv")
        ));

        let cli = Cli::parse_from(["news_etl", "load", "clean_elpais.csv", "-d", "/tmp/a.db"]);
        assert!(matches!(cli.command, Command::Load { .. }));
        assert_eq!(cli.database, PathBuf::from("/tmp/a.db"));
    }

    #[test]
    fn test_run_defaults_to_all_sites() {
        let cli = Cli::parse_from(["news_etl", "--config", "sites.yaml", "run"]);
        match cli.command {
            Command::Run { sites, stage_dir } => {
                assert!(sites.is_empty());
                assert!(stage_dir.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("sites.yaml"));
    }

    #[test]
    fn test_run_with_sites_and_stage_dir() {
        let cli = Cli::parse_from(["news_etl", "run", "elpais", "eluniversal", "-s", "./stage"]);
        match cli.command {
            Command::Run { sites, stage_dir } => {
                assert_eq!(sites, vec!["elpais", "eluniversal"]);
                assert_eq!(stage_dir.as_deref(), Some("./stage"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_missing_positional_is_an_error() {
        assert!(Cli::try_parse_from(["news_etl", "extract"]).is_err());
    }
}
