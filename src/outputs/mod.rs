//! Files the pipeline writes between stages.
//!
//! - [`artifacts`]: raw and clean article batches as CSV
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── elpais_2024_03_01_articles.csv
//! └── clean_elpais_2024_03_01_articles.csv
//! ```

pub mod artifacts;
