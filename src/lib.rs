//! Harvests paper metadata and PDFs from a conference proceedings index.
//!
//! Years are walked newest first. Every paper found on a year's index page
//! becomes a task on a bounded worker pool that fetches the paper page,
//! downloads the PDF and appends one CSV line to a shared output file.

mod config;
mod error;
mod macros;
pub mod parse;
pub mod pool;
pub mod process;
pub mod request;
pub mod sink;

use std::time::Duration;

pub use config::HarvestConfig;
pub use error::{Error, Result};

const BASE_URL: &str = "https://papers.nips.cc";
/// Index page path, `{year}` gets replaced with the partition key.
const INDEX_PATH: &str = "/paper_files/paper/{year}";
const NEWEST_YEAR: u16 = 2023;
const OLDEST_YEAR: u16 = 2019;
const WORKER_COUNT: usize = 7;
const POLITENESS_MIN: Duration = Duration::from_millis(1000);
const POLITENESS_MAX: Duration = Duration::from_millis(3000);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const STORAGE_DIR: &str = "NeurIPS_Papers";

pub const OUTPUT_FILE: &str = "papers_output.csv";
pub const CSV_HEADER: &str = "Year,Title,Authors,Paper URL,PDF URL\n";
/// Written in place of the PDF URL when a paper page has no PDF link.
pub const NOT_FOUND: &str = "N/A";
pub const ARTIFACT_EXTENSION: &str = ".pdf";

const INDEX_ENTRY_SELECTOR: &str = "ul.paper-list li.conference a";
const AUTHOR_SELECTOR: &str = "i";
const ARTIFACT_SELECTOR: &str = r#"a[href$=".pdf"]"#;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("papers_scrap/", env!("CARGO_PKG_VERSION"));
/// Bytes copied per write while streaming a download to disk.
const DOWNLOAD_CHUNK_SIZE: usize = 1024;
