use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::fs;
use tracing::{error, info, warn};

use crate::parse::{parse_index, parse_paper, pdf_file_name, Item};
use crate::pool::{Drained, WorkerPool};
use crate::request::{http_client, FileDownloader, PageFetcher};
use crate::sink::{OutputRecord, RecordSink};
use crate::{info_time, Error, HarvestConfig, Result};

/// How one paper's task ended.
#[derive(Debug)]
pub enum ItemOutcome {
    /// A record was appended to the output file.
    Recorded { download: DownloadStatus },
    /// The paper page couldn't be fetched. Nothing was written.
    Skipped(Error),
    /// Parsing or writing the record failed. Nothing was written.
    Failed(Error),
}

#[derive(Debug)]
pub enum DownloadStatus {
    Downloaded(u64),
    Failed(Error),
    NotAttempted,
}

/// How one year's index page was handled.
#[derive(Debug)]
pub enum PartitionOutcome {
    Submitted(usize),
    /// The index page had no paper links.
    Empty,
    Failed(Error),
}

/// Totals for a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub partitions_submitted: usize,
    pub partitions_skipped: usize,
    pub items_submitted: usize,
    pub records_written: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub downloads_completed: usize,
    pub downloads_failed: usize,
    pub stragglers: usize,
}

impl HarvestReport {
    fn record_partition(&mut self, outcome: &PartitionOutcome) {
        match outcome {
            PartitionOutcome::Submitted(n) => {
                self.partitions_submitted += 1;
                self.items_submitted += n;
            }
            PartitionOutcome::Empty | PartitionOutcome::Failed(_) => self.partitions_skipped += 1,
        }
    }

    fn record_items(&mut self, drained: Drained<ItemOutcome>) {
        self.stragglers = drained.stragglers;
        for res in drained.finished {
            match res {
                Ok(ItemOutcome::Recorded { download }) => {
                    self.records_written += 1;
                    match download {
                        DownloadStatus::Downloaded(_) => self.downloads_completed += 1,
                        DownloadStatus::Failed(_) => self.downloads_failed += 1,
                        DownloadStatus::NotAttempted => {}
                    }
                }
                Ok(ItemOutcome::Skipped(_)) => self.items_skipped += 1,
                Ok(ItemOutcome::Failed(_)) => self.items_failed += 1,
                Err(e) => {
                    error!(error = %e, "paper task panicked");
                    self.items_failed += 1;
                }
            }
        }
    }
}

impl fmt::Display for HarvestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "years: {} harvested, {} skipped | papers: {} submitted, {} recorded, {} skipped, {} failed | pdfs: {} downloaded, {} failed | {} still running",
            self.partitions_submitted,
            self.partitions_skipped,
            self.items_submitted,
            self.records_written,
            self.items_skipped,
            self.items_failed,
            self.downloads_completed,
            self.downloads_failed,
            self.stragglers,
        )
    }
}

/// Per-paper work: fetch the paper page, pull out authors and the PDF link,
/// download the PDF and append the record. Cheap to clone, one clone per task.
#[derive(Debug, Clone)]
pub struct ItemProcessor {
    fetcher: PageFetcher,
    downloader: FileDownloader,
    sink: Arc<RecordSink>,
}

impl ItemProcessor {
    pub fn new(fetcher: PageFetcher, downloader: FileDownloader, sink: Arc<RecordSink>) -> Self {
        Self {
            fetcher,
            downloader,
            sink,
        }
    }

    /// Never panics on bad input or network trouble; every failure is reported in the outcome.
    pub async fn process(self, item: Item, year_dir: PathBuf) -> ItemOutcome {
        info!(year = item.year, title = %item.title, "Processing paper");

        let html = match self.fetcher.fetch_html(&item.detail_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(title = %item.title, error = %e, "Error processing paper");
                return ItemOutcome::Skipped(e);
            }
        };

        let meta = match parse_paper(html, item.detail_url.clone()).await {
            Ok(meta) => meta,
            Err(e) => {
                error!(title = %item.title, error = %e, "Couldn't parse paper page");
                return ItemOutcome::Failed(e);
            }
        };

        let download = match &meta.pdf_url {
            Some(pdf_url) => {
                let dest = year_dir.join(pdf_file_name(&item.title));
                info!(url = %pdf_url, "Downloading PDF");
                match self.downloader.download(pdf_url, &dest).await {
                    Ok(bytes) => {
                        info!(path = %dest.display(), bytes, "Downloaded");
                        DownloadStatus::Downloaded(bytes)
                    }
                    Err(e) => {
                        warn!(url = %pdf_url, error = %e, "Failed to download PDF");
                        DownloadStatus::Failed(e)
                    }
                }
            }
            None => DownloadStatus::NotAttempted,
        };

        let record = OutputRecord::new(
            item.year,
            item.title.as_str(),
            meta.authors,
            item.detail_url.as_str(),
            meta.pdf_url.as_ref().map(|url| url.as_str()),
        );
        if let Err(e) = self.sink.append(&record).await {
            error!(title = %item.title, error = %e, "Error saving paper details");
            return ItemOutcome::Failed(e);
        }

        info!(title = %item.title, "Processed paper");
        ItemOutcome::Recorded { download }
    }
}

/// Creates `dir` and any missing parents. Succeeds if it already exists.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::file_io(dir, e))
}

/// Fetches one year's index page and submits a task per paper to the pool.
/// Doesn't wait for those tasks.
pub async fn harvest_year(
    year: u16,
    config: &HarvestConfig,
    fetcher: &PageFetcher,
    processor: &ItemProcessor,
    pool: &mut WorkerPool<ItemOutcome>,
) -> PartitionOutcome {
    let year_dir = config.year_dir(year);
    if let Err(e) = ensure_dir(&year_dir).await {
        warn!(year, error = %e, "Error fetching papers for year");
        return PartitionOutcome::Failed(e);
    }

    let items = match fetch_index(year, config, fetcher).await {
        Ok(items) => items,
        Err(e) => {
            warn!(year, error = %e, "Error fetching papers for year");
            return PartitionOutcome::Failed(e);
        }
    };
    if items.is_empty() {
        warn!(year, "No papers found for year");
        return PartitionOutcome::Empty;
    }

    let submitted = items.len();
    for item in items {
        pool.submit(processor.clone().process(item, year_dir.clone()));
    }
    PartitionOutcome::Submitted(submitted)
}

async fn fetch_index(year: u16, config: &HarvestConfig, fetcher: &PageFetcher) -> Result<Vec<Item>> {
    let url = config.index_url(year)?;
    let html = fetcher.fetch_html_politely(&url).await?;
    parse_index(html, year, config.base_url.clone()).await
}

/// Runs a full harvest. Only failing to set up storage, the HTTP client or the output
/// file is an error; everything after that is counted in the report.
pub async fn process_site(config: HarvestConfig) -> Result<HarvestReport> {
    let start_time = Local::now();
    info!(root = %config.storage_root.display(), "Started scraping");

    fs::create_dir_all(&config.storage_root)
        .await
        .map_err(|source| Error::Setup {
            path: config.storage_root.clone(),
            source,
        })?;

    let client = http_client()?;
    let fetcher = PageFetcher::new(client.clone(), config.politeness);
    let downloader = FileDownloader::new(client);
    let mut pool = WorkerPool::new(config.workers);
    let sink = Arc::new(RecordSink::create(&config.output_path()).await?);
    let processor = ItemProcessor::new(fetcher.clone(), downloader, sink.clone());

    let mut report = HarvestReport::default();
    for year in config.years() {
        let year_start = Local::now();
        let outcome = harvest_year(year, &config, &fetcher, &processor, &mut pool).await;
        if let PartitionOutcome::Submitted(n) = outcome {
            info_time!(year_start, "Submitted {} papers for {}", n, year);
        }
        report.record_partition(&outcome);
    }

    info!(pending = pool.pending(), "All years submitted, waiting for workers");
    report.record_items(pool.join(config.drain_timeout).await);

    if let Err(e) = sink.close().await {
        error!(error = %e, "Couldn't close the output file");
    }
    info_time!(start_time, "Finished harvest: {}", report);

    Ok(report)
}
