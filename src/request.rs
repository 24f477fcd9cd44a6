use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use reqwest::{redirect, Client};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;
use url::Url;

use crate::{Error, Result, DOWNLOAD_CHUNK_SIZE, REQUEST_TIMEOUT, USER_AGENT};

/// Builds the HTTP client shared by the fetcher and the downloader.
/// `Client` uses an `Arc` internally so clones are cheap.
pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(5))
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Randomized pause taken before index page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    min: Duration,
    max: Duration,
}

impl PolitenessDelay {
    /// Delays are drawn uniformly from `[min, max)`. If `max <= min` the delay is always `min`.
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }

    /// Suspends the calling task for one sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "politeness delay");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Fetches HTML pages. Only index pages go through the politeness delay.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    politeness: PolitenessDelay,
}

impl PageFetcher {
    pub fn new(client: Client, politeness: PolitenessDelay) -> Self {
        Self { client, politeness }
    }

    /// Waits out the politeness delay, then requests the page.
    pub async fn fetch_html_politely(&self, url: &Url) -> Result<String> {
        self.politeness.wait().await;
        self.fetch_html(url).await
    }

    /// Requests a page and returns a `Result<String>` containing the HTML.
    /// Non-success statuses are errors.
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| Error::fetch(url, e))?;
        let html = res.text().await.map_err(|e| Error::fetch(url, e))?;
        Ok(html)
    }
}

/// Streams response bodies to files on disk.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    client: Client,
}

impl FileDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Downloads `url` into `dest`, replacing anything already there.
    /// Returns the number of bytes written.
    ///
    /// The body is streamed into a temp file next to `dest` that belongs to this call only,
    /// then renamed onto `dest`. Concurrent downloads to the same path never tear the file:
    /// the last one to finish wins whole. On failure only the temp file is removed.
    pub async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let mut res = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| Error::fetch(url, e))?;

        let part = part_path(dest);
        let written = match stream_to_file(&mut res, url, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&part, dest).await {
            let _ = fs::remove_file(&part).await;
            return Err(Error::file_io(dest, e));
        }
        Ok(written)
    }
}

/// `<dir>/.<file name>.<pid>-<n>.part`, unique per download within the process.
fn part_path(dest: &Path) -> PathBuf {
    static NEXT_PART: AtomicU64 = AtomicU64::new(0);

    let n = NEXT_PART.fetch_add(1, Ordering::Relaxed);
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{}-{n}.part", std::process::id()))
}

// The file handle is dropped when this returns, whichever branch it takes.
async fn stream_to_file(res: &mut reqwest::Response, url: &Url, path: &Path) -> Result<u64> {
    let file = File::create(path)
        .await
        .map_err(|e| Error::file_io(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0u64;
    while let Some(chunk) = res.chunk().await.map_err(|e| Error::fetch(url, e))? {
        for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| Error::file_io(path, e))?;
            written += piece.len() as u64;
        }
    }
    writer.flush().await.map_err(|e| Error::file_io(path, e))?;

    Ok(written)
}
