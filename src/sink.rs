use std::fmt::Write as _;
use std::path::Path;

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
    sync::Mutex,
};

use crate::{Error, Result, CSV_HEADER, NOT_FOUND};

/// One output line: a paper's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub year: u16,
    pub title: String,
    pub authors: String,
    pub paper_url: String,
    /// The PDF URL or [`NOT_FOUND`].
    pub pdf_url: String,
}

impl OutputRecord {
    pub fn new(
        year: u16,
        title: impl Into<String>,
        authors: impl Into<String>,
        paper_url: impl Into<String>,
        pdf_url: Option<impl Into<String>>,
    ) -> Self {
        Self {
            year,
            title: title.into(),
            authors: authors.into(),
            paper_url: paper_url.into(),
            pdf_url: pdf_url.map_or_else(|| NOT_FOUND.to_string(), Into::into),
        }
    }

    /// `year,"title","authors","paper url","pdf url"` plus a newline.
    /// Embedded quotes are doubled.
    pub fn to_csv_line(&self) -> String {
        let mut line = self.year.to_string();
        for field in [&self.title, &self.authors, &self.paper_url, &self.pdf_url] {
            let _ = write!(line, ",\"{}\"", field.replace('"', "\"\""));
        }
        line.push('\n');
        line
    }
}

/// Append-only CSV output shared by every worker.
///
/// Each [`append`](RecordSink::append) writes and flushes a whole line while holding the
/// lock, so concurrent records never interleave. There is no way to reach the file
/// around the lock.
#[derive(Debug)]
pub struct RecordSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl RecordSink {
    /// Creates (or truncates) the output file and writes the header row.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| Error::file_io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(CSV_HEADER.as_bytes())
            .await
            .map_err(|e| Error::file_io(path, e))?;
        writer.flush().await.map_err(|e| Error::file_io(path, e))?;

        Ok(Self {
            writer: Mutex::new(Some(writer)),
        })
    }

    pub async fn append(&self, record: &OutputRecord) -> Result<()> {
        let line = record.to_csv_line();

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::SinkClosed)?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(Error::Sink)?;
        writer.flush().await.map_err(Error::Sink)?;
        Ok(())
    }

    /// Flushes and closes the file. Later appends fail with [`Error::SinkClosed`];
    /// closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        writer.shutdown().await.map_err(Error::Sink)
    }
}
