use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't create the storage directory {path:?}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't fetch {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("File Io Error at {path:?}: {source}")]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't write a record to the output file: {0}")]
    Sink(#[source] std::io::Error),
    #[error("The output file is already closed.")]
    SinkClosed,

    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn fetch(url: impl ToString, source: reqwest::Error) -> Self {
        Error::Fetch {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }
}
