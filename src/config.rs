use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::request::PolitenessDelay;
use crate::{
    BASE_URL, DRAIN_TIMEOUT, INDEX_PATH, NEWEST_YEAR, OLDEST_YEAR, OUTPUT_FILE, POLITENESS_MAX,
    POLITENESS_MIN, STORAGE_DIR, WORKER_COUNT,
};

/// Everything a harvest run needs to know. `Default` uses the crate constants.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: Url,
    pub storage_root: PathBuf,
    /// Years are harvested from `newest_year` down to `oldest_year`, inclusive.
    pub newest_year: u16,
    pub oldest_year: u16,
    pub workers: usize,
    pub politeness: PolitenessDelay,
    pub drain_timeout: Duration,
}

impl HarvestConfig {
    pub fn years(&self) -> impl Iterator<Item = u16> {
        (self.oldest_year..=self.newest_year).rev()
    }

    pub fn index_url(&self, year: u16) -> crate::Result<Url> {
        let path = INDEX_PATH.replace("{year}", &year.to_string());
        Ok(self.base_url.join(&path)?)
    }

    pub fn year_dir(&self, year: u16) -> PathBuf {
        self.storage_root.join(year.to_string())
    }

    pub fn output_path(&self) -> PathBuf {
        self.storage_root.join(OUTPUT_FILE)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(BASE_URL).expect("BASE_URL is a valid absolute URL"),
            storage_root: PathBuf::from(STORAGE_DIR),
            newest_year: NEWEST_YEAR,
            oldest_year: OLDEST_YEAR,
            workers: WORKER_COUNT,
            politeness: PolitenessDelay::new(POLITENESS_MIN, POLITENESS_MAX),
            drain_timeout: DRAIN_TIMEOUT,
        }
    }
}
