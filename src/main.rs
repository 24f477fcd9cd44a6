use chrono::Local;
use papers_scrap::{info_time, process::process_site, HarvestConfig, Result};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::INFO)
        .init();

    let start_time = Local::now();
    let report = process_site(HarvestConfig::default()).await?;
    info_time!(start_time, "Full program time, {} records", report.records_written);

    Ok(())
}
