use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};
use url::Url;

use crate::{
    Error, Result, ARTIFACT_EXTENSION, ARTIFACT_SELECTOR, AUTHOR_SELECTOR, INDEX_ENTRY_SELECTOR,
};

/// One paper discovered on a year's index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub year: u16,
    pub title: String,
    pub detail_url: Url,
}

/// What gets pulled out of a paper's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaperMeta {
    /// Authors joined with `"; "`, empty when the page lists none.
    pub authors: String,
    pub pdf_url: Option<Url>,
}

/// Parses an index page off the async runtime. `Html` isn't `Send`, so it never leaves the
/// blocking closure.
pub(crate) async fn parse_index(html: String, year: u16, base_url: Url) -> Result<Vec<Item>> {
    spawn_blocking(move || index_items(&html, year, &base_url)).await?
}

pub(crate) async fn parse_paper(html: String, page_url: Url) -> Result<PaperMeta> {
    spawn_blocking(move || paper_meta(&html, &page_url)).await?
}

/// Collects every paper link on an index page. Links without a usable `href` are skipped.
pub fn index_items(html: &str, year: u16, base_url: &Url) -> Result<Vec<Item>> {
    let doc = Html::parse_document(html);
    let entry_selector = create_selector(INDEX_ENTRY_SELECTOR)?;

    let mut items = Vec::new();
    for link in doc.select(&entry_selector) {
        let title = element_text(link);
        let Some(href) = link.value().attr("href") else {
            debug!(year, %title, "index entry without href");
            continue;
        };
        match base_url.join(href) {
            Ok(detail_url) => items.push(Item {
                year,
                title,
                detail_url,
            }),
            Err(e) => warn!(year, %title, href, error = %e, "unresolvable paper link"),
        }
    }
    Ok(items)
}

pub fn paper_meta(html: &str, page_url: &Url) -> Result<PaperMeta> {
    let doc = Html::parse_document(html);
    let author_selector = create_selector(AUTHOR_SELECTOR)?;
    let pdf_selector = create_selector(ARTIFACT_SELECTOR)?;

    let authors = doc
        .select(&author_selector)
        .map(element_text)
        .collect::<Vec<_>>()
        .join("; ")
        .trim()
        .to_string();

    let pdf_url = doc
        .select(&pdf_selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| page_url.join(href).ok());

    Ok(PaperMeta { authors, pdf_url })
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn pdf_file_name(title: &str) -> String {
    format!("{}{ARTIFACT_EXTENSION}", sanitize_title(title))
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Element text with whitespace runs collapsed, so it always fits on one CSV line.
fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
