// ABOUTME: Scrapes a PhysioNet listing page's HTML anchors for downloadable .csv.gz files
// ABOUTME: Mirrors the original's _scrape_urls_from_html_page (BeautifulSoup -> scraper crate)
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use url::Url;

use crate::errors::{M3Error, M3Result};

/// One discovered downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute URL to download.
    pub url: String,
    /// File name portion of the URL, used to derive the table name.
    pub file_name: String,
}

/// Fetch `listing_url` and extract every anchor pointing at a `.csv.gz`
/// file, skipping parent-directory links and query/fragment-only anchors
/// the way the original's scraper did.
///
/// # Errors
///
/// Returns `M3Error::DataIo` if the page can't be fetched or parsed.
pub async fn discover_files(listing_url: &str) -> M3Result<Vec<DiscoveredFile>> {
    let html = reqwest::get(listing_url)
        .await
        .map_err(|e| M3Error::DataIo(format!("failed to fetch listing page {listing_url}: {e}")))?
        .text()
        .await
        .map_err(|e| M3Error::DataIo(format!("failed to read listing page {listing_url}: {e}")))?;

    extract_csv_gz_links(&html, listing_url)
}

/// Pure parsing step, split out from the network fetch so it can be unit
/// tested against fixed HTML.
///
/// # Errors
///
/// Returns `M3Error::DataIo` if `base_url` doesn't parse.
pub fn extract_csv_gz_links(html: &str, base_url: &str) -> M3Result<Vec<DiscoveredFile>> {
    let base = Url::parse(base_url)
        .map_err(|e| M3Error::DataIo(format!("invalid listing page URL {base_url}: {e}")))?;

    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("a")
        .map_err(|_| M3Error::DataIo("invalid internal anchor selector".to_owned()))?;

    let mut discovered = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.starts_with("..") || href.starts_with('?') || href.starts_with('#') || href == "/" {
            continue;
        }
        if !href.ends_with(".csv.gz") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let file_name = resolved
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or(href)
            .to_owned();
        discovered.push(DiscoveredFile {
            url: resolved.to_string(),
            file_name,
        });
    }
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <html><body>
        <a href="../">Parent Directory</a>
        <a href="?C=N;O=D">Name</a>
        <a href="admissions.csv.gz">admissions.csv.gz</a>
        <a href="patients.csv.gz">patients.csv.gz</a>
        <a href="index.html">index.html</a>
        </body></html>
    "#;

    #[test]
    fn extracts_only_csv_gz_anchors() {
        let files = extract_csv_gz_links(SAMPLE_HTML, "https://physionet.org/files/mimic-iv-demo/2.2/hosp/").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["admissions.csv.gz", "patients.csv.gz"]);
    }

    #[test]
    fn resolves_relative_urls_against_base() {
        let files = extract_csv_gz_links(SAMPLE_HTML, "https://physionet.org/files/mimic-iv-demo/2.2/hosp/").unwrap();
        assert_eq!(
            files[0].url,
            "https://physionet.org/files/mimic-iv-demo/2.2/hosp/admissions.csv.gz"
        );
    }

    #[test]
    fn skips_parent_directory_and_query_links() {
        let files = extract_csv_gz_links(SAMPLE_HTML, "https://physionet.org/files/mimic-iv-demo/2.2/hosp/").unwrap();
        assert!(!files.iter().any(|f| f.file_name.contains("..")));
    }
}
