//! Image → table extraction on top of a table-recognition backend.
//!
//! Every failure for one image (download, recognition, malformed fragment)
//! is logged and turned into "no tables for this image".

use crate::config::RecognitionConfig;
use crate::models::{ExtractedTable, ImageAsset, TableFragment};
use crate::scraper::Fetcher;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("image download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("table recognition failed: {0}")]
    Recognition(String),
    #[error("malformed table fragment: {0}")]
    Malformed(String),
}

/// Detects tables in a raster image. Implementations may return an empty list.
#[async_trait]
pub trait TableRecognizer: Send + Sync {
    async fn recognize_tables(&self, image: &[u8]) -> Result<Vec<TableFragment>, ExtractError>;
}

// ── HTTP backend ──────────────────────────────────────────────────────────────

/// Client for a table-OCR service: the image is POSTed as the request body and
/// the answer is a JSON array of `{"headers": [...], "rows": [[...]]}`.
pub struct HttpTableRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTableRecognizer {
    pub fn new(config: &RecognitionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build recognition client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl TableRecognizer for HttpTableRecognizer {
    async fn recognize_tables(&self, image: &[u8]) -> Result<Vec<TableFragment>, ExtractError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| ExtractError::Recognition(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractError::Recognition(format!("HTTP {}", status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ExtractError::Recognition(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ExtractError::Malformed(e.to_string()))
    }
}

// ── Fragment cleanup ──────────────────────────────────────────────────────────

/// Headers a recognizer invents for columns it could not name:
/// blank, "Unnamed: 3", "Column2", "7".
pub fn is_placeholder_header(header: &str) -> bool {
    let h = header.trim().to_lowercase();
    h.is_empty()
        || h.starts_with("unnamed")
        || h.strip_prefix("column").is_some_and(|n| n.trim().chars().all(|c| c.is_ascii_digit()))
        || h.chars().all(|c| c.is_ascii_digit())
}

/// "Offer", "Offer" → "Offer", "Offer.1". A suffix never reuses a name
/// already present in the input, so "Offer", "Offer", "Offer.1" becomes
/// "Offer", "Offer.2", "Offer.1".
fn dedupe_headers(headers: &[String]) -> Vec<String> {
    let original: HashSet<&str> = headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !is_placeholder_header(h))
        .collect();
    let mut used: HashSet<String> = HashSet::new();

    headers
        .iter()
        .map(|h| {
            let h = h.trim();
            if is_placeholder_header(h) {
                return h.to_string();
            }
            if used.insert(h.to_string()) {
                return h.to_string();
            }
            let mut n = 1;
            loop {
                let candidate = format!("{}.{}", h, n);
                if !original.contains(candidate.as_str()) && used.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Pads ragged rows, drops placeholder columns and rows with no content.
/// A fragment without a single header is malformed.
pub fn clean_fragment(fragment: TableFragment) -> Result<ExtractedTable, ExtractError> {
    if fragment.headers.is_empty() {
        return Err(ExtractError::Malformed("fragment has no headers".to_string()));
    }

    let width = fragment
        .rows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(fragment.headers.len());

    let mut headers = fragment.headers;
    headers.resize(width, String::new());
    let headers = dedupe_headers(&headers);

    let keep: Vec<usize> = (0..width).filter(|&i| !is_placeholder_header(&headers[i])).collect();

    let rows = fragment
        .rows
        .into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            keep.iter().map(|&i| row[i].trim().to_string()).collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(ExtractedTable {
        headers: keep.iter().map(|&i| headers[i].clone()).collect(),
        rows,
    })
}

// ── Extractor ─────────────────────────────────────────────────────────────────

pub struct TableExtractor<'a> {
    recognizer: &'a dyn TableRecognizer,
}

impl<'a> TableExtractor<'a> {
    pub fn new(recognizer: &'a dyn TableRecognizer) -> Self {
        Self { recognizer }
    }

    async fn try_extract(&self, image: &[u8]) -> Result<Vec<ExtractedTable>, ExtractError> {
        let fragments = self.recognizer.recognize_tables(image).await?;
        let tables = fragments
            .into_iter()
            .map(clean_fragment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables
            .into_iter()
            .filter(|t| !t.is_empty() && !t.headers.is_empty())
            .collect())
    }

    /// Tables found in one image, in detection order. Never fails.
    pub async fn extract(&self, image: &[u8]) -> Vec<ExtractedTable> {
        match self.try_extract(image).await {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Skipping image: {}", e);
                vec![]
            }
        }
    }

    /// Download `asset` and extract its tables. Never fails.
    pub async fn extract_asset(&self, fetcher: &dyn Fetcher, asset: &ImageAsset) -> Vec<ExtractedTable> {
        let bytes = match fetcher.get_bytes(&asset.url).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Skipping {}: {}", asset.url, ExtractError::Download(e));
                return vec![];
            }
        };
        let tables = self.extract(&bytes).await;
        debug!("{}: {} tables", asset.url, tables.len());
        tables
    }

    /// All tables for a company's assets, concatenated in asset order.
    pub async fn extract_all<'b, I>(&self, fetcher: &dyn Fetcher, assets: I) -> Vec<ExtractedTable>
    where
        I: IntoIterator<Item = &'b ImageAsset>,
    {
        let mut all = Vec::new();
        for asset in assets {
            all.extend(self.extract_asset(fetcher, asset).await);
        }
        all
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeRecognizer, fragment};
    use super::*;
    use crate::scraper::testing::FakeFetcher;

    #[test]
    fn test_placeholder_headers() {
        for h in ["", "  ", "Unnamed: 0", "column3", "7"] {
            assert!(is_placeholder_header(h), "{:?}", h);
        }
        for h in ["Model", "Offer Details", "Columns total"] {
            assert!(!is_placeholder_header(h), "{:?}", h);
        }
    }

    #[test]
    fn test_clean_fragment_drops_noise() {
        let frag = fragment(
            &["Model", "Unnamed: 1", "Offer", "Offer"],
            &[
                &["Creta", "x", "Cash 20,000", "Exchange 10,000"],
                &["", "junk", "", ""],
                &["Venue", "y", "Cash 15,000"],
                &["i20", "", "Cash 5,000", "", "stray"],
            ],
        );
        let table = clean_fragment(frag).unwrap();
        assert_eq!(table.headers, vec!["Model", "Offer", "Offer.1"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Creta", "Cash 20,000", "Exchange 10,000"],
                vec!["Venue", "Cash 15,000", ""],
                vec!["i20", "Cash 5,000", ""],
            ]
        );
    }

    #[test]
    fn test_suffixed_header_does_not_collide_with_existing_one() {
        let frag = fragment(&["Offer", "Offer", "Offer.1"], &[&["a", "b", "c"]]);
        let table = clean_fragment(frag).unwrap();
        assert_eq!(table.headers, vec!["Offer", "Offer.2", "Offer.1"]);
        assert_eq!(table.rows, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_clean_fragment_without_headers_is_malformed() {
        let err = clean_fragment(fragment(&[], &[&["a"]])).unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_extract_concatenates_in_detection_order() {
        let recognizer = FakeRecognizer::default().with(
            b"img",
            vec![
                fragment(&["Model", "Offer"], &[&["Kiger", "25,000"]]),
                fragment(&["Variant"], &[&[""]]),
                fragment(&["Model", "Offer"], &[&["Triber", "40,000"]]),
            ],
        );
        let tables = TableExtractor::new(&recognizer).extract(b"img").await;
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows[0][0], "Kiger");
        assert_eq!(tables[1].rows[0][0], "Triber");
    }

    #[tokio::test]
    async fn test_failures_are_per_image() {
        let recognizer = FakeRecognizer::default()
            .with(b"good", vec![fragment(&["Model"], &[&["Nexon"]])])
            .with(b"bad-fragment", vec![fragment(&[], &[&["x"]])]);
        let fetcher = FakeFetcher::default()
            .blob("https://m.test/1.png", b"good")
            .blob("https://m.test/2.png", b"engine-crash")
            .blob("https://m.test/3.png", b"bad-fragment")
            .blob("https://m.test/5.png", b"good");
        let assets: Vec<ImageAsset> = (1..=5)
            .map(|i| ImageAsset { url: format!("https://m.test/{}.png", i) })
            .collect();

        let tables = TableExtractor::new(&recognizer).extract_all(&fetcher, &assets).await;
        assert_eq!(tables.len(), 2);
    }
}
