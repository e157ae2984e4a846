use crate::config::AssetConfig;
use crate::models::{ImageAsset, RawAssetRef};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("css url regex")
});

/// URLs referenced by `url(...)` in an inline style.
pub fn style_urls(style: &str) -> Vec<String> {
    CSS_URL_RE
        .captures_iter(style)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// Decides which page images can hold offer tables.
#[derive(Debug, Clone)]
pub struct AssetFilter {
    media_domain: String,
    exclude_markers: Vec<String>,
    low_res_markers: Vec<String>,
}

impl AssetFilter {
    pub fn new(config: &AssetConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|m| m.to_lowercase()).collect::<Vec<_>>();
        Self {
            media_domain: config.media_domain.to_lowercase(),
            exclude_markers: lower(&config.exclude_markers),
            low_res_markers: lower(&config.low_res_markers),
        }
    }

    fn normalize(url: &str) -> String {
        let url = url.trim();
        match url.strip_prefix("//") {
            Some(rest) => format!("https://{}", rest),
            None => url.to_string(),
        }
    }

    /// Hosted on the media domain and free of every noise marker.
    pub fn is_candidate(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        lower.contains(&self.media_domain)
            && !self.exclude_markers.iter().any(|m| lower.contains(m.as_str()))
            && !self.low_res_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Candidate data-table images, deduplicated and sorted by URL.
    pub fn filter(&self, refs: &[RawAssetRef]) -> BTreeSet<ImageAsset> {
        refs.iter()
            .flat_map(|r| {
                let from_style = r.style.as_deref().map(style_urls).unwrap_or_default();
                r.src.iter().cloned().chain(from_style)
            })
            .map(|u| Self::normalize(&u))
            .filter(|u| self.is_candidate(u))
            .map(|url| ImageAsset { url })
            .collect()
    }
}
