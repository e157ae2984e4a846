pub mod cleaner;
pub mod http_client;
pub mod parsers;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use self::parsers::select_elements;

// ── Fetch abstraction ─────────────────────────────────────────────────────────

/// Swappable transport: the HTTP client in production, canned bodies in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

// ── Page automation ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("navigation to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("invalid selector {0:?}")]
    Selector(String),
    #[error("no page loaded")]
    NoPage,
}

/// Owned snapshot of one element on a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Browser-like session. One instance is owned by the orchestrator for a whole
/// run and closed once at the end.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), PageError>;
    async fn query_all(&self, selector: &str) -> Result<Vec<PageElement>, PageError>;
    async fn wait_ms(&mut self, ms: u64);
    async fn close(&mut self) -> Result<(), PageError>;

    fn get_attribute(&self, element: &PageElement, name: &str) -> Option<String> {
        element.attr(name).map(str::to_string)
    }
}

// ── Static session ────────────────────────────────────────────────────────────

/// Page session without script execution: navigation is a timed GET, queries
/// run against the fetched markup.
pub struct StaticPageSession {
    fetcher: Arc<dyn Fetcher>,
    current: Option<String>,
}

impl StaticPageSession {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher, current: None }
    }
}

#[async_trait]
impl PageSession for StaticPageSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), PageError> {
        self.current = None;
        let fetch = self.fetcher.get_text(url);
        let html = tokio::time::timeout(Duration::from_millis(timeout_ms), fetch)
            .await
            .map_err(|_| PageError::Timeout { url: url.to_string(), timeout_ms })?
            .map_err(|e| PageError::Navigation { url: url.to_string(), reason: format!("{:#}", e) })?;
        debug!("Loaded {} ({} bytes)", url, html.len());
        self.current = Some(html);
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<PageElement>, PageError> {
        let html = self.current.as_deref().ok_or(PageError::NoPage)?;
        select_elements(html, selector)
    }

    async fn wait_ms(&mut self, ms: u64) {
        // Nothing renders after load without a script engine.
        debug!("wait {} ms skipped (static session)", ms);
    }

    async fn close(&mut self) -> Result<(), PageError> {
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory fakes shared by the async tests.

    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeFetcher {
        pub pages: HashMap<String, String>,
        pub blobs: HashMap<String, Vec<u8>>,
    }

    impl FakeFetcher {
        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn blob(mut self, url: &str, body: &[u8]) -> Self {
            self.blobs.insert(url.to_string(), body.to_vec());
            self
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn get_text(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 404 for {}", url))
        }

        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.blobs
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 404 for {}", url))
        }
    }

    /// Answers every request, but only after `delay`.
    pub struct SlowFetcher {
        pub delay: Duration,
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn get_text(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok("<html><body></body></html>".to_string())
        }

        async fn get_bytes(&self, _url: &str) -> Result<Vec<u8>> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeFetcher, SlowFetcher};
    use super::*;

    #[tokio::test]
    async fn test_static_session_queries_loaded_page() {
        let fetcher = FakeFetcher::default().page(
            "https://a.test/p",
            r#"<html><body><img src="https://x.wixstatic.com/t.png"><div style="color:red">x</div></body></html>"#,
        );
        let mut session = StaticPageSession::new(Arc::new(fetcher));
        session.navigate("https://a.test/p", 1_000).await.unwrap();

        let imgs = session.query_all("img").await.unwrap();
        assert_eq!(imgs.len(), 1);
        assert_eq!(
            session.get_attribute(&imgs[0], "src").as_deref(),
            Some("https://x.wixstatic.com/t.png")
        );
        assert_eq!(session.query_all("[style]").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_static_session_navigation_failure() {
        let mut session = StaticPageSession::new(Arc::new(FakeFetcher::default()));
        let err = session.navigate("https://a.test/missing", 1_000).await.unwrap_err();
        assert!(matches!(err, PageError::Navigation { .. }));
        assert!(matches!(session.query_all("img").await, Err(PageError::NoPage)));
    }

    #[tokio::test]
    async fn test_static_session_times_out_slow_page() {
        let slow = SlowFetcher { delay: Duration::from_millis(500) };
        let mut session = StaticPageSession::new(Arc::new(slow));

        let err = session.navigate("https://a.test/slow", 50).await.unwrap_err();
        match err {
            PageError::Timeout { url, timeout_ms } => {
                assert_eq!(url, "https://a.test/slow");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(matches!(session.query_all("img").await, Err(PageError::NoPage)));
    }
}
