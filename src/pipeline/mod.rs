//! Pipeline orchestrators.
//!
//! ## Run modes
//!
//! `OfferPipeline::run()`: monthly scheme extraction:
//!   1. Fetch the offers index once and turn its links into candidate posts
//!   2. Per company: resolve the post → render it → keep table-looking images →
//!      recognize tables → normalize into scheme records
//!   A company that fails anywhere gets one placeholder record; the run goes on.
//!
//! `MarketPipeline::run()`: market position:
//!   1. Per company: pricing page → `CompanySignal` → composite rank
//!   2. Sales flash report → units sold and market share
//!
//! Both take ownership of the page session and close it exactly once, after
//! the last company, whatever happened in between.

pub mod market;

use crate::config::{AppConfig, CompanyConfig};
use crate::models::{CandidatePost, CompanyOffers, Period, RawAssetRef};
use crate::offers::{AssetFilter, Provenance, SourceResolver, TableExtractor, TableRecognizer};
use crate::offers::{normalize, placeholder};
use crate::scraper::parsers::parse_index_page;
use crate::scraper::{Fetcher, PageError, PageSession};
use crate::utils::month_name;
use anyhow::{Result, bail};
use tracing::{debug, info, warn};

pub use market::MarketPipeline;

pub struct OfferPipeline<'a> {
    config: &'a AppConfig,
    fetcher: &'a dyn Fetcher,
    recognizer: &'a dyn TableRecognizer,
}

impl<'a> OfferPipeline<'a> {
    pub fn new(config: &'a AppConfig, fetcher: &'a dyn Fetcher, recognizer: &'a dyn TableRecognizer) -> Self {
        Self { config, fetcher, recognizer }
    }

    /// Candidate posts from the offers index. Any failure → empty list, which
    /// sends every company down the fallback-URL path.
    pub async fn load_index(&self) -> Vec<CandidatePost> {
        let url = &self.config.sources.index_url;
        match self.fetcher.get_text(url).await {
            Ok(html) => parse_index_page(&html, url),
            Err(e) => {
                warn!("Index {} unavailable: {:#}", url, e);
                vec![]
            }
        }
    }

    pub async fn run(
        &self,
        mut session: Box<dyn PageSession>,
        companies: &[CompanyConfig],
        target: Period,
    ) -> Result<Vec<CompanyOffers>> {
        let outcome = self.run_companies(session.as_mut(), companies, target).await;
        if let Err(e) = session.close().await {
            warn!("Page session did not close cleanly: {}", e);
        }
        outcome
    }

    async fn run_companies(
        &self,
        session: &mut dyn PageSession,
        companies: &[CompanyConfig],
        target: Period,
    ) -> Result<Vec<CompanyOffers>> {
        info!("=== Step 1: Reading offers index ===");
        let posts = self.load_index().await;
        info!("{} candidate posts", posts.len());

        let resolver = SourceResolver::from_config(companies);
        let filter = AssetFilter::new(&self.config.assets);
        let extractor = TableExtractor::new(self.recognizer);

        info!("=== Step 2: Extracting schemes ({} companies) ===", companies.len());
        let mut out = Vec::with_capacity(companies.len());
        for company in companies {
            let offers = self
                .process_company(session, company, &posts, &resolver, &filter, &extractor, target)
                .await;
            info!(
                "{}: {} records{}",
                company.name,
                offers.records.len(),
                if offers.placeholder { " (placeholder)" } else { "" }
            );
            out.push(offers);
        }

        ensure_every_company_once(companies, &out)?;
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_company(
        &self,
        session: &mut dyn PageSession,
        company: &CompanyConfig,
        posts: &[CandidatePost],
        resolver: &SourceResolver,
        filter: &AssetFilter,
        extractor: &TableExtractor<'_>,
        target: Period,
    ) -> CompanyOffers {
        let source = self.config.sources.source_name.as_str();
        let target_month = month_name(target.month).unwrap_or_default();

        let Some(resolution) = resolver.resolve(&company.name, &company.match_keywords(), posts, target) else {
            return self.placeholder_for(company, target_month, &self.config.sources.index_url);
        };
        let month = if resolution.month.is_empty() { target_month } else { resolution.month.as_str() };

        let refs = match self.render_asset_refs(session, &resolution.url).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!("{}: {}", company.name, e);
                return self.placeholder_for(company, month, &resolution.url);
            }
        };

        let assets = filter.filter(&refs);
        debug!("{}: {} of {} image refs look like tables", company.name, assets.len(), refs.len());

        let limit = self.config.pipeline.max_assets_per_company;
        if assets.len() > limit {
            warn!("{}: {} candidate images, only the first {} are read", company.name, assets.len(), limit);
        }
        let tables = extractor.extract_all(self.fetcher, assets.iter().take(limit)).await;

        if tables.is_empty() {
            return self.placeholder_for(company, month, &resolution.url);
        }

        let prov = Provenance {
            company: &company.name,
            source,
            month,
            link: &resolution.url,
        };
        let records = normalize(prov, &tables);
        if records.is_empty() {
            return self.placeholder_for(company, month, &resolution.url);
        }

        CompanyOffers {
            company: company.name.clone(),
            records,
            placeholder: false,
        }
    }

    /// Navigate and collect `img` sources plus every inline style. Navigation
    /// failures propagate; a failing query only loses its own references.
    async fn render_asset_refs(&self, session: &mut dyn PageSession, url: &str) -> Result<Vec<RawAssetRef>, PageError> {
        session.navigate(url, self.config.sources.render_timeout_ms).await?;
        session.wait_ms(self.config.sources.render_wait_ms).await;

        let mut refs = Vec::new();
        match session.query_all("img").await {
            Ok(imgs) => refs.extend(imgs.iter().map(|el| RawAssetRef {
                src: session
                    .get_attribute(el, "src")
                    .or_else(|| session.get_attribute(el, "data-src")),
                style: session.get_attribute(el, "style"),
            })),
            Err(e) => warn!("img query failed on {}: {}", url, e),
        }
        match session.query_all("[style]").await {
            Ok(styled) => refs.extend(styled.iter().map(|el| RawAssetRef {
                src: None,
                style: session.get_attribute(el, "style"),
            })),
            Err(e) => warn!("style query failed on {}: {}", url, e),
        }
        Ok(refs)
    }

    fn placeholder_for(&self, company: &CompanyConfig, month: &str, link: &str) -> CompanyOffers {
        let prov = Provenance {
            company: &company.name,
            source: &self.config.sources.source_name,
            month,
            link,
        };
        CompanyOffers {
            company: company.name.clone(),
            records: vec![placeholder(prov, &self.config.pipeline.placeholder_text)],
            placeholder: true,
        }
    }
}

/// The one hard failure: every requested company must be in the output
/// exactly once.
pub fn ensure_every_company_once(companies: &[CompanyConfig], out: &[CompanyOffers]) -> Result<()> {
    for company in companies {
        let n = out.iter().filter(|o| o.company == company.name).count();
        if n != 1 {
            bail!("{} appears {} times in the output (expected exactly once)", company.name, n);
        }
        if out.iter().any(|o| o.company == company.name && o.records.is_empty()) {
            bail!("{} has no records, not even a placeholder", company.name);
        }
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub companies_processed: usize,
    pub records: usize,
    pub placeholders: usize,
}

impl PipelineStats {
    pub fn from_offers(offers: &[CompanyOffers]) -> Self {
        Self {
            companies_processed: offers.len(),
            records: offers.iter().map(|o| o.records.len()).sum(),
            placeholders: offers.iter().filter(|o| o.placeholder).count(),
        }
    }
}
