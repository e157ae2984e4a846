use crate::config::{AppConfig, CompanyConfig};
use crate::models::{CompanySignal, MarketShare, RankedPosition};
use crate::ranking::market_share::market_share;
use crate::ranking::rank;
use crate::ranking::signals::{CollectedSignal, SignalCollector};
use crate::scraper::parsers::{SalesTable, parse_sales_report};
use crate::scraper::{Fetcher, PageSession};
use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MarketReport {
    pub positions: Vec<RankedPosition>,
    pub signals: Vec<CollectedSignal>,
    pub shares: Vec<MarketShare>,
}

impl MarketReport {
    pub fn signal_for(&self, company: &str) -> Option<&CompanySignal> {
        self.signals.iter().map(|c| &c.signal).find(|s| s.company == company)
    }
}

pub struct MarketPipeline<'a> {
    config: &'a AppConfig,
    fetcher: &'a dyn Fetcher,
}

impl<'a> MarketPipeline<'a> {
    pub fn new(config: &'a AppConfig, fetcher: &'a dyn Fetcher) -> Self {
        Self { config, fetcher }
    }

    async fn sales_table(&self) -> SalesTable {
        let url = &self.config.ranking.sales_report_url;
        match self.fetcher.get_text(url).await {
            Ok(html) => parse_sales_report(&html),
            Err(e) => {
                warn!("Sales report {} unavailable: {:#}", url, e);
                SalesTable {
                    period: "Unknown Period".to_string(),
                    rows: vec![],
                }
            }
        }
    }

    pub async fn run(&self, mut session: Box<dyn PageSession>, companies: &[CompanyConfig]) -> Result<MarketReport> {
        let collector = SignalCollector::new(&self.config.ranking, self.config.sources.render_timeout_ms);

        info!("=== Step 1: Collecting signals ({} companies) ===", companies.len());
        let mut signals = Vec::with_capacity(companies.len());
        for company in companies {
            signals.push(collector.collect(session.as_mut(), company).await);
        }
        if let Err(e) = session.close().await {
            warn!("Page session did not close cleanly: {}", e);
        }

        let just_signals: Vec<CompanySignal> = signals.iter().map(|c| c.signal.clone()).collect();
        let positions = rank(&just_signals);

        info!("=== Step 2: Market share ===");
        let table = self.sales_table().await;
        let names: Vec<&str> = companies.iter().map(|c| c.name.as_str()).collect();
        let shares = market_share(&table, &names, &self.config.ranking.sales_report_url);

        ensure_ranked_once(companies, &positions)?;
        Ok(MarketReport { positions, signals, shares })
    }
}

/// Every requested company holds exactly one ranked position.
pub fn ensure_ranked_once(companies: &[CompanyConfig], positions: &[RankedPosition]) -> Result<()> {
    for company in companies {
        let n = positions.iter().filter(|p| p.company == company.name).count();
        if n != 1 {
            anyhow::bail!("{} holds {} ranked positions (expected exactly one)", company.name, n);
        }
    }
    Ok(())
}
