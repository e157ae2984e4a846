use crate::config::{CompanyConfig, RankingConfig};
use crate::models::{CompanySignal, PricingRow};
use crate::scraper::PageSession;
use crate::scraper::cleaner::{
    parse_pricing_text, parse_rating, parse_service_centers, price_range, rating_score, service_score,
};
use tracing::{debug, warn};

/// What a company's pricing page yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedSignal {
    pub signal: CompanySignal,
    pub pricing_text: String,
    pub pricing_rows: Vec<PricingRow>,
}

pub struct SignalCollector<'a> {
    config: &'a RankingConfig,
    timeout_ms: u64,
}

/// Raw page text pieces used to build a signal.
#[derive(Debug, Default)]
struct PageFacts {
    price_texts: Vec<String>,
    body: String,
}

impl<'a> SignalCollector<'a> {
    pub fn new(config: &'a RankingConfig, timeout_ms: u64) -> Self {
        Self { config, timeout_ms }
    }

    pub fn pricing_url(&self, company: &CompanyConfig) -> String {
        self.config.pricing_url_template.replace("{slug}", &company.slug())
    }

    async fn read_page(&self, session: &mut dyn PageSession, url: &str) -> anyhow::Result<PageFacts> {
        session.navigate(url, self.timeout_ms).await?;
        session.wait_ms(self.config.pricing_wait_ms).await;

        let body = session
            .query_all("body")
            .await?
            .into_iter()
            .map(|el| el.text)
            .collect::<Vec<_>>()
            .join(" ");

        let mut price_texts: Vec<String> = Vec::new();
        for el in session.query_all("p, li, span, td").await? {
            if el.text.contains('₹') && !price_texts.contains(&el.text) {
                price_texts.push(el.text);
            }
        }

        Ok(PageFacts { price_texts, body })
    }

    /// One signal per company. Each field degrades on its own: a failed page
    /// leaves prices unknown and scores at their config value or neutral.
    pub async fn collect(&self, session: &mut dyn PageSession, company: &CompanyConfig) -> CollectedSignal {
        let url = self.pricing_url(company);
        let (facts, pricing_text) = match self.read_page(session, &url).await {
            Ok(facts) if facts.price_texts.is_empty() => (facts, "Not Available".to_string()),
            Ok(facts) => {
                let text = facts.price_texts.iter().take(3).cloned().collect::<Vec<_>>().join(" | ");
                (facts, text)
            }
            Err(e) => {
                warn!("{}: pricing page unavailable: {:#}", company.name, e);
                (PageFacts::default(), "Fetch Failed".to_string())
            }
        };

        let range = price_range(facts.price_texts.as_slice());
        let rating = company.reliability_rating.or_else(|| parse_rating(&facts.body));
        let centers = company.service_centers.or_else(|| parse_service_centers(&facts.body));

        let signal = CompanySignal {
            company: company.name.clone(),
            min_price: range.map(|r| r.min),
            max_price: range.map(|r| r.max),
            reliability_score: rating_score(rating),
            service_center_count: centers,
            service_score: service_score(centers),
        };
        debug!("{}: {:?}", company.name, signal);

        CollectedSignal {
            pricing_rows: parse_pricing_text(&pricing_text),
            pricing_text,
            signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::StaticPageSession;
    use crate::scraper::testing::FakeFetcher;
    use std::sync::Arc;

    fn company(name: &str) -> CompanyConfig {
        CompanyConfig {
            name: name.to_string(),
            keywords: vec![],
            fallback_url_template: None,
            pricing_slug: None,
            reliability_rating: None,
            service_centers: None,
        }
    }

    fn ranking_config() -> RankingConfig {
        RankingConfig {
            pricing_url_template: "https://cars.test/{slug}".to_string(),
            pricing_wait_ms: 0,
            ..RankingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_collects_prices_rating_and_service() {
        let page = r#"<html><body>
            <p>Hyundai offers a total of 13 car models including 8 SUVs.</p>
            <ul><li>Creta (₹11 - 20.30 Lakh)</li><li>Exter (₹6 - 10.51 Lakh)</li></ul>
            <p>Owners rate Hyundai 4.6/5. Over 1,400 service centres across India.</p>
        </body></html>"#;
        let fetcher = FakeFetcher::default().page("https://cars.test/hyundai", page);
        let mut session = StaticPageSession::new(Arc::new(fetcher));
        let cfg = ranking_config();

        let got = SignalCollector::new(&cfg, 1_000).collect(&mut session, &company("Hyundai")).await;
        assert_eq!(got.signal.min_price, Some(6.0));
        assert_eq!(got.signal.max_price, Some(20.30));
        assert_eq!(got.signal.reliability_score, 5);
        assert_eq!(got.signal.service_center_count, Some(1400));
        assert_eq!(got.signal.service_score, 5);
        assert_eq!(got.pricing_rows.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_degrades_to_defaults() {
        let mut session = StaticPageSession::new(Arc::new(FakeFetcher::default()));
        let cfg = ranking_config();
        let mut volvo = company("Volvo");
        volvo.service_centers = Some(30);

        let got = SignalCollector::new(&cfg, 1_000).collect(&mut session, &volvo).await;
        assert_eq!(got.signal.min_price, None);
        assert_eq!(got.signal.reliability_score, 3);
        assert_eq!(got.signal.service_score, 1);
        assert_eq!(got.pricing_text, "Fetch Failed");
        assert_eq!(got.pricing_rows[0].model, "All models");
    }
}
