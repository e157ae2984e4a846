//! Picks the offer post to extract from for one company and period.
//!
//! Index posts are matched on company keywords (word boundaries, so "MG" never
//! matches "image"), the most recent by parsed title period wins, and a
//! per-company URL template takes over when the index is stale or has no match.

use crate::config::CompanyConfig;
use crate::models::{CandidatePost, Period, Resolution};
use crate::utils::{mentions_period, month_name};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Compiled whole-word, case-insensitive keyword patterns. Blank keywords
/// never match.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    patterns: Vec<Regex>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let patterns = keywords
            .iter()
            .map(|kw| kw.as_ref().trim())
            .filter(|kw| !kw.is_empty())
            .filter_map(|kw| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok())
            .collect();
        Self { patterns }
    }

    pub fn is_match(&self, title: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(title))
    }
}

/// Most recent post by inferred period. Undated posts rank below any dated
/// one; among equal periods the earliest in index order wins.
pub fn freshest<'a, I>(posts: I) -> Option<&'a CandidatePost>
where
    I: IntoIterator<Item = &'a CandidatePost>,
{
    posts.into_iter().fold(None, |best: Option<&CandidatePost>, post| match best {
        Some(b) if post.inferred <= b.inferred => Some(b),
        _ => Some(post),
    })
}

/// `{month}` → lowercase month name, `{year}` → 4-digit year.
pub fn render_template(template: &str, period: Period) -> Option<String> {
    let month = month_name(period.month)?.to_lowercase();
    Some(
        template
            .replace("{month}", &month)
            .replace("{year}", &period.year.to_string()),
    )
}

/// Company → fallback URL template registry.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    templates: HashMap<String, String>,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(companies: &[CompanyConfig]) -> Self {
        companies
            .iter()
            .filter_map(|c| Some((&c.name, c.fallback_url_template.as_ref()?)))
            .fold(Self::new(), |r, (name, template)| r.with_template(name, template))
    }

    pub fn with_template(mut self, company: &str, template: &str) -> Self {
        self.register(company, template);
        self
    }

    pub fn register(&mut self, company: &str, template: &str) {
        self.templates.insert(company.trim().to_lowercase(), template.to_string());
    }

    pub fn template_for(&self, company: &str) -> Option<&str> {
        self.templates.get(&company.trim().to_lowercase()).map(String::as_str)
    }

    fn fallback(&self, company: &str, target: Period) -> Option<Resolution> {
        let Some(template) = self.template_for(company) else {
            warn!("{}: no fallback URL template registered, skipping", company);
            return None;
        };
        let url = render_template(template, target)?;
        Some(Resolution {
            url,
            month: month_name(target.month)?.to_string(),
            from_index: false,
        })
    }

    /// Source document for `company` in `target`, or `None` when nothing can
    /// be resolved (the caller skips the company).
    pub fn resolve<S: AsRef<str>>(
        &self,
        company: &str,
        keywords: &[S],
        posts: &[CandidatePost],
        target: Period,
    ) -> Option<Resolution> {
        let matcher = KeywordMatcher::new(keywords);
        let matches = posts.iter().filter(|p| matcher.is_match(&p.title));

        let Some(post) = freshest(matches) else {
            debug!("{}: no index match, using fallback URL", company);
            return self.fallback(company, target);
        };

        if !mentions_period(&post.title, target) {
            info!("{}: newest index post {:?} is stale, using fallback URL", company, post.title);
            return self.fallback(company, target);
        }

        debug!("{}: resolved from index → {}", company, post.url);
        Some(Resolution {
            url: post.url.clone(),
            month: month_name(target.month)?.to_string(),
            from_index: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYUNDAI_TEMPLATE: &str = "https://www.autopunditz.com/post/hyundai-car-offers-{month}-{year}";

    fn nov_2025() -> Period {
        Period { year: 2025, month: 11 }
    }

    fn resolver() -> SourceResolver {
        SourceResolver::new().with_template("Hyundai", HYUNDAI_TEMPLATE)
    }

    #[test]
    fn test_keyword_matching_uses_word_boundaries() {
        assert!(KeywordMatcher::new(&["mg"]).is_match("MG Hector offers"));
        assert!(!KeywordMatcher::new(&["mg"]).is_match("Best image gallery"));
        assert!(KeywordMatcher::new(&["Tata"]).is_match("Tata Motors: Nexon deals"));
        assert!(!KeywordMatcher::new(&[""]).is_match("anything"));
    }

    #[test]
    fn test_keyword_matcher_compiles_once_for_many_titles() {
        let matcher = KeywordMatcher::new(&["Maruti", " Suzuki ", "", "Nexa"]);

        let titles = [
            "Maruti Arena offers November 2025",
            "NEXA deals this month",
            "Suzuki-branded bikes",
            "Marutiverse promo",
            "Kia offers",
        ];
        let hits: Vec<bool> = titles.iter().map(|t| matcher.is_match(t)).collect();
        assert_eq!(hits, vec![true, true, true, false, false]);
        assert!(!KeywordMatcher::new::<&str>(&[]).is_match("Maruti"));
    }

    #[test]
    fn test_picks_newest_period_not_first_listed() {
        let posts = vec![
            CandidatePost::new("Offers for Hyundai cars September 2025", "https://a.test/sep"),
            CandidatePost::new("Offers for Hyundai cars November 2025", "https://a.test/nov"),
        ];
        let res = resolver().resolve("Hyundai", &["Hyundai"], &posts, nov_2025()).unwrap();
        assert_eq!(res.url, "https://a.test/nov");
        assert_eq!(res.month, "November");
        assert!(res.from_index);
    }

    #[test]
    fn test_stale_match_falls_back_to_template() {
        let posts = vec![CandidatePost::new("Offers for Hyundai cars September 2025", "https://a.test/sep")];
        let res = resolver().resolve("Hyundai", &["Hyundai"], &posts, nov_2025()).unwrap();
        assert_eq!(res.url, "https://www.autopunditz.com/post/hyundai-car-offers-november-2025");
        assert!(!res.from_index);
    }

    #[test]
    fn test_no_match_uses_template() {
        let posts = vec![CandidatePost::new("Kia offers November 2025", "https://a.test/kia")];
        let res = resolver().resolve("Hyundai", &["Hyundai"], &posts, nov_2025()).unwrap();
        assert_eq!(res.url, "https://www.autopunditz.com/post/hyundai-car-offers-november-2025");
        assert_eq!(res.month, "November");
    }

    #[test]
    fn test_no_match_and_no_template_is_sentinel() {
        let res = resolver().resolve("BYD", &["BYD"], &[], nov_2025());
        assert!(res.is_none());
    }

    #[test]
    fn test_stale_match_without_template_is_sentinel() {
        let posts = vec![CandidatePost::new("BYD offers June 2025", "https://a.test/byd")];
        assert!(resolver().resolve("BYD", &["BYD"], &posts, nov_2025()).is_none());
    }

    #[test]
    fn test_equal_periods_keep_index_order() {
        let posts = vec![
            CandidatePost::new("Hyundai offers November 2025", "https://a.test/first"),
            CandidatePost::new("Hyundai Creta offers November 2025", "https://a.test/second"),
            CandidatePost::new("Hyundai offers", "https://a.test/undated"),
        ];
        assert_eq!(freshest(&posts).unwrap().url, "https://a.test/first");
    }

    #[test]
    fn test_template_lookup_is_case_insensitive() {
        assert_eq!(resolver().template_for("  hyundai "), Some(HYUNDAI_TEMPLATE));
        assert_eq!(
            render_template("x/{month}-{year}", Period { year: 2026, month: 1 }).as_deref(),
            Some("x/january-2026")
        );
    }
}
