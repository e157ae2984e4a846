use crate::models::CandidatePost;
use crate::scraper::{PageElement, PageError};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    collapse_ws(&el.text().collect::<String>())
}

// ── Generic element snapshotting ──────────────────────────────────────────────

pub fn select_elements(html: &str, selector: &str) -> Result<Vec<PageElement>, PageError> {
    let sel = Selector::parse(selector).map_err(|_| PageError::Selector(selector.to_string()))?;
    let doc = Html::parse_document(html);

    Ok(doc
        .select(&sel)
        .map(|el| PageElement {
            tag: el.value().name().to_string(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: element_text(&el),
        })
        .collect())
}

// ── Index page ────────────────────────────────────────────────────────────────

/// Every usable link on a listing page as a candidate post. Relative hrefs are
/// resolved against `base_url`; duplicates keep their first title. Garbage in
/// gives an empty list, never an error.
pub fn parse_index_page(html: &str, base_url: &str) -> Vec<CandidatePost> {
    let doc = Html::parse_document(html);
    let Ok(a_sel) = Selector::parse("a[href]") else {
        return vec![];
    };
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut posts = Vec::new();

    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href").map(str::trim) else { continue };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }

        let url = match &base {
            Some(b) => match b.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
            None => match Url::parse(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
        };

        let mut title = element_text(&a);
        if title.is_empty() {
            title = a
                .value()
                .attr("title")
                .or_else(|| a.value().attr("aria-label"))
                .map(collapse_ws)
                .unwrap_or_default();
        }
        if title.is_empty() {
            continue;
        }

        if seen.insert(url.clone()) {
            posts.push(CandidatePost::new(title, url));
        }
    }

    debug!("Index page: {} candidate posts", posts.len());
    posts
}

// ── Sales flash report ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesTable {
    pub period: String,
    /// (make cell, units cell) in table order.
    pub rows: Vec<(String, String)>,
}

/// Period from the first heading mentioning "flash": "Month YYYY" when one is
/// present, otherwise the heading text. No heading → "Unknown Period".
fn flash_period(doc: &Html) -> String {
    let Ok(h_sel) = Selector::parse("h1, h2, h3") else {
        return "Unknown Period".to_string();
    };
    let Some(text) = doc
        .select(&h_sel)
        .map(|h| element_text(&h))
        .find(|t| t.to_lowercase().contains("flash"))
    else {
        return "Unknown Period".to_string();
    };

    match crate::utils::parse_period(&text).and_then(|p| {
        crate::utils::month_name(p.month).map(|m| format!("{} {}", m, p.year))
    }) {
        Some(period) => period,
        None => text,
    }
}

/// The maker table is the one with the most rows. Header rows (no `td`) and
/// rows with fewer than two cells are skipped.
pub fn parse_sales_report(html: &str) -> SalesTable {
    let doc = Html::parse_document(html);
    let period = flash_period(&doc);

    let (Ok(table_sel), Ok(tr_sel), Ok(td_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return SalesTable { period, rows: vec![] };
    };

    let Some(table) = doc
        .select(&table_sel)
        .max_by_key(|t| t.select(&tr_sel).count())
    else {
        warn!("Sales report has no tables");
        return SalesTable { period, rows: vec![] };
    };

    let rows = table
        .select(&tr_sel)
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&td_sel).map(|td| element_text(&td)).collect();
            if cells.len() < 2 {
                return None;
            }
            Some((cells[0].clone(), cells[1].clone()))
        })
        .collect();

    SalesTable { period, rows }
}
