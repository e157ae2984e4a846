use crate::models::{NEUTRAL_SCORE, PriceRange, PricingRow};
use regex::Regex;
use std::sync::LazyLock;

// ── Prices ────────────────────────────────────────────────────────────────────

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)₹\s*([\d]+(?:\.\d+)?)\s*(?:-\s*([\d]+(?:\.\d+)?)\s*)?(lakh|lac|crore|cr)\b")
        .expect("price regex")
});

/// Every price mentioned in `text`, in lakh. Ranges contribute both ends.
/// "₹6.49 - 9.64 Lakh" → [6.49, 9.64] | "₹2 Crore" → [200.0]
pub fn parse_prices_lakh(text: &str) -> Vec<f64> {
    let mut prices = Vec::new();
    for caps in PRICE_RE.captures_iter(text) {
        let unit = caps.get(3).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let scale = if unit.starts_with("cr") { 100.0 } else { 1.0 };
        for idx in [1, 2] {
            if let Some(v) = caps.get(idx).and_then(|m| m.as_str().parse::<f64>().ok()) {
                prices.push(v * scale);
            }
        }
    }
    prices
}

/// Cheapest and dearest price over all texts. `None` when nothing parses.
pub fn price_range<S: AsRef<str>>(texts: &[S]) -> Option<PriceRange> {
    let prices: Vec<f64> = texts.iter().flat_map(|t| parse_prices_lakh(t.as_ref())).collect();
    let min = prices.iter().copied().reduce(f64::min)?;
    let max = prices.iter().copied().reduce(f64::max)?;
    Some(PriceRange { min, max })
}

// ── Pricing summary text ──────────────────────────────────────────────────────

static MODEL_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z0-9 ]*?)\s*\(₹\s*([0-9.\- ]+(?:Lakh|Crore))\)").expect("model price regex")
});

/// Text between `start` and `end` markers, trimmed.
fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let (_, rest) = text.split_once(start)?;
    let (inner, _) = rest.split_once(end)?;
    Some(inner.trim())
}

/// Break a brand pricing blurb into rows:
/// "... a total of 17 car models including 9 SUVs, 4 Hatchbacks. ...
///  Creta (₹11 - 20.30 Lakh) ..."
/// Without any model/price pair, one "All models" row carries the raw text.
pub fn parse_pricing_text(text: &str) -> Vec<PricingRow> {
    let total_models = between(text, "total of", "car models").unwrap_or("Not found").to_string();
    let car_types = between(text, "including", ".").unwrap_or("Not found").to_string();

    let rows: Vec<PricingRow> = MODEL_PRICE_RE
        .captures_iter(text)
        .map(|caps| PricingRow {
            total_models: total_models.clone(),
            car_types: car_types.clone(),
            model: caps[1].trim().to_string(),
            price: format!("₹{}", caps[2].trim()),
        })
        .collect();

    if rows.is_empty() {
        vec![PricingRow {
            total_models,
            car_types,
            model: "All models".to_string(),
            price: text.trim().to_string(),
        }]
    } else {
        rows
    }
}

// ── Ratings & service network ─────────────────────────────────────────────────

static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d(?:\.\d+)?)\s*(?:/|out of)\s*5\b").expect("rating regex")
});

static SERVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\s*\+?\s+(?:authori[sz]ed\s+)?(?:service|workshop)\s+(?:centers?|centres?|outlets?|points?)\b")
        .expect("service regex")
});

/// First "x.y/5" or "x.y out of 5" rating.
pub fn parse_rating(text: &str) -> Option<f64> {
    RATING_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|r| (0.0..=5.0).contains(r))
}

pub fn parse_service_centers(text: &str) -> Option<u32> {
    SERVICE_RE
        .captures(text)
        .and_then(|c| c[1].replace(',', "").parse().ok())
}

/// Rating on a 0..5 scale → integer score 1..=5. Unknown → neutral.
pub fn rating_score(rating: Option<f64>) -> u8 {
    match rating {
        Some(r) if r.is_finite() => r.round().clamp(1.0, 5.0) as u8,
        _ => NEUTRAL_SCORE,
    }
}

/// Service network size → score 1..=5. Unknown → neutral.
pub fn service_score(centers: Option<u32>) -> u8 {
    match centers {
        None => NEUTRAL_SCORE,
        Some(n) if n >= 1000 => 5,
        Some(n) if n >= 500 => 4,
        Some(n) if n >= 200 => 3,
        Some(n) if n >= 50 => 2,
        Some(_) => 1,
    }
}

// ── Sales table cells ─────────────────────────────────────────────────────────

/// "1,70,971" → 170971. Anything unparseable counts as zero units.
pub fn parse_units(s: &str) -> u64 {
    s.trim().replace(',', "").parse().unwrap_or(0)
}

static MAKE_ALIASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("maruti", "Maruti Suzuki"),
        ("tata", "Tata Motors"),
        ("hyundai", "Hyundai"),
        ("mahindra", "Mahindra"),
        ("kia", "Kia"),
        ("mg", "MG Motor"),
        ("toyota", "Toyota"),
        ("honda", "Honda"),
        ("renault", "Renault"),
        ("nissan", "Nissan"),
        ("skoda", "Skoda"),
        ("volkswagen", "Volkswagen"),
        ("byd", "BYD"),
        ("volvo", "Volvo"),
    ]
    .into_iter()
    .filter_map(|(alias, name)| Regex::new(&format!(r"(?i)\b{}\b", alias)).ok().map(|re| (re, name)))
    .collect()
});

/// Canonical company name for a sales-table make cell, or `None` for makes
/// that are not tracked. "JSW MG Motor India" → "MG Motor"
pub fn normalize_make(raw: &str) -> Option<&'static str> {
    MAKE_ALIASES
        .iter()
        .find(|(re, _)| re.is_match(raw))
        .map(|(_, name)| *name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prices_lakh() {
        assert_eq!(parse_prices_lakh("₹6.49 - 9.64 Lakh*"), vec![6.49, 9.64]);
        assert_eq!(parse_prices_lakh("₹ 2 Crore"), vec![200.0]);
        assert_eq!(parse_prices_lakh("Price on request"), Vec::<f64>::new());
    }

    #[test]
    fn test_price_range() {
        let texts = ["₹11 - 20.30 Lakh", "₹5.99 Lakh", "call dealer"];
        assert_eq!(price_range(&texts), Some(PriceRange { min: 5.99, max: 20.30 }));
        assert_eq!(price_range(&["n/a"]), None);
    }

    #[test]
    fn test_parse_pricing_text() {
        let text = "Hyundai offers a total of 13 car models including 8 SUVs, 3 Sedans. \
                    Popular ones are Creta (₹11 - 20.30 Lakh) and Venue (₹7.94 - 13.62 Lakh).";
        let rows = parse_pricing_text(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_models, "13");
        assert_eq!(rows[0].car_types, "8 SUVs, 3 Sedans");
        assert!(rows[0].model.ends_with("Creta"));
        assert_eq!(rows[0].price, "₹11 - 20.30 Lakh");
        assert_eq!(rows[1].price, "₹7.94 - 13.62 Lakh");
    }

    #[test]
    fn test_parse_pricing_text_without_pairs() {
        let rows = parse_pricing_text("Fetch Failed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model, "All models");
        assert_eq!(rows[0].total_models, "Not found");
        assert_eq!(rows[0].price, "Fetch Failed");
    }

    #[test]
    fn test_ratings_and_service() {
        assert_eq!(parse_rating("Rated 4.4/5 by 2k owners"), Some(4.4));
        assert_eq!(parse_rating("4 out of 5 stars"), Some(4.0));
        assert_eq!(parse_rating("no rating"), None);
        assert_eq!(parse_service_centers("over 1,450+ authorised service centres"), Some(1450));
        assert_eq!(parse_service_centers("120 service points nationwide"), Some(120));
        assert_eq!(rating_score(Some(4.4)), 4);
        assert_eq!(rating_score(Some(0.2)), 1);
        assert_eq!(rating_score(None), 3);
        assert_eq!(service_score(Some(1450)), 5);
        assert_eq!(service_score(Some(120)), 2);
        assert_eq!(service_score(Some(10)), 1);
        assert_eq!(service_score(None), 3);
    }

    #[test]
    fn test_normalize_make() {
        assert_eq!(normalize_make("Maruti Suzuki India"), Some("Maruti Suzuki"));
        assert_eq!(normalize_make("JSW MG Motor India"), Some("MG Motor"));
        assert_eq!(normalize_make("Imaginary Motors"), None);
        assert_eq!(normalize_make("Others"), None);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1,70,971"), 170_971);
        assert_eq!(parse_units("n/a"), 0);
    }
}
