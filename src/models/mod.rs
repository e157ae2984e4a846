use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// ── Period ────────────────────────────────────────────────────────────────────

/// A reporting period. Ordering is lexicographic on (year, month), so
/// `Option<Period>` puts undated posts below every dated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32, // 1..=12
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ── Index posts ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    pub title: String,
    pub url: String,
    pub inferred: Option<Period>,
}

impl CandidatePost {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        let inferred = crate::utils::parse_period(&title);
        Self { title, url: url.into(), inferred }
    }
}

/// Output of the source resolver. `None` at the call site is the
/// "no source" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub month: String,
    pub from_index: bool,
}

// ── Page assets ───────────────────────────────────────────────────────────────

/// Raw attributes of one page element, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAssetRef {
    pub src: Option<String>,
    pub style: Option<String>,
}

impl RawAssetRef {
    pub fn new(src: Option<&str>, style: Option<&str>) -> Self {
        Self {
            src: src.map(str::to_string),
            style: style.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageAsset {
    pub url: String,
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// Wire shape returned by the table-recognition service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFragment {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// A table with one header set shared by every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Rows as (header, cell) pairs in column order.
    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(move |row| {
            self.headers
                .iter()
                .zip(row.iter())
                .map(|(h, c)| (h.as_str(), c.as_str()))
                .collect()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Scheme records ────────────────────────────────────────────────────────────

pub const COL_COMPANY: &str = "Company";
pub const COL_SOURCE: &str = "Source";
pub const COL_MONTH: &str = "Month";
pub const COL_LINK: &str = "Link";
pub const PROVENANCE_COLUMNS: [&str; 4] = [COL_COMPANY, COL_SOURCE, COL_MONTH, COL_LINK];

/// Canonical output row: fixed provenance keys plus whatever offer columns the
/// source table exposed, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRecord {
    pub company: String,
    pub source: String,
    pub month: String,
    pub link: String,
    pub offer: Vec<(String, String)>,
}

impl SchemeRecord {
    /// All columns, provenance first.
    pub fn columns(&self) -> Vec<(&str, &str)> {
        let mut cols = vec![
            (COL_COMPANY, self.company.as_str()),
            (COL_SOURCE, self.source.as_str()),
            (COL_MONTH, self.month.as_str()),
            (COL_LINK, self.link.as_str()),
        ];
        cols.extend(self.offer.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cols
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.columns().into_iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Offer columns as a JSON array of `[header, cell]` pairs (keeps order).
    pub fn offer_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.offer)
    }
}

impl Serialize for SchemeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cols = self.columns();
        let mut map = serializer.serialize_map(Some(cols.len()))?;
        for (k, v) in cols {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Records produced for one company in one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyOffers {
    pub company: String,
    pub records: Vec<SchemeRecord>,
    pub placeholder: bool,
}

// ── Ranking ───────────────────────────────────────────────────────────────────

pub const NEUTRAL_SCORE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySignal {
    pub company: String,
    pub min_price: Option<f64>, // lakh
    pub max_price: Option<f64>, // lakh
    pub reliability_score: u8,  // 1..=5
    pub service_center_count: Option<u32>,
    pub service_score: u8, // 1..=5
}

impl CompanySignal {
    /// Signal with nothing known: neutral scores, no prices or counts.
    pub fn neutral(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            min_price: None,
            max_price: None,
            reliability_score: NEUTRAL_SCORE,
            service_center_count: None,
            service_score: NEUTRAL_SCORE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPosition {
    pub company: String,
    pub composite_score: f64,
    pub rank: u32,
}

// ── Pricing / market share ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRow {
    pub total_models: String,
    pub car_types: String,
    pub model: String,
    pub price: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketShare {
    pub company: String,
    pub units_sold: u64,
    pub share_pct: f64,
    pub period: String,
    pub source: String,
    pub position: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undated_posts_sort_lowest() {
        let undated: Option<Period> = None;
        let old = Some(Period { year: 2024, month: 12 });
        let new = Some(Period { year: 2025, month: 1 });
        assert!(undated < old);
        assert!(old < new);
    }

    #[test]
    fn record_serializes_provenance_first() {
        let rec = SchemeRecord {
            company: "Kia".into(),
            source: "AutoPunditz".into(),
            month: "November".into(),
            link: "https://example.com/kia".into(),
            offer: vec![("Model".into(), "Seltos".into()), ("Offer".into(), "50000".into())],
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            json,
            r#"{"Company":"Kia","Source":"AutoPunditz","Month":"November","Link":"https://example.com/kia","Model":"Seltos","Offer":"50000"}"#
        );
        assert_eq!(rec.get("Model"), Some("Seltos"));
        assert_eq!(rec.get("Missing"), None);
    }
}
