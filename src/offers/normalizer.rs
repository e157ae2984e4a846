use crate::models::{ExtractedTable, PROVENANCE_COLUMNS, SchemeRecord};
use std::collections::HashSet;

/// Provenance attached to every record of one company.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub company: &'a str,
    pub source: &'a str,
    pub month: &'a str,
    pub link: &'a str,
}

/// Offer headers that clash with a provenance key get a " (table)" suffix.
fn offer_key(header: &str) -> String {
    if PROVENANCE_COLUMNS.iter().any(|p| p.eq_ignore_ascii_case(header.trim())) {
        format!("{} (table)", header.trim())
    } else {
        header.to_string()
    }
}

/// One record per table row, provenance first. Identical records (same
/// columns and values) are kept once, at their first position.
pub fn normalize(prov: Provenance<'_>, tables: &[ExtractedTable]) -> Vec<SchemeRecord> {
    let mut seen: HashSet<Vec<(String, String)>> = HashSet::new();
    let mut records = Vec::new();

    for table in tables {
        for row in table.iter_rows() {
            let offer: Vec<(String, String)> = row
                .into_iter()
                .map(|(h, c)| (offer_key(h), c.to_string()))
                .collect();
            if !seen.insert(offer.clone()) {
                continue;
            }
            records.push(SchemeRecord {
                company: prov.company.to_string(),
                source: prov.source.to_string(),
                month: prov.month.to_string(),
                link: prov.link.to_string(),
                offer,
            });
        }
    }

    records
}

/// The single "no data" row standing in for a company with nothing extracted.
pub fn placeholder(prov: Provenance<'_>, text: &str) -> SchemeRecord {
    SchemeRecord {
        company: prov.company.to_string(),
        source: prov.source.to_string(),
        month: prov.month.to_string(),
        link: prov.link.to_string(),
        offer: vec![("Offer Details".to_string(), text.to_string())],
    }
}
