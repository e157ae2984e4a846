//! Market position: composite ranking from partial per-company signals, plus
//! the sales-volume market share table.

pub mod market_share;
pub mod signals;

use crate::models::{CompanySignal, RankedPosition};

pub const RELIABILITY_WEIGHT: f64 = 0.4;
pub const SERVICE_WEIGHT: f64 = 0.4;
pub const PRICE_KNOWN_WEIGHT: f64 = 0.2;

/// Weighted score rounded to two decimals so equal inputs always tie exactly.
pub fn composite_score(signal: &CompanySignal) -> f64 {
    let price_known = if signal.min_price.is_some() { 1.0 } else { 0.0 };
    let raw = RELIABILITY_WEIGHT * f64::from(signal.reliability_score)
        + SERVICE_WEIGHT * f64::from(signal.service_score)
        + PRICE_KNOWN_WEIGHT * price_known;
    (raw * 100.0).round() / 100.0
}

/// Descending composite score, ranks 1..=N. The sort is stable, so tied
/// companies keep their input order.
pub fn rank(signals: &[CompanySignal]) -> Vec<RankedPosition> {
    let mut scored: Vec<(&str, f64)> = signals
        .iter()
        .map(|s| (s.company.as_str(), composite_score(s)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (company, composite_score))| RankedPosition {
            company: company.to_string(),
            composite_score,
            rank: i as u32 + 1,
        })
        .collect()
}
