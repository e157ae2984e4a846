//! CSV output: one section per company for scheme records, flat tables for
//! the ranking and market share.

use crate::models::{CompanyOffers, CompanySignal, MarketShare, PROVENANCE_COLUMNS, Period, RankedPosition};
use crate::ranking::signals::CollectedSignal;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Provenance columns first, then offer columns in first-seen order.
pub fn section_headers(offers: &CompanyOffers) -> Vec<String> {
    let mut headers: Vec<String> = PROVENANCE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for rec in &offers.records {
        for (key, _) in &rec.offer {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Each section is a title row holding the company name, a header row and
/// the records. Cells a record lacks are left empty.
pub fn write_offer_sections<W: Write>(out: W, offers: &[CompanyOffers]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    for company in offers {
        let headers = section_headers(company);
        wtr.write_record([company.company.as_str()])?;
        wtr.write_record(&headers)?;
        for rec in &company.records {
            let row: Vec<&str> = headers.iter().map(|h| rec.get(h).unwrap_or("")).collect();
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PositionRow<'a> {
    #[serde(rename = "Rank")]
    rank: u32,
    #[serde(rename = "Company")]
    company: &'a str,
    #[serde(rename = "Composite Score")]
    composite_score: f64,
    #[serde(rename = "Min Price (Lakh)")]
    min_price: Option<f64>,
    #[serde(rename = "Max Price (Lakh)")]
    max_price: Option<f64>,
    #[serde(rename = "Reliability")]
    reliability: Option<u8>,
    #[serde(rename = "Service")]
    service: Option<u8>,
}

pub fn write_positions<W: Write>(out: W, positions: &[RankedPosition], signals: &[CompanySignal]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for p in positions {
        let signal = signals.iter().find(|s| s.company == p.company);
        wtr.serialize(PositionRow {
            rank: p.rank,
            company: &p.company,
            composite_score: p.composite_score,
            min_price: signal.and_then(|s| s.min_price),
            max_price: signal.and_then(|s| s.max_price),
            reliability: signal.map(|s| s.reliability_score),
            service: signal.map(|s| s.service_score),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_market_share<W: Write>(out: W, shares: &[MarketShare]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for s in shares {
        wtr.serialize(s)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PricingLine<'a> {
    #[serde(rename = "Company")]
    company: &'a str,
    #[serde(rename = "Total Models")]
    total_models: &'a str,
    #[serde(rename = "Car Types")]
    car_types: &'a str,
    #[serde(rename = "Model")]
    model: &'a str,
    #[serde(rename = "Price")]
    price: &'a str,
}

/// Parsed pricing rows, one line per model, companies in ranking input order.
pub fn write_pricing<W: Write>(out: W, collected: &[CollectedSignal]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for c in collected {
        for row in &c.pricing_rows {
            wtr.serialize(PricingLine {
                company: &c.signal.company,
                total_models: &row.total_models,
                car_types: &row.car_types,
                model: &row.model,
                price: &row.price,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn create(dir: &Path, name: &str) -> Result<(PathBuf, std::fs::File)> {
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create dir {:?}", dir))?;
    let path = dir.join(name);
    let file = std::fs::File::create(&path).with_context(|| format!("Could not create {:?}", path))?;
    Ok((path, file))
}

/// `<dir>/schemes_<YYYY-MM>.csv`
pub fn export_offers(dir: &Path, period: Period, offers: &[CompanyOffers]) -> Result<PathBuf> {
    let (path, file) = create(dir, &format!("schemes_{}.csv", period))?;
    write_offer_sections(file, offers)?;
    info!("Wrote {} company sections to {:?}", offers.len(), path);
    Ok(path)
}

/// `<dir>/market_position.csv`, `<dir>/pricing.csv` and `<dir>/market_share.csv`
pub fn export_market(
    dir: &Path,
    positions: &[RankedPosition],
    collected: &[CollectedSignal],
    shares: &[MarketShare],
) -> Result<Vec<PathBuf>> {
    let signals: Vec<CompanySignal> = collected.iter().map(|c| c.signal.clone()).collect();

    let (pos_path, file) = create(dir, "market_position.csv")?;
    write_positions(file, positions, &signals)?;
    let (pricing_path, file) = create(dir, "pricing.csv")?;
    write_pricing(file, collected)?;
    let (share_path, file) = create(dir, "market_share.csv")?;
    write_market_share(file, shares)?;
    info!("Wrote {:?}, {:?} and {:?}", pos_path, pricing_path, share_path);
    Ok(vec![pos_path, pricing_path, share_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingRow, SchemeRecord};

    fn record(offer: &[(&str, &str)]) -> SchemeRecord {
        SchemeRecord {
            company: "Hyundai".into(),
            source: "AutoPunditz".into(),
            month: "November".into(),
            link: "https://ap.test/h".into(),
            offer: offer.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn read_back(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_sections_use_union_headers() {
        let offers = vec![CompanyOffers {
            company: "Hyundai".into(),
            records: vec![
                record(&[("Model", "Creta"), ("Cash Discount", "20,000")]),
                record(&[("Model", "Verna"), ("Exchange Bonus", "25,000")]),
            ],
            placeholder: false,
        }];

        let mut buf = Vec::new();
        write_offer_sections(&mut buf, &offers).unwrap();
        let rows = read_back(&buf);

        assert_eq!(rows[0], vec!["Hyundai"]);
        assert_eq!(
            rows[1],
            vec!["Company", "Source", "Month", "Link", "Model", "Cash Discount", "Exchange Bonus"]
        );
        assert_eq!(rows[2][4..], ["Creta", "20,000", ""]);
        assert_eq!(rows[3][4..], ["Verna", "", "25,000"]);
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_positions_leave_unknown_prices_empty() {
        let positions = vec![RankedPosition { company: "Volvo".into(), composite_score: 2.4, rank: 1 }];
        let signals = vec![CompanySignal::neutral("Volvo")];

        let mut buf = Vec::new();
        write_positions(&mut buf, &positions, &signals).unwrap();
        let rows = read_back(&buf);

        assert_eq!(rows[0][..3], ["Rank", "Company", "Composite Score"]);
        assert_eq!(rows[1], vec!["1", "Volvo", "2.4", "", "", "3", "3"]);
    }

    fn collected(company: &str, rows: &[(&str, &str)]) -> CollectedSignal {
        CollectedSignal {
            signal: CompanySignal::neutral(company),
            pricing_text: "Not Available".into(),
            pricing_rows: rows
                .iter()
                .map(|(model, price)| PricingRow {
                    total_models: "13".into(),
                    car_types: "8 SUVs".into(),
                    model: model.to_string(),
                    price: price.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_pricing_rows_one_line_per_model() {
        let signals = vec![
            collected("Hyundai", &[("Creta", "₹11 - 20.30 Lakh"), ("Venue", "₹7.94 - 13.62 Lakh")]),
            collected("Volvo", &[("All models", "Fetch Failed")]),
        ];

        let mut buf = Vec::new();
        write_pricing(&mut buf, &signals).unwrap();
        let rows = read_back(&buf);

        assert_eq!(rows[0], vec!["Company", "Total Models", "Car Types", "Model", "Price"]);
        assert_eq!(rows[1], vec!["Hyundai", "13", "8 SUVs", "Creta", "₹11 - 20.30 Lakh"]);
        assert_eq!(rows[3][0], "Volvo");
        assert_eq!(rows[3][3], "All models");
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_export_market_writes_pricing_file() {
        let dir = std::env::temp_dir().join(format!("auto_offer_intel_export_{}", std::process::id()));
        let positions = vec![RankedPosition { company: "Kia".into(), composite_score: 2.6, rank: 1 }];
        let signals = vec![collected("Kia", &[("Seltos", "₹11 - 20 Lakh")])];

        let paths = export_market(&dir, &positions, &signals, &[]).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[1].ends_with("pricing.csv"));

        let bytes = std::fs::read(&paths[1]).unwrap();
        let rows = read_back(&bytes);
        assert_eq!(rows[1][0], "Kia");
        assert_eq!(rows[1][3], "Seltos");
        assert_eq!(rows[1][4], "₹11 - 20 Lakh");

        std::fs::remove_dir_all(&dir).ok();
    }
}
