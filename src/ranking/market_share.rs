use crate::models::MarketShare;
use crate::scraper::cleaner::{normalize_make, parse_units};
use crate::scraper::parsers::SalesTable;
use std::collections::HashMap;

/// Units, share and sales position for each requested company. Makes outside
/// the tracked set and "Total"/"Others" rows are ignored; companies missing
/// from the table get zero units. Ties in units keep the requested order.
pub fn market_share<S: AsRef<str>>(table: &SalesTable, companies: &[S], source: &str) -> Vec<MarketShare> {
    let mut units_by_company: HashMap<&'static str, u64> = HashMap::new();
    let mut total: u64 = 0;

    for (make, units) in &table.rows {
        let make = make.trim();
        if make.is_empty() || ["total", "others"].contains(&make.to_lowercase().as_str()) {
            continue;
        }
        if let Some(company) = normalize_make(make) {
            let units = parse_units(units);
            units_by_company.insert(company, units);
            total += units;
        }
    }

    let mut rows: Vec<MarketShare> = companies
        .iter()
        .map(|c| {
            let company = c.as_ref();
            let units = units_by_company
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(company))
                .map(|(_, u)| *u)
                .unwrap_or(0);
            let share = if total > 0 {
                (units as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
            } else {
                0.0
            };
            MarketShare {
                company: company.to_string(),
                units_sold: units,
                share_pct: share,
                period: table.period.clone(),
                source: source.to_string(),
                position: 0,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.units_sold.cmp(&a.units_sold));
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i as u32 + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SalesTable {
        SalesTable {
            period: "November 2025".to_string(),
            rows: [
                ("Maruti Suzuki", "1,50,000"),
                ("Tata Motors", "50,000"),
                ("Hyundai", "50,000"),
                ("Others", "10,000"),
                ("Total", "2,60,000"),
                ("Force Motors", "1,000"),
                ("Kia", "n/a"),
            ]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
        }
    }

    #[test]
    fn test_market_share_positions() {
        let companies = ["Hyundai", "Tata Motors", "Maruti Suzuki", "Kia", "BYD"];
        let rows = market_share(&table(), &companies, "https://sales.test");

        let order: Vec<(&str, u64, u32)> =
            rows.iter().map(|r| (r.company.as_str(), r.units_sold, r.position)).collect();
        assert_eq!(
            order,
            vec![
                ("Maruti Suzuki", 150_000, 1),
                ("Hyundai", 50_000, 2),
                ("Tata Motors", 50_000, 3),
                ("Kia", 0, 4),
                ("BYD", 0, 5),
            ]
        );
        assert_eq!(rows[0].share_pct, 60.0);
        assert_eq!(rows[1].share_pct, 20.0);
        assert_eq!(rows[0].period, "November 2025");
    }

    #[test]
    fn test_empty_table_gives_zero_shares() {
        let rows = market_share(&SalesTable::default(), &["Kia"], "src");
        assert_eq!(rows[0].units_sold, 0);
        assert_eq!(rows[0].share_pct, 0.0);
        assert_eq!(rows[0].position, 1);
    }
}
