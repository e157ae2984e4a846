pub mod export;

use crate::models::{CompanyOffers, CompanySignal, MarketShare, RankedPosition};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_scrape_runs START 1;

CREATE TABLE IF NOT EXISTS scrape_runs (
    id                  INTEGER PRIMARY KEY DEFAULT nextval('seq_scrape_runs'),
    kind                VARCHAR NOT NULL,
    period              VARCHAR,
    started_at          TIMESTAMP NOT NULL,
    finished_at         TIMESTAMP,
    status              VARCHAR NOT NULL DEFAULT 'running',
    companies_processed INTEGER DEFAULT 0,
    rows_inserted       INTEGER DEFAULT 0,
    error_msg           VARCHAR
);

CREATE TABLE IF NOT EXISTS scheme_records (
    run_id      INTEGER  NOT NULL,
    company     VARCHAR  NOT NULL,
    row_no      INTEGER  NOT NULL,
    source      VARCHAR  NOT NULL,
    month       VARCHAR  NOT NULL,
    link        VARCHAR  NOT NULL,
    -- [[header, cell], ...] in source column order
    offer_json  VARCHAR  NOT NULL,
    placeholder BOOLEAN  NOT NULL DEFAULT FALSE,
    scraped_at  TIMESTAMP NOT NULL,
    PRIMARY KEY (run_id, company, row_no)
);

CREATE TABLE IF NOT EXISTS ranked_positions (
    run_id            INTEGER NOT NULL,
    company           VARCHAR NOT NULL,
    rank              INTEGER NOT NULL,
    composite_score   DOUBLE  NOT NULL,
    -- Lakh; NULL when the pricing page gave nothing
    min_price         DOUBLE,
    max_price         DOUBLE,
    reliability_score INTEGER,
    service_score     INTEGER,
    service_centers   INTEGER,
    PRIMARY KEY (run_id, company)
);

CREATE TABLE IF NOT EXISTS market_share (
    run_id      INTEGER NOT NULL,
    company     VARCHAR NOT NULL,
    sales_rank  INTEGER NOT NULL,
    units_sold  BIGINT  NOT NULL,
    share_pct   DOUBLE  NOT NULL,
    period      VARCHAR NOT NULL,
    source      VARCHAR,
    PRIMARY KEY (run_id, company)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_schemes_company ON scheme_records (company);
CREATE INDEX IF NOT EXISTS idx_ranked_run      ON ranked_positions (run_id);
"#;

/// One row of the run log.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: i64,
    pub kind: String,
    pub period: Option<String>,
    pub status: String,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub rows_inserted: i64,
}

// ── RunStore ──────────────────────────────────────────────────────────────────

pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Scheme records ────────────────────────────────────────────────────────

    /// Stores every record of every company under `run_id`. Returns the
    /// number of rows written.
    pub fn insert_offers(&self, run_id: i64, offers: &[CompanyOffers]) -> Result<usize> {
        let now = Utc::now().naive_utc();
        let tx = self.conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO scheme_records
                (run_id, company, row_no, source, month, link, offer_json, placeholder, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (run_id, company, row_no) DO UPDATE SET
                source      = excluded.source,
                month       = excluded.month,
                link        = excluded.link,
                offer_json  = excluded.offer_json,
                placeholder = excluded.placeholder,
                scraped_at  = excluded.scraped_at
        "#;

        let mut n = 0usize;
        for company in offers {
            for (i, rec) in company.records.iter().enumerate() {
                let offer_json = rec
                    .offer_json()
                    .with_context(|| format!("serialize offer columns for {}", rec.company))?;
                tx.execute(sql, params![
                    run_id,
                    company.company,
                    i as i64,
                    rec.source,
                    rec.month,
                    rec.link,
                    offer_json,
                    company.placeholder,
                    now,
                ])
                .with_context(|| format!("insert scheme record {} #{}", company.company, i))?;
                n += 1;
            }
        }

        tx.commit()?;
        Ok(n)
    }

    pub fn record_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM scheme_records")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn placeholder_count(&self) -> Result<i64> {
        let mut s = self
            .conn
            .prepare("SELECT COUNT(*) FROM scheme_records WHERE placeholder")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    /// Distinct companies that have at least one stored record.
    pub fn list_companies(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT company FROM scheme_records ORDER BY company")?;
        let names: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    // ── Ranking ───────────────────────────────────────────────────────────────

    /// Ranked positions joined with the signal each was scored from.
    pub fn insert_positions(
        &self,
        run_id: i64,
        positions: &[RankedPosition],
        signals: &[CompanySignal],
    ) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO ranked_positions
                (run_id, company, rank, composite_score, min_price, max_price,
                 reliability_score, service_score, service_centers)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (run_id, company) DO UPDATE SET
                rank              = excluded.rank,
                composite_score   = excluded.composite_score,
                min_price         = excluded.min_price,
                max_price         = excluded.max_price,
                reliability_score = excluded.reliability_score,
                service_score     = excluded.service_score,
                service_centers   = excluded.service_centers
        "#;

        for p in positions {
            let signal = signals.iter().find(|s| s.company == p.company);
            tx.execute(sql, params![
                run_id,
                p.company,
                i64::from(p.rank),
                p.composite_score,
                signal.and_then(|s| s.min_price),
                signal.and_then(|s| s.max_price),
                signal.map(|s| i64::from(s.reliability_score)),
                signal.map(|s| i64::from(s.service_score)),
                signal.and_then(|s| s.service_center_count).map(i64::from),
            ])
            .with_context(|| format!("insert position {}", p.company))?;
        }

        tx.commit()?;
        Ok(positions.len())
    }

    /// Latest run's ranking, best first.
    pub fn latest_positions(&self) -> Result<Vec<RankedPosition>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT company, composite_score, rank FROM ranked_positions
               WHERE run_id = (SELECT MAX(run_id) FROM ranked_positions)
               ORDER BY rank"#,
        )?;
        let rows: Vec<RankedPosition> = stmt
            .query_map([], |r| {
                Ok(RankedPosition {
                    company: r.get(0)?,
                    composite_score: r.get(1)?,
                    rank: r.get::<_, i64>(2)? as u32,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn insert_market_share(&self, run_id: i64, shares: &[MarketShare]) -> Result<usize> {
        if shares.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO market_share
                (run_id, company, sales_rank, units_sold, share_pct, period, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (run_id, company) DO UPDATE SET
                sales_rank = excluded.sales_rank,
                units_sold = excluded.units_sold,
                share_pct  = excluded.share_pct,
                period     = excluded.period,
                source     = excluded.source
        "#;

        for s in shares {
            tx.execute(sql, params![
                run_id,
                s.company,
                i64::from(s.position),
                s.units_sold as i64,
                s.share_pct,
                s.period,
                s.source,
            ])
            .with_context(|| format!("insert market share {}", s.company))?;
        }

        tx.commit()?;
        Ok(shares.len())
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_run(&self, kind: &str, period: Option<&str>) -> Result<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO scrape_runs (kind, period, started_at, status) VALUES (?, ?, ?, 'running') RETURNING id",
            params![kind, period, Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_run(&self, run_id: i64, companies: usize, rows: usize, error: Option<&str>) -> Result<()> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               companies_processed = ?, rows_inserted = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                companies as i64,
                rows as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM scrape_runs")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn last_run(&self) -> Result<Option<RunSummary>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, kind, period, status, started_at, finished_at, rows_inserted
               FROM scrape_runs ORDER BY id DESC LIMIT 1"#,
        )?;
        let mut rows = stmt.query_map([], |r| {
            Ok(RunSummary {
                id: r.get(0)?,
                kind: r.get(1)?,
                period: r.get(2)?,
                status: r.get(3)?,
                started_at: r.get(4)?,
                finished_at: r.get(5)?,
                rows_inserted: r.get::<_, Option<i64>>(6)?.unwrap_or(0),
            })
        })?;
        Ok(rows.next().transpose()?)
    }
}
