mod config;
mod models;
mod offers;
mod pipeline;
mod ranking;
mod scraper;
mod storage;
mod utils;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::models::Period;
use crate::offers::{HttpTableRecognizer, SourceResolver};
use crate::pipeline::{MarketPipeline, OfferPipeline, PipelineStats};
use crate::scraper::http_client::HttpClient;
use crate::scraper::parsers::parse_index_page;
use crate::scraper::{Fetcher, StaticPageSession};
use crate::storage::{RunStore, export};

#[derive(Parser)]
#[command(name = "auto-offer-intel", about = "Automotive offer extraction and market position", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Extract this month's dealer schemes for every configured company
    Offers {
        /// Target year (default: current)
        #[arg(long)]
        year: Option<i32>,

        /// Target month, 1-12 (default: current)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Only these companies (repeatable)
        #[arg(short, long)]
        company: Vec<String>,

        /// Skip the DuckDB run store; CSV output is still written
        #[arg(long)]
        no_store: bool,
    },

    /// Rank companies by composite score and compute market share
    Rank {
        #[arg(long)]
        no_store: bool,
    },

    /// Show which post a company's offers would be read from
    Resolve {
        company: String,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Show run store statistics
    Stats,

    /// Apply schema migrations
    Migrate,
}

fn target_period(year: Option<i32>, month: Option<u32>) -> Period {
    let now = utils::current_period();
    Period {
        year: year.unwrap_or(now.year),
        month: month.unwrap_or(now.month),
    }
}

fn open_store(config: &AppConfig) -> Result<RunStore> {
    let store = RunStore::open(&config.storage.db_path)?;
    if config.storage.run_migrations {
        store.run_migrations()?;
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "auto_offer_intel=info,warn",
        1 => "auto_offer_intel=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Offers { year, month, company, no_store } => {
            let _t = utils::Timer::start("Offer extraction");
            let period = target_period(year, month);
            let companies = config.select_companies(&company)?;

            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpClient::new(&config.scraper)?);
            let recognizer = HttpTableRecognizer::new(&config.recognition)?;
            let session = StaticPageSession::new(fetcher.clone());

            let store = if no_store { None } else { Some(open_store(&config)?) };
            let run_id = match &store {
                Some(s) => Some(s.begin_run("offers", Some(period.to_string().as_str()))?),
                None => None,
            };

            let outcome = OfferPipeline::new(&config, &*fetcher, &recognizer)
                .run(Box::new(session), &companies, period)
                .await;

            let offers = match outcome {
                Ok(offers) => offers,
                Err(e) => {
                    error!("Offer run failed: {:#}", e);
                    if let (Some(s), Some(id)) = (&store, run_id) {
                        s.finish_run(id, 0, 0, Some(format!("{:#}", e).as_str()))?;
                    }
                    return Err(e);
                }
            };

            let stats = PipelineStats::from_offers(&offers);
            if let (Some(s), Some(id)) = (&store, run_id) {
                let rows = s.insert_offers(id, &offers)?;
                s.finish_run(id, stats.companies_processed, rows, None)?;
            }
            export::export_offers(&config.storage.output_dir, period, &offers)?;

            info!(
                "Done: {} companies, {} records, {} placeholders",
                stats.companies_processed, stats.records, stats.placeholders
            );
        }

        Command::Rank { no_store } => {
            let _t = utils::Timer::start("Market position");
            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpClient::new(&config.scraper)?);
            let session = StaticPageSession::new(fetcher.clone());

            let companies = config.select_companies(&[])?;
            let report = MarketPipeline::new(&config, &*fetcher)
                .run(Box::new(session), &companies)
                .await?;
            let signals: Vec<_> = report.signals.iter().map(|c| c.signal.clone()).collect();

            if !no_store {
                let store = open_store(&config)?;
                let id = store.begin_run("rank", None)?;
                let rows = store.insert_positions(id, &report.positions, &signals)?
                    + store.insert_market_share(id, &report.shares)?;
                store.finish_run(id, report.positions.len(), rows, None)?;
            }
            export::export_market(&config.storage.output_dir, &report.positions, &report.signals, &report.shares)?;

            println!("─────────────────────────────────");
            println!("  Market position");
            println!("─────────────────────────────────");
            for p in &report.positions {
                let price = match report.signal_for(&p.company).and_then(|s| s.min_price.zip(s.max_price)) {
                    Some((min, max)) => format!("₹{:.2}-{:.2} L", min, max),
                    None => "price n/a".to_string(),
                };
                println!("  {:>2}. {:<16} {:.2}  {}", p.rank, p.company, p.composite_score, price);
            }
            println!("─────────────────────────────────");
        }

        Command::Resolve { company, year, month } => {
            let period = target_period(year, month);
            let Some(cfg) = config.company(&company) else {
                bail!("Unknown company {:?} (not in config)", company);
            };

            let fetcher = HttpClient::new(&config.scraper)?;
            let index_url = &config.sources.index_url;
            let posts = match fetcher.get_text(index_url).await {
                Ok(html) => parse_index_page(&html, index_url),
                Err(e) => {
                    error!("Index {} unavailable: {:#}", index_url, e);
                    vec![]
                }
            };

            let resolver = SourceResolver::from_config(&config.companies);
            match resolver.resolve(&cfg.name, &cfg.match_keywords(), &posts, period) {
                Some(r) => println!(
                    "{} {} → {} ({})",
                    cfg.name,
                    period,
                    r.url,
                    if r.from_index { "index" } else { "fallback template" }
                ),
                None => println!("{} {} → no source", cfg.name, period),
            }
        }

        Command::Stats => {
            let store = RunStore::open(&config.storage.db_path)?;
            let runs = store.run_count()?;
            let records = store.record_count()?;
            let placeholders = store.placeholder_count()?;
            let companies = store.list_companies()?;
            let last = store.last_run()?;
            println!("─────────────────────────────────");
            println!("  Auto Offer Intel — Run Store");
            println!("─────────────────────────────────");
            println!("  Runs         : {}", utils::fmt_number(runs));
            println!("  Records      : {}", utils::fmt_number(records));
            println!("  Placeholders : {}", utils::fmt_number(placeholders));
            println!("  Companies    : {}", companies.len());
            match last {
                Some(r) => println!(
                    "  Last run     : #{} {} {} ({})",
                    r.id,
                    r.kind,
                    r.period.as_deref().unwrap_or("—"),
                    r.status
                ),
                None => println!("  Last run     : —"),
            }
            for p in store.latest_positions()? {
                println!("    {:>2}. {:<16} {:.2}", p.rank, p.company, p.composite_score);
            }
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            RunStore::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
