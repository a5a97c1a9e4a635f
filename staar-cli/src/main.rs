//! STAAR CLI: fetch, aggregate, correlate and cache commands.
//!
//! Commands:
//! - `fetch` (default): BTC aggregate across exchanges, then every alt-coin
//! - `exchange <NAME>`: one exchange's BTC/USD history
//! - `altcoin <CODE>`: one alt-coin's BTC pair history
//! - `correlate --trends <CSV>`: weekly BTC price and volume against search interest
//! - `cache status`: cached series, row counts, date ranges

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use staar_core::analysis::{load_trend_csv, TrendStudy};
use staar_core::data::{AltcoinFetcher, CsvCache, PoloniexProvider, PriceSeries};
use staar_core::{Pipeline, PipelineConfig};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rows shown when printing a table.
const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(
    name = "staar",
    about = "Search Trends and Asset Research: crypto price history and search interest"
)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory, overriding the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the BTC aggregate, then fetch every configured alt-coin.
    Fetch {
        /// Ignore cached series and re-download.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Daily BTC/USD history for one exchange (e.g. KRAKEN).
    Exchange {
        name: String,

        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Daily BTC pair history for one alt-coin (e.g. ETH).
    Altcoin {
        code: String,

        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Correlate the weekly BTC aggregate with a search-interest export.
    Correlate {
        /// CSV with a date column and a `Trend` column.
        #[arg(long)]
        trends: PathBuf,

        /// Rolling window, in weeks, for the smoothed table.
        #[arg(long, default_value_t = 8)]
        window: usize,

        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Write the weekly and smoothed tables here as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached series, row counts, date ranges and sizes.
    Status,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command.unwrap_or(Commands::Fetch { refresh: false }) {
        Commands::Fetch { refresh } => run_fetch(config, refresh),
        Commands::Exchange { name, refresh } => run_exchange(config, &name, refresh),
        Commands::Altcoin { code, refresh } => run_altcoin(&config, &code, refresh),
        Commands::Correlate {
            trends,
            window,
            refresh,
            output,
        } => run_correlate(config, &trends, window, refresh, output.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
        },
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

fn run_fetch(config: PipelineConfig, refresh: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let output = pipeline.run(refresh).context("pipeline run failed")?;

    print_table("BTC/USD aggregate", output.btc.table())?;
    for (asset, series) in &output.altcoins {
        print_table(&format!("{asset}/BTC"), series)?;
    }
    Ok(())
}

fn run_exchange(config: PipelineConfig, name: &str, refresh: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let series = pipeline
        .exchange_fetcher()
        .fetch(name, refresh)
        .with_context(|| format!("fetching exchange {name}"))?;
    print_table(&format!("{name} BTC/USD"), &series)
}

// Pair history needs no API key, so skip the full pipeline.
fn run_altcoin(config: &PipelineConfig, code: &str, refresh: bool) -> Result<()> {
    let provider = PoloniexProvider::with_base_url(config.poloniex_base_url.clone())?;
    let cache = CsvCache::new(config.data_dir.clone());
    let fetcher = AltcoinFetcher::new(&provider, &cache, config.candlestick_period);

    let start = config.history_start.and_time(chrono::NaiveTime::MIN);
    let series = fetcher
        .fetch(code, start, Utc::now().naive_utc(), refresh)
        .with_context(|| format!("fetching alt-coin {code}"))?;
    print_table(&format!("{code}/BTC"), &series)
}

fn run_correlate(
    config: PipelineConfig,
    trends: &Path,
    window: usize,
    refresh: bool,
    output: Option<&Path>,
) -> Result<()> {
    let trend = load_trend_csv(trends)
        .with_context(|| format!("reading search trend {}", trends.display()))?;

    let pipeline = Pipeline::from_config(config)?;
    let aggregate = pipeline
        .build_btc_aggregate(refresh)
        .context("building BTC aggregate")?;

    let study = TrendStudy::build(&aggregate, &trend, window)?;

    print_table("Weekly", &study.weekly)?;
    print_table(&format!("Smoothed ({window} weeks)"), &study.smoothed)?;
    println!("Trend vs price correlation:  {:.4}", study.price_correlation);
    println!("Trend vs volume correlation: {:.4}", study.volume_correlation);

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        write_csv(&study.weekly, &dir.join("weekly.csv"))?;
        write_csv(&study.smoothed, &dir.join("smoothed.csv"))?;
        println!("Tables written to: {}", dir.display());
    }
    Ok(())
}

fn run_cache_status(config: &PipelineConfig) -> Result<()> {
    let cache = CsvCache::new(config.data_dir.clone());
    let entries = cache.status()?;

    if entries.is_empty() {
        println!("Cache is empty: {}", cache.data_dir().display());
        return Ok(());
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!("Cache: {}", cache.data_dir().display());
    println!("Series: {}", entries.len());
    println!("Total size: {}", format_size(total));
    println!();
    println!(
        "{:<16} {:<25} {:>8} {:>10}",
        "Series", "Date Range", "Rows", "Size"
    );
    println!("{}", "-".repeat(62));
    for entry in &entries {
        let range = match (entry.first_date, entry.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "-".to_string(),
        };
        let rows = entry
            .rows
            .map(|r| r.to_string())
            .unwrap_or_else(|| "corrupt".to_string());
        println!(
            "{:<16} {:<25} {:>8} {:>10}",
            entry.identifier,
            range,
            rows,
            format_size(entry.size_bytes)
        );
    }
    Ok(())
}

fn print_table(title: &str, series: &PriceSeries) -> Result<()> {
    println!();
    println!("=== {title} ({} rows) ===", series.len());
    if series.is_empty() {
        println!("(no data)");
        return Ok(());
    }
    println!("{}", series.tail(PREVIEW_ROWS).to_dataframe()?);
    Ok(())
}

fn write_csv(series: &PriceSeries, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    series
        .write_csv(file)
        .with_context(|| format!("writing {}", path.display()))
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
