//! Remote provider traits and structured error types.
//!
//! The two traits abstract over the remote APIs (the symbol-keyed price
//! dataset API and the pair-keyed charting API) so fetchers can be driven by
//! mocks in tests. The cache layer sits above these traits; providers don't
//! know about the cache.

use super::table::PriceSeries;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
///
/// Nothing in the pipeline recovers from these locally; they surface to the
/// orchestrator and from there to the caller.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cache I/O failed for {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("column '{column}' not found in series '{series}'")]
    MissingColumn { series: String, column: String },

    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("unable to get historical prices for Alt-Btc pair {pair} from Poloniex")]
    EmptyResult { pair: String },

    #[error("dataframe conversion failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Parameters of a single charting API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    /// Currency-pair code, e.g. `BTC_ETH`.
    pub pair: String,
    /// Start of the window in seconds since 1970-01-01 UTC.
    pub start: i64,
    /// End of the window in seconds since 1970-01-01 UTC.
    pub end: i64,
    /// Candlestick width in seconds.
    pub period: u64,
}

/// Symbol-keyed historical price dataset API (e.g. `BCHARTS/KRAKENUSD`).
pub trait PriceApi: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the full daily history for a dataset symbol.
    ///
    /// An unknown symbol or a dataset with no rows may come back as an empty
    /// series; callers decide whether that is an error.
    fn fetch_dataset(&self, symbol: &str) -> Result<PriceSeries, DataError>;
}

/// Pair-keyed candlestick charting API.
pub trait ChartApi: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch candles for a currency pair over an epoch-seconds window.
    fn fetch_chart(&self, request: &ChartRequest) -> Result<PriceSeries, DataError>;
}
