//! Price data: remote providers, CSV cache, fetchers and cross-source merge.

pub mod altcoin;
pub mod cache;
pub mod exchange;
pub mod merge;
pub mod poloniex;
pub mod provider;
pub mod quandl;
pub mod table;

pub use altcoin::AltcoinFetcher;
pub use cache::{CacheEntryStatus, CsvCache};
pub use exchange::ExchangeFetcher;
pub use merge::{
    build_aggregate, merge_column, row_mean, AggregateTable, MeanPolicy, MEAN_COLUMN,
    VOLUME_COLUMN,
};
pub use poloniex::PoloniexProvider;
pub use provider::{ChartApi, ChartRequest, DataError, PriceApi};
pub use quandl::QuandlProvider;
pub use table::{PriceSeries, SeriesColumn};
