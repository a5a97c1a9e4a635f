//! STAAR core: historical crypto price series, fetched, cached and merged.
//!
//! - Remote providers for per-exchange BTC/USD history and alt-coin/BTC
//!   candlesticks, behind traits so tests can swap them out
//! - A directory of CSV files as the local cache, one file per series
//! - Outer-join merge of one column across sources with a row-wise mean
//! - The pipeline that drives all of the above from a [`PipelineConfig`]
//! - Weekly correlation of the BTC aggregate against search interest

pub mod analysis;
pub mod config;
pub mod data;
pub mod epoch;
pub mod pipeline;

pub use config::{ApiKey, ConfigError, PipelineConfig};
pub use data::{AggregateTable, DataError, MeanPolicy, PriceSeries};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput};
