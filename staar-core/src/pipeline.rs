//! Pipeline orchestrator.
//!
//! Drives the fetchers over the configured exchange and alt-coin lists,
//! strictly one source after another, and assembles the output tables.
//! The first failing fetch aborts the whole call: no per-source isolation
//! and no retries.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::merge::{build_aggregate, AggregateTable};
use crate::data::{
    AltcoinFetcher, ChartApi, CsvCache, DataError, ExchangeFetcher, PoloniexProvider, PriceApi,
    PriceSeries, QuandlProvider,
};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Exchange column merged into the per-exchange price table.
pub const WEIGHTED_PRICE_COLUMN: &str = "Weighted Price";

/// Exchange column merged into the volume mean.
pub const VOLUME_BTC_COLUMN: &str = "Volume (BTC)";

/// Errors from building or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub btc: AggregateTable,
    pub altcoins: BTreeMap<String, PriceSeries>,
}

/// The fetch-cache-merge pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    cache: CsvCache,
    price_api: Box<dyn PriceApi>,
    chart_api: Box<dyn ChartApi>,
}

impl Pipeline {
    /// Build a pipeline around explicit providers.
    pub fn new(
        config: PipelineConfig,
        price_api: Box<dyn PriceApi>,
        chart_api: Box<dyn ChartApi>,
    ) -> Self {
        let cache = CsvCache::new(config.data_dir.clone());
        Self {
            config,
            cache,
            price_api,
            chart_api,
        }
    }

    /// Build a pipeline talking to the real providers.
    ///
    /// Fails with `MissingApiKey` when no key is configured.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let api_key = config.require_api_key()?.to_string();
        let quandl = QuandlProvider::with_base_url(config.quandl_base_url.clone(), api_key)?;
        let poloniex = PoloniexProvider::with_base_url(config.poloniex_base_url.clone())?;
        Ok(Self::new(config, Box::new(quandl), Box::new(poloniex)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    pub fn exchange_fetcher(&self) -> ExchangeFetcher<'_> {
        ExchangeFetcher::new(self.price_api.as_ref(), &self.cache)
    }

    pub fn altcoin_fetcher(&self) -> AltcoinFetcher<'_> {
        AltcoinFetcher::new(
            self.chart_api.as_ref(),
            &self.cache,
            self.config.candlestick_period,
        )
    }

    /// Aggregate BTC/USD table across every configured exchange.
    ///
    /// Columns: one weighted-price column per exchange, then `Mean` and
    /// `Volume`.
    pub fn build_btc_aggregate(&self, refresh: bool) -> Result<AggregateTable, DataError> {
        let fetcher = self.exchange_fetcher();

        let mut series = Vec::with_capacity(self.config.exchanges.len());
        for exchange in &self.config.exchanges {
            series.push(fetcher.fetch(exchange, refresh)?);
        }

        let aggregate = build_aggregate(
            self.config.exchanges.as_slice(),
            &series,
            WEIGHTED_PRICE_COLUMN,
            VOLUME_BTC_COLUMN,
            self.config.mean_policy,
        )?;
        info!(
            exchanges = self.config.exchanges.len(),
            rows = aggregate.len(),
            "built BTC aggregate"
        );
        Ok(aggregate)
    }

    /// Every configured alt-coin from `history_start` until now.
    pub fn build_altcoin_set(
        &self,
        refresh: bool,
    ) -> Result<BTreeMap<String, PriceSeries>, DataError> {
        self.build_altcoin_set_until(chrono::Utc::now().naive_utc(), refresh)
    }

    /// Every configured alt-coin from `history_start` until `end`.
    pub fn build_altcoin_set_until(
        &self,
        end: NaiveDateTime,
        refresh: bool,
    ) -> Result<BTreeMap<String, PriceSeries>, DataError> {
        let fetcher = self.altcoin_fetcher();
        let start = self.config.history_start.and_time(chrono::NaiveTime::MIN);

        let mut altcoins = BTreeMap::new();
        for asset in &self.config.altcoins {
            let series = fetcher.fetch(asset, start, end, refresh)?;
            altcoins.insert(asset.clone(), series);
        }
        Ok(altcoins)
    }

    /// BTC aggregate first, then the alt-coin set.
    pub fn run(&self, refresh: bool) -> Result<PipelineOutput, DataError> {
        let btc = self.build_btc_aggregate(refresh)?;
        let altcoins = self.build_altcoin_set(refresh)?;
        Ok(PipelineOutput { btc, altcoins })
    }
}
