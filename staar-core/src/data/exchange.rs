//! Per-exchange BTC/USD daily prices.

use super::cache::CsvCache;
use super::provider::{DataError, PriceApi};
use super::table::PriceSeries;
use tracing::{debug, info, warn};

/// Cache-or-fetch access to daily BTC/USD prices for named exchanges.
pub struct ExchangeFetcher<'a> {
    api: &'a dyn PriceApi,
    cache: &'a CsvCache,
}

impl<'a> ExchangeFetcher<'a> {
    pub fn new(api: &'a dyn PriceApi, cache: &'a CsvCache) -> Self {
        Self { api, cache }
    }

    /// Cache identifier for an exchange, e.g. `btcusd-KRAKEN`.
    pub fn cache_key(exchange: &str) -> String {
        format!("btcusd-{exchange}")
    }

    /// Remote dataset symbol for an exchange, e.g. `BCHARTS/KRAKENUSD`.
    pub fn dataset_symbol(exchange: &str) -> String {
        format!("BCHARTS/{exchange}USD")
    }

    /// Daily prices for `exchange`.
    ///
    /// Without `refresh`, a cached entry is returned as-is and the remote API
    /// is not touched. Otherwise the dataset is fetched and, if it has rows,
    /// written to the cache before returning. An empty remote result is
    /// returned as an empty series, not an error.
    pub fn fetch(&self, exchange: &str, refresh: bool) -> Result<PriceSeries, DataError> {
        let key = Self::cache_key(exchange);

        if !refresh && self.cache.exists(&key) {
            debug!(exchange, "already have cached prices");
            return self.cache.read(&key);
        }

        info!(exchange, source = self.api.name(), "fetching bitcoin prices");
        let series = self.api.fetch_dataset(&Self::dataset_symbol(exchange))?;

        if series.is_empty() {
            warn!(exchange, "remote returned no prices; nothing cached");
        } else {
            info!(exchange, rows = series.len(), "fetched bitcoin prices");
            self.cache.write(&series, &key)?;
        }

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_follow_exchange_name() {
        assert_eq!(ExchangeFetcher::cache_key("COINBASE"), "btcusd-COINBASE");
        assert_eq!(ExchangeFetcher::dataset_symbol("COINBASE"), "BCHARTS/COINBASEUSD");
    }
}
