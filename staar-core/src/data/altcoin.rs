//! Alt-coin / BTC pair daily prices.

use super::cache::CsvCache;
use super::provider::{ChartApi, ChartRequest, DataError};
use super::table::PriceSeries;
use crate::epoch;
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// Cache-or-fetch access to daily alt-coin prices quoted in BTC.
pub struct AltcoinFetcher<'a> {
    api: &'a dyn ChartApi,
    cache: &'a CsvCache,
    period: u64,
}

impl<'a> AltcoinFetcher<'a> {
    /// `period` is the candlestick width in seconds.
    pub fn new(api: &'a dyn ChartApi, cache: &'a CsvCache, period: u64) -> Self {
        Self { api, cache, period }
    }

    /// Pair code for an asset, e.g. `BTC_ETH`. Also the cache identifier.
    pub fn pair_code(asset: &str) -> String {
        format!("BTC_{asset}")
    }

    /// Daily prices for `asset` between `start` and `end` (UTC).
    ///
    /// Same cache policy as the exchange fetcher, keyed by the pair code.
    /// Unlike it, an empty result, remote or cached, is an error.
    pub fn fetch(
        &self,
        asset: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        refresh: bool,
    ) -> Result<PriceSeries, DataError> {
        let pair = Self::pair_code(asset);

        let series = if !refresh && self.cache.exists(&pair) {
            debug!(pair = %pair, "already have cached prices");
            self.cache.read(&pair)?
        } else {
            let request = ChartRequest {
                pair: pair.clone(),
                start: epoch::epoch_seconds(start),
                end: epoch::epoch_seconds(end),
                period: self.period,
            };
            info!(
                pair = %pair,
                source = self.api.name(),
                start = request.start,
                end = request.end,
                "fetching historical prices"
            );
            let series = self.api.fetch_chart(&request)?;
            if !series.is_empty() {
                info!(pair = %pair, rows = series.len(), "fetched historical prices");
                self.cache.write(&series, &pair)?;
            }
            series
        };

        if series.is_empty() {
            warn!(pair = %pair, "no historical prices available");
            return Err(DataError::EmptyResult { pair });
        }

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_code_prefixes_btc() {
        assert_eq!(AltcoinFetcher::pair_code("ETH"), "BTC_ETH");
        assert_eq!(AltcoinFetcher::pair_code("DOGE"), "BTC_DOGE");
    }
}
