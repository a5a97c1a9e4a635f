//! Poloniex charting provider.
//!
//! Fetches candlestick history for a currency pair from the public
//! `returnChartData` endpoint. No authentication, no retries.

use super::provider::{ChartApi, ChartRequest, DataError};
use super::table::PriceSeries;
use crate::epoch;
use serde::Deserialize;

/// Default API root.
pub const POLONIEX_BASE_URL: &str = "https://poloniex.com";

/// Index column of pair series.
pub const PAIR_INDEX: &str = "date";

/// Value columns of pair series, in cache order.
pub const PAIR_COLUMNS: [&str; 7] = [
    "high",
    "low",
    "open",
    "close",
    "volume",
    "quoteVolume",
    "weightedAverage",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candle {
    date: i64,
    high: f64,
    low: f64,
    open: f64,
    close: f64,
    volume: f64,
    quote_volume: f64,
    weighted_average: f64,
}

/// The endpoint answers with either a candle array or an error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChartResponse {
    Candles(Vec<Candle>),
    Error { error: String },
}

/// Poloniex charting provider.
pub struct PoloniexProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PoloniexProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(POLONIEX_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("staar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the chart data URL for a request.
    fn chart_url(base_url: &str, request: &ChartRequest) -> String {
        format!(
            "{}/public?command=returnChartData&currencyPair={}&start={}&end={}&period={}",
            base_url.trim_end_matches('/'),
            request.pair,
            request.start,
            request.end,
            request.period
        )
    }

    /// Parse the chart response into a pair series.
    fn parse_response(pair: &str, resp: ChartResponse) -> Result<PriceSeries, DataError> {
        let candles = match resp {
            ChartResponse::Candles(candles) => candles,
            ChartResponse::Error { error } => {
                return Err(DataError::Provider {
                    provider: "poloniex",
                    message: format!("{pair}: {error}"),
                })
            }
        };

        let names = PAIR_COLUMNS.iter().map(|s| s.to_string()).collect();

        // A window with no trades comes back as one zeroed candle
        if candles.len() == 1 && candles[0].date == 0 {
            return PriceSeries::from_rows(PAIR_INDEX, names, Vec::new());
        }

        let mut rows = Vec::with_capacity(candles.len());
        for candle in candles {
            let date = epoch::date_from_epoch_seconds(candle.date).ok_or_else(|| {
                DataError::ResponseFormat(format!("{pair}: invalid timestamp {}", candle.date))
            })?;
            rows.push((
                date,
                vec![
                    candle.high,
                    candle.low,
                    candle.open,
                    candle.close,
                    candle.volume,
                    candle.quote_volume,
                    candle.weighted_average,
                ],
            ));
        }

        PriceSeries::from_rows(PAIR_INDEX, names, rows)
    }
}

impl ChartApi for PoloniexProvider {
    fn name(&self) -> &str {
        "poloniex"
    }

    fn fetch_chart(&self, request: &ChartRequest) -> Result<PriceSeries, DataError> {
        let url = Self::chart_url(&self.base_url, request);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Http {
                provider: "poloniex",
                status: status.as_u16(),
                message: resp.text().unwrap_or_default(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormat(format!(
                "failed to parse chart data for {}: {e}",
                request.pair
            ))
        })?;

        Self::parse_response(&request.pair, chart)
    }
}
