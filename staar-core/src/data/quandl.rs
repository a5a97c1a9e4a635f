//! Quandl dataset provider.
//!
//! Fetches daily BTC/USD history from the BCHARTS database
//! (`BCHARTS/<EXCHANGE>USD`). Requests are authenticated with a static API
//! key passed as a query parameter. No retries.

use super::provider::{DataError, PriceApi};
use super::table::{parse_date, PriceSeries};
use serde::Deserialize;

/// Default API root.
pub const QUANDL_BASE_URL: &str = "https://www.quandl.com/api/v3";

/// Dataset endpoint response.
#[derive(Debug, Deserialize)]
struct DatasetResponse {
    dataset: Dataset,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    column_names: Vec<String>,
    data: Vec<Vec<serde_json::Value>>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    quandl_error: QuandlError,
}

#[derive(Debug, Deserialize)]
struct QuandlError {
    code: String,
    message: String,
}

/// Quandl dataset provider.
pub struct QuandlProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl QuandlProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        Self::with_base_url(QUANDL_BASE_URL, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("staar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Dataset URL without query parameters: `{base}/datasets/{symbol}.json`
    fn dataset_url(base_url: &str, symbol: &str) -> String {
        format!("{}/datasets/{symbol}.json", base_url.trim_end_matches('/'))
    }

    /// Parse a dataset response into a series.
    ///
    /// The first column is the date; the rest keep the provider's names
    /// (`Open`, `High`, `Low`, `Close`, `Volume (BTC)`, `Volume (Currency)`,
    /// `Weighted Price`). Nulls become `NaN`.
    fn parse_dataset(symbol: &str, resp: DatasetResponse) -> Result<PriceSeries, DataError> {
        let mut names = resp.dataset.column_names.into_iter();
        let index_name = names.next().ok_or_else(|| {
            DataError::ResponseFormat(format!("dataset {symbol} has no columns"))
        })?;
        let names: Vec<String> = names.collect();

        let mut rows = Vec::with_capacity(resp.dataset.data.len());
        for (i, row) in resp.dataset.data.into_iter().enumerate() {
            let mut cells = row.into_iter();
            let raw_date = cells
                .next()
                .and_then(|v| v.as_str().map(str::to_owned))
                .ok_or_else(|| {
                    DataError::ResponseFormat(format!("dataset {symbol}: row {i} has no date"))
                })?;
            let date = parse_date(&raw_date)?;

            let mut values: Vec<f64> = cells.map(|v| v.as_f64().unwrap_or(f64::NAN)).collect();
            values.resize(names.len(), f64::NAN);
            rows.push((date, values));
        }

        PriceSeries::from_rows(index_name, names, rows)
    }
}

impl PriceApi for QuandlProvider {
    fn name(&self) -> &str {
        "quandl"
    }

    fn fetch_dataset(&self, symbol: &str) -> Result<PriceSeries, DataError> {
        let url = Self::dataset_url(&self.base_url, symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("order", "asc")])
            .send()
            // the URL carries the API key
            .map_err(|e| DataError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.quandl_error.code, e.quandl_error.message))
                .unwrap_or(body);
            return Err(DataError::Http {
                provider: "quandl",
                status: status.as_u16(),
                message,
            });
        }

        let dataset: DatasetResponse = resp.json().map_err(|e| {
            DataError::ResponseFormat(format!("failed to parse dataset {symbol}: {}", e.without_url()))
        })?;

        Self::parse_dataset(symbol, dataset)
    }
}
