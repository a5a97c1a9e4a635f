//! Cross-source column merge and aggregation.
//!
//! Given the same column from several series, align them on the union of
//! their dates. A source with no row for a date contributes `NaN` there;
//! rows are never dropped.

use super::provider::DataError;
use super::table::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Name of the cross-source price mean column.
pub const MEAN_COLUMN: &str = "Mean";

/// Name of the cross-source volume mean column.
pub const VOLUME_COLUMN: &str = "Volume";

/// How a row mean treats missing (`NaN`) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeanPolicy {
    /// Any missing value makes the row mean missing.
    #[default]
    Propagate,
    /// Average the values present; missing only when none are.
    Skip,
}

/// Merge `column_name` from each series into one table, one column per
/// identifier, aligned on the union of all dates.
pub fn merge_column<S: AsRef<str>>(
    identifiers: &[S],
    series_list: &[PriceSeries],
    column_name: &str,
) -> Result<PriceSeries, DataError> {
    if identifiers.len() != series_list.len() {
        return Err(DataError::LengthMismatch(format!(
            "{} identifiers for {} series",
            identifiers.len(),
            series_list.len()
        )));
    }

    let mut all_dates = BTreeSet::new();
    for series in series_list {
        all_dates.extend(series.dates().iter().copied());
    }
    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    let index_name = series_list
        .first()
        .map(|s| s.index_name().to_string())
        .unwrap_or_else(|| "Date".to_string());
    let mut merged = PriceSeries::with_index(index_name, dates)?;

    for (identifier, series) in identifiers.iter().zip(series_list) {
        let identifier = identifier.as_ref();
        let values = series
            .column(column_name)
            .ok_or_else(|| DataError::MissingColumn {
                series: identifier.to_string(),
                column: column_name.to_string(),
            })?;

        // Cached series are not re-validated; first row for a date wins
        let mut by_date: HashMap<NaiveDate, f64> = HashMap::with_capacity(values.len());
        for (date, value) in series.dates().iter().zip(values) {
            by_date.entry(*date).or_insert(*value);
        }

        let aligned = merged
            .dates()
            .iter()
            .map(|date| by_date.get(date).copied().unwrap_or(f64::NAN))
            .collect();
        merged.push_column(identifier, aligned)?;
    }

    Ok(merged)
}

/// Row-wise arithmetic mean across every column of `table`.
pub fn row_mean(table: &PriceSeries, policy: MeanPolicy) -> Vec<f64> {
    (0..table.len())
        .map(|row| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for column in table.columns() {
                let value = column.values[row];
                if value.is_nan() {
                    match policy {
                        MeanPolicy::Propagate => return f64::NAN,
                        MeanPolicy::Skip => continue,
                    }
                }
                sum += value;
                count += 1;
            }
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Per-source prices plus cross-source `Mean` and `Volume` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    sources: Vec<String>,
    table: PriceSeries,
}

impl AggregateTable {
    /// Source identifiers, in column order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// The full table: one column per source, then `Mean`, then `Volume`.
    pub fn table(&self) -> &PriceSeries {
        &self.table
    }

    pub fn into_table(self) -> PriceSeries {
        self.table
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.table.dates()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Cross-source price mean.
    pub fn mean(&self) -> &[f64] {
        self.table.column(MEAN_COLUMN).unwrap_or(&[])
    }

    /// Cross-source volume mean.
    pub fn volume(&self) -> &[f64] {
        self.table.column(VOLUME_COLUMN).unwrap_or(&[])
    }
}

/// Merge `price_column` and `volume_column` across sources and append their
/// row means as `Mean` and `Volume`.
pub fn build_aggregate<S: AsRef<str>>(
    identifiers: &[S],
    series_list: &[PriceSeries],
    price_column: &str,
    volume_column: &str,
    policy: MeanPolicy,
) -> Result<AggregateTable, DataError> {
    let mut prices = merge_column(identifiers, series_list, price_column)?;
    let volumes = merge_column(identifiers, series_list, volume_column)?;

    // Both merges run over the same date union, so rows line up
    let mean = row_mean(&prices, policy);
    let volume = row_mean(&volumes, policy);
    prices.push_column(MEAN_COLUMN, mean)?;
    prices.push_column(VOLUME_COLUMN, volume)?;

    Ok(AggregateTable {
        sources: identifiers.iter().map(|s| s.as_ref().to_string()).collect(),
        table: prices,
    })
}
