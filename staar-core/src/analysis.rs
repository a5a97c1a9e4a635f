//! Search-trend analysis over the BTC aggregate.
//!
//! Daily prices are averaged into weeks ending on Sunday, the labels a
//! trends export uses, and inner-joined with the weekly interest series.

use crate::data::merge::{AggregateTable, MEAN_COLUMN, VOLUME_COLUMN};
use crate::data::provider::DataError;
use crate::data::table::{parse_date, PriceSeries};
use chrono::{Datelike, Days, NaiveDate};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Name of the search-interest column.
pub const TREND_COLUMN: &str = "Trend";

/// Load a weekly search-interest export.
///
/// The first column is the date. The value column is `Trend` when present,
/// otherwise the first remaining column; anything else (such as a partial
/// week flag) is ignored. A `<1` reading counts as zero.
pub fn load_trend_csv(path: &Path) -> Result<PriceSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(std::fs::File::open(path)?);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataError::MissingColumn {
            series: path.display().to_string(),
            column: TREND_COLUMN.to_string(),
        });
    }
    let index_name = headers.get(0).unwrap_or("Date").to_string();
    let value_index = headers
        .iter()
        .position(|h| h == TREND_COLUMN)
        .unwrap_or(1);

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let date = parse_date(record.get(0).unwrap_or(""))
            .map_err(|e| DataError::Parse(format!("line {line}: {e}")))?;
        let raw = record.get(value_index).unwrap_or("").trim();
        let value = match raw {
            "" => f64::NAN,
            "<1" => 0.0,
            _ => raw.parse::<f64>().map_err(|_| {
                DataError::Parse(format!("line {line}: invalid trend value '{raw}'"))
            })?,
        };
        rows.push((date, vec![value]));
    }

    let series = PriceSeries::from_rows(index_name, vec![TREND_COLUMN.to_string()], rows)?;
    info!(path = %path.display(), rows = series.len(), "loaded search trend");
    Ok(series)
}

/// The Sunday closing the week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let offset = 6 - date.weekday().num_days_from_monday();
    date + Days::new(u64::from(offset))
}

/// Weekly mean of every column, one row per week from the first to the last
/// week covered. `NaN` values are skipped; a week with none is `NaN`.
///
/// The index must be strictly increasing; a table read back from an
/// unsorted CSV is rejected with `InvalidArgument`.
pub fn resample_weekly(series: &PriceSeries) -> Result<PriceSeries, DataError> {
    series.ensure_sorted()?;
    let (Some(first), Some(last)) = (series.dates().first(), series.dates().last()) else {
        let mut empty = PriceSeries::empty(series.index_name());
        for name in series.column_names() {
            empty.push_column(name, Vec::new())?;
        }
        return Ok(empty);
    };

    let first_week = week_ending(*first);
    let last_week = week_ending(*last);
    let mut weeks = Vec::new();
    let mut week = first_week;
    while week <= last_week {
        weeks.push(week);
        week = week + Days::new(7);
    }

    let bucket_of: Vec<usize> = series
        .dates()
        .iter()
        .map(|d| ((week_ending(*d) - first_week).num_days() / 7) as usize)
        .collect();

    let mut weekly = PriceSeries::with_index(series.index_name(), weeks)?;
    for column in series.columns() {
        let mut sums = vec![0.0; weekly.len()];
        let mut counts = vec![0usize; weekly.len()];
        for (value, bucket) in column.values.iter().zip(&bucket_of) {
            if !value.is_nan() {
                sums[*bucket] += value;
                counts[*bucket] += 1;
            }
        }
        let means = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, n)| if n == 0 { f64::NAN } else { sum / n as f64 })
            .collect();
        weekly.push_column(column.name.as_str(), means)?;
    }
    Ok(weekly)
}

/// Rows whose date is in both tables, with the columns of `left` then
/// `right`. Both indexes must be sorted.
pub fn inner_join(left: &PriceSeries, right: &PriceSeries) -> Result<PriceSeries, DataError> {
    let right_rows: HashMap<NaiveDate, usize> = right
        .dates()
        .iter()
        .enumerate()
        .map(|(row, date)| (*date, row))
        .collect();

    let mut pairs = Vec::new();
    for (row, date) in left.dates().iter().enumerate() {
        if let Some(other) = right_rows.get(date) {
            pairs.push((row, *other));
        }
    }

    let dates = pairs.iter().map(|(row, _)| left.dates()[*row]).collect();
    let mut joined = PriceSeries::with_index(left.index_name(), dates)?;
    for column in left.columns() {
        let values = pairs.iter().map(|(row, _)| column.values[*row]).collect();
        joined.push_column(column.name.as_str(), values)?;
    }
    for column in right.columns() {
        if left.column(&column.name).is_some() {
            return Err(DataError::InvalidArgument(format!(
                "column '{}' present on both sides of join",
                column.name
            )));
        }
        let values = pairs.iter().map(|(_, row)| column.values[*row]).collect();
        joined.push_column(column.name.as_str(), values)?;
    }
    Ok(joined)
}

/// Trailing mean over `window` rows for every column.
///
/// The first `window - 1` rows are `NaN`, as is any window holding a `NaN`.
pub fn rolling_mean(series: &PriceSeries, window: usize) -> Result<PriceSeries, DataError> {
    if window == 0 {
        return Err(DataError::InvalidArgument(
            "rolling window must be at least 1".into(),
        ));
    }

    let mut smoothed = PriceSeries::with_index(series.index_name(), series.dates().to_vec())?;
    for column in series.columns() {
        let values = (0..column.values.len())
            .map(|row| {
                if row + 1 < window {
                    return f64::NAN;
                }
                let slice = &column.values[row + 1 - window..=row];
                slice.iter().sum::<f64>() / window as f64
            })
            .collect();
        smoothed.push_column(column.name.as_str(), values)?;
    }
    Ok(smoothed)
}

/// Pearson correlation over the rows where both values are present.
///
/// A row with `NaN` on either side is dropped rather than poisoning the
/// result, so leading empty weeks do not hide the correlation. `NaN` with
/// fewer than two complete rows or when either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Weekly BTC price and volume against search interest.
#[derive(Debug, Clone)]
pub struct TrendStudy {
    /// `Trend`, `Mean` and `Volume` on the weeks both sides cover.
    pub weekly: PriceSeries,
    /// `weekly` after a trailing rolling mean.
    pub smoothed: PriceSeries,
    /// Trend against mean price, over the unsmoothed weeks.
    pub price_correlation: f64,
    /// Trend against mean volume, over the unsmoothed weeks.
    pub volume_correlation: f64,
}

impl TrendStudy {
    pub fn build(
        aggregate: &AggregateTable,
        trend: &PriceSeries,
        smoothing_window: usize,
    ) -> Result<Self, DataError> {
        let prices = aggregate.table().select(&[MEAN_COLUMN, VOLUME_COLUMN])?;
        let weekly_prices = resample_weekly(&prices)?;
        let trend = trend.select(&[TREND_COLUMN])?;

        let weekly = inner_join(&trend, &weekly_prices)?;
        if weekly.is_empty() {
            warn!("search trend and price history share no weeks");
        }
        let smoothed = rolling_mean(&weekly, smoothing_window)?;

        let trend_values = weekly.require_column(TREND_COLUMN)?;
        let price_correlation = pearson(trend_values, weekly.require_column(MEAN_COLUMN)?);
        let volume_correlation = pearson(trend_values, weekly.require_column(VOLUME_COLUMN)?);

        info!(
            weeks = weekly.len(),
            price_correlation, volume_correlation, "built trend study"
        );
        Ok(Self {
            weekly,
            smoothed,
            price_correlation,
            volume_correlation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::CsvCache;
    use crate::data::merge::{build_aggregate, MeanPolicy};
    use std::io::Write;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn single(name: &str, rows: &[(&str, f64)]) -> PriceSeries {
        PriceSeries::from_rows(
            "Date",
            vec![name.to_string()],
            rows.iter().map(|(d, v)| (date(d), vec![*v])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn week_ending_is_following_sunday() {
        // 2024-01-01 is a Monday
        assert_eq!(week_ending(date("2024-01-01")), date("2024-01-07"));
        assert_eq!(week_ending(date("2024-01-06")), date("2024-01-07"));
        assert_eq!(week_ending(date("2024-01-07")), date("2024-01-07"));
        assert_eq!(week_ending(date("2024-01-08")), date("2024-01-14"));
    }

    #[test]
    fn resample_averages_each_week() {
        let daily = single(
            "Mean",
            &[
                ("2024-01-01", 1.0),
                ("2024-01-02", 3.0),
                ("2024-01-07", f64::NAN),
                ("2024-01-08", 10.0),
            ],
        );
        let weekly = resample_weekly(&daily).unwrap();
        assert_eq!(weekly.dates(), &[date("2024-01-07"), date("2024-01-14")]);
        assert_eq!(weekly.column("Mean").unwrap(), &[2.0, 10.0]);
    }

    #[test]
    fn resample_keeps_empty_weeks_as_nan() {
        let daily = single("Mean", &[("2024-01-01", 1.0), ("2024-01-15", 5.0)]);
        let weekly = resample_weekly(&daily).unwrap();
        assert_eq!(weekly.len(), 3);
        assert!(weekly.column("Mean").unwrap()[1].is_nan());
        assert_eq!(weekly.column("Mean").unwrap()[2], 5.0);
    }

    #[test]
    fn resample_of_empty_keeps_columns() {
        let mut empty = PriceSeries::empty("Date");
        empty.push_column("Mean", Vec::new()).unwrap();
        let weekly = resample_weekly(&empty).unwrap();
        assert!(weekly.is_empty());
        assert_eq!(weekly.column_names(), vec!["Mean"]);
    }

    #[test]
    fn resample_rejects_unsorted_cached_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reversed.csv"),
            "Date,Mean\n2024-01-15,1\n2024-01-01,2\n",
        )
        .unwrap();
        let cached = CsvCache::new(dir.path()).read("reversed").unwrap();

        assert!(matches!(
            resample_weekly(&cached),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn inner_join_keeps_common_dates() {
        let left = single("Trend", &[("2024-01-07", 10.0), ("2024-01-14", 20.0)]);
        let right = single("Mean", &[("2024-01-14", 200.0), ("2024-01-21", 300.0)]);
        let joined = inner_join(&left, &right).unwrap();
        assert_eq!(joined.dates(), &[date("2024-01-14")]);
        assert_eq!(joined.column_names(), vec!["Trend", "Mean"]);
        assert_eq!(joined.column("Trend").unwrap(), &[20.0]);
        assert_eq!(joined.column("Mean").unwrap(), &[200.0]);
    }

    #[test]
    fn inner_join_rejects_duplicate_columns() {
        let left = single("Mean", &[("2024-01-07", 1.0)]);
        let right = single("Mean", &[("2024-01-07", 2.0)]);
        assert!(inner_join(&left, &right).is_err());
    }

    #[test]
    fn rolling_mean_warms_up() {
        let series = single(
            "Trend",
            &[
                ("2024-01-07", 1.0),
                ("2024-01-14", 2.0),
                ("2024-01-21", 3.0),
                ("2024-01-28", f64::NAN),
                ("2024-02-04", 5.0),
            ],
        );
        let smoothed = rolling_mean(&series, 2).unwrap();
        let values = smoothed.column("Trend").unwrap();
        assert!(values[0].is_nan());
        assert_eq!(values[1], 1.5);
        assert_eq!(values[2], 2.5);
        assert!(values[3].is_nan());
        assert!(values[4].is_nan());
    }

    #[test]
    fn rolling_mean_rejects_zero_window() {
        let series = single("Trend", &[("2024-01-07", 1.0)]);
        assert!(matches!(
            rolling_mean(&series, 0),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let x = [1.0, f64::NAN, 3.0, 4.0];
        let y = [2.0, 100.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_undefined_cases() {
        assert!(pearson(&[1.0], &[1.0]).is_nan());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[], &[]).is_nan());
    }

    #[test]
    fn load_trend_csv_picks_trend_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Trend,IsPartial").unwrap();
        writeln!(file, "2024-01-14,40,False").unwrap();
        writeln!(file, "2024-01-07,<1,False").unwrap();
        writeln!(file, "2024-01-21,55,True").unwrap();

        let trend = load_trend_csv(file.path()).unwrap();
        assert_eq!(trend.column_names(), vec!["Trend"]);
        assert_eq!(trend.dates()[0], date("2024-01-07"));
        assert_eq!(trend.column("Trend").unwrap(), &[0.0, 40.0, 55.0]);
    }

    #[test]
    fn load_trend_csv_falls_back_to_first_value_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Week,bitcoin").unwrap();
        writeln!(file, "2024-01-07,12").unwrap();

        let trend = load_trend_csv(file.path()).unwrap();
        assert_eq!(trend.index_name(), "Week");
        assert_eq!(trend.column("Trend").unwrap(), &[12.0]);
    }

    #[test]
    fn load_trend_csv_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Trend").unwrap();
        writeln!(file, "2024-01-07,lots").unwrap();
        assert!(matches!(
            load_trend_csv(file.path()),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn study_joins_weekly_prices_with_trend() {
        let mut exchange_rows = Vec::new();
        let start = date("2024-01-01");
        for day in 0..21u64 {
            let d = start + Days::new(day);
            let week = (day / 7) as f64;
            exchange_rows.push((d, vec![100.0 + 10.0 * week, 5.0 + week]));
        }
        let kraken = PriceSeries::from_rows(
            "Date",
            vec!["Weighted Price".into(), "Volume (BTC)".into()],
            exchange_rows,
        )
        .unwrap();
        let aggregate = build_aggregate(
            &["KRAKEN"],
            &[kraken],
            "Weighted Price",
            "Volume (BTC)",
            MeanPolicy::Propagate,
        )
        .unwrap();

        let trend = single(
            "Trend",
            &[
                ("2023-12-31", 1.0),
                ("2024-01-07", 10.0),
                ("2024-01-14", 20.0),
                ("2024-01-21", 30.0),
            ],
        );

        let study = TrendStudy::build(&aggregate, &trend, 2).unwrap();
        assert_eq!(study.weekly.len(), 3);
        assert_eq!(study.weekly.column_names(), vec!["Trend", "Mean", "Volume"]);
        assert_eq!(study.weekly.column("Mean").unwrap(), &[100.0, 110.0, 120.0]);
        assert!((study.price_correlation - 1.0).abs() < 1e-12);
        assert!((study.volume_correlation - 1.0).abs() < 1e-12);
        assert!(study.smoothed.column("Trend").unwrap()[0].is_nan());
        assert_eq!(study.smoothed.column("Trend").unwrap()[1], 15.0);
    }
}
