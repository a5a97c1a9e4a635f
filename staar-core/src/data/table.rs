//! Date-indexed price table.
//!
//! A `PriceSeries` holds daily observations for one exchange or asset pair:
//! a named calendar-date index plus any number of named `f64` columns of the
//! same length. Missing observations are `NaN` (no fill policy).
//!
//! CSV layout: `<index>,<col1>,<col2>,...` with `%Y-%m-%d` dates, numbers in
//! shortest round-trip form and empty fields for missing values.

use super::provider::DataError;
use crate::epoch;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::{Read, Write};

/// Date format used when writing the index.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A named value column.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Time-indexed table of daily observations.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    index_name: String,
    dates: Vec<NaiveDate>,
    columns: Vec<SeriesColumn>,
}

impl PriceSeries {
    /// An empty table with no rows and no columns.
    pub fn empty(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            dates: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// A table with the given index and no columns yet.
    ///
    /// The index must be strictly increasing.
    pub fn with_index(
        index_name: impl Into<String>,
        dates: Vec<NaiveDate>,
    ) -> Result<Self, DataError> {
        check_increasing(&dates)?;
        Ok(Self {
            index_name: index_name.into(),
            dates,
            columns: Vec::new(),
        })
    }

    /// Build a table from raw provider rows.
    ///
    /// Rows are sorted by date ascending; when a date repeats, the first row
    /// for it wins. Every row must carry one value per column name.
    pub fn from_rows(
        index_name: impl Into<String>,
        column_names: Vec<String>,
        mut rows: Vec<(NaiveDate, Vec<f64>)>,
    ) -> Result<Self, DataError> {
        if let Some((date, values)) = rows.iter().find(|(_, v)| v.len() != column_names.len()) {
            return Err(DataError::LengthMismatch(format!(
                "row {date} has {} values for {} columns",
                values.len(),
                column_names.len()
            )));
        }

        // Stable sort keeps provider order among duplicates
        rows.sort_by_key(|(date, _)| *date);
        let mut seen = HashSet::with_capacity(rows.len());
        rows.retain(|(date, _)| seen.insert(*date));

        let mut columns: Vec<SeriesColumn> = column_names
            .into_iter()
            .map(|name| SeriesColumn {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        let mut dates = Vec::with_capacity(rows.len());

        for (date, values) in rows {
            dates.push(date);
            for (column, value) in columns.iter_mut().zip(values) {
                column.values.push(value);
            }
        }

        Ok(Self {
            index_name: index_name.into(),
            dates,
            columns,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[SeriesColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`column`](Self::column), but a missing column is an error.
    pub fn require_column(&self, name: &str) -> Result<&[f64], DataError> {
        self.column(name).ok_or_else(|| DataError::MissingColumn {
            series: self.index_name.clone(),
            column: name.to_string(),
        })
    }

    /// True when the index is strictly increasing.
    ///
    /// Tables built in memory always are; one read back from CSV may not be.
    pub fn is_sorted(&self) -> bool {
        self.dates.windows(2).all(|w| w[0] < w[1])
    }

    /// `InvalidArgument` unless the index is strictly increasing.
    pub fn ensure_sorted(&self) -> Result<(), DataError> {
        check_increasing(&self.dates)
    }

    /// Value of `column` on `date`, if both exist.
    ///
    /// On an unsorted index this scans, returning the first row for `date`.
    pub fn value(&self, column: &str, date: NaiveDate) -> Option<f64> {
        let row = if self.is_sorted() {
            self.dates.binary_search(&date).ok()?
        } else {
            self.dates.iter().position(|d| *d == date)?
        };
        self.column(column).map(|values| values[row])
    }

    /// Append a column, or replace the values of an existing one in place.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), DataError> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(DataError::LengthMismatch(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.dates.len()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(SeriesColumn { name, values }),
        }
        Ok(())
    }

    /// Rename a column. Returns false if `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.columns.iter_mut().find(|c| c.name == from) {
            Some(column) => {
                column.name = to.into();
                true
            }
            None => false,
        }
    }

    /// A new table with only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<PriceSeries, DataError> {
        let columns = names
            .iter()
            .map(|name| {
                self.require_column(name).map(|values| SeriesColumn {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PriceSeries {
            index_name: self.index_name.clone(),
            dates: self.dates.clone(),
            columns,
        })
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.dates.len().saturating_sub(n);
        PriceSeries {
            index_name: self.index_name.clone(),
            dates: self.dates[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| SeriesColumn {
                    name: c.name.clone(),
                    values: c.values[start..].to_vec(),
                })
                .collect(),
        }
    }

    /// Serialize as CSV, index first.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.index_name.as_str());
        header.extend(self.columns.iter().map(|c| c.name.as_str()));
        wtr.write_record(&header)?;

        for (row, date) in self.dates.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            record.extend(self.columns.iter().map(|c| format_value(c.values[row])));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Parse a CSV table, treating the first column as the date index.
    ///
    /// Rows are taken verbatim: no sorting, no de-duplication.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut fields = headers.iter();
        let index_name = fields
            .next()
            .filter(|name| !name.is_empty() || headers.len() > 1)
            .ok_or_else(|| DataError::Parse("CSV has no header row".into()))?
            .to_string();

        let mut columns: Vec<SeriesColumn> = fields
            .map(|name| SeriesColumn {
                name: name.to_string(),
                values: Vec::new(),
            })
            .collect();
        let mut dates = Vec::new();

        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = i + 2;
            let raw_date = record.get(0).unwrap_or("");
            let date = parse_date(raw_date)
                .map_err(|e| DataError::Parse(format!("line {line}: {e}")))?;
            dates.push(date);

            for (j, column) in columns.iter_mut().enumerate() {
                let raw = record.get(j + 1).unwrap_or("");
                let value = parse_value(raw).ok_or_else(|| {
                    DataError::Parse(format!(
                        "line {line}: invalid number '{raw}' in column '{}'",
                        column.name
                    ))
                })?;
                column.values.push(value);
            }
        }

        Ok(Self {
            index_name,
            dates,
            columns,
        })
    }

    /// Convert to a Polars DataFrame for downstream plotting and analysis.
    ///
    /// The index becomes a `Date` column; `NaN` values become nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let days: Vec<i32> = self.dates.iter().map(|d| epoch::date_epoch_days(*d)).collect();

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Column::new(self.index_name.as_str().into(), days).cast(&DataType::Date)?);
        for column in &self.columns {
            let values: Vec<Option<f64>> = column
                .values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect();
            columns.push(Column::new(column.name.as_str().into(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Parse an ISO date, accepting a trailing `HH:MM:SS` time component.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DataError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| DataError::Parse(format!("invalid date '{raw}'")))
}

fn check_increasing(dates: &[NaiveDate]) -> Result<(), DataError> {
    match dates.windows(2).find(|w| w[0] >= w[1]) {
        Some(pair) => Err(DataError::InvalidArgument(format!(
            "index is not strictly increasing at {} -> {}",
            pair[0], pair[1]
        ))),
        None => Ok(()),
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> PriceSeries {
        PriceSeries::from_rows(
            "Date",
            names(&["Close", "Volume (BTC)"]),
            vec![
                (date("2017-01-01"), vec![998.5, 120.25]),
                (date("2017-01-02"), vec![1014.0, f64::NAN]),
                (date("2017-01-03"), vec![1030.75, 98.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_rows_sorts_and_keeps_first_duplicate() {
        let series = PriceSeries::from_rows(
            "Date",
            names(&["Close"]),
            vec![
                (date("2017-01-03"), vec![3.0]),
                (date("2017-01-01"), vec![1.0]),
                (date("2017-01-03"), vec![99.0]),
                (date("2017-01-02"), vec![2.0]),
            ],
        )
        .unwrap();

        assert_eq!(
            series.dates(),
            &[date("2017-01-01"), date("2017-01-02"), date("2017-01-03")]
        );
        assert_eq!(series.column("Close").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let result = PriceSeries::from_rows(
            "Date",
            names(&["Open", "Close"]),
            vec![(date("2017-01-01"), vec![1.0])],
        );
        assert!(matches!(result, Err(DataError::LengthMismatch(_))));
    }

    #[test]
    fn with_index_requires_increasing_dates() {
        let result = PriceSeries::with_index("Date", vec![date("2017-01-02"), date("2017-01-01")]);
        assert!(result.is_err());
        let ok = PriceSeries::with_index("Date", vec![date("2017-01-01"), date("2017-01-02")]);
        assert_eq!(ok.unwrap().len(), 2);
    }

    #[test]
    fn csv_roundtrip_preserves_values_and_gaps() {
        let series = sample();
        let mut buf = Vec::new();
        series.write_csv(&mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("Date,Close,Volume (BTC)\n"));
        assert!(text.contains("2017-01-02,1014,\n"));

        let loaded = PriceSeries::read_csv(buf.as_slice()).unwrap();
        assert_eq!(loaded.index_name(), "Date");
        assert_eq!(loaded.dates(), series.dates());
        assert_eq!(loaded.column("Close"), series.column("Close"));
        let volume = loaded.column("Volume (BTC)").unwrap();
        assert_eq!(volume[0], 120.25);
        assert!(volume[1].is_nan());
        assert_eq!(volume[2], 98.0);
    }

    #[test]
    fn read_accepts_datetime_index() {
        let csv = "Date,Close\n2017-01-01 00:00:00,5.5\n";
        let loaded = PriceSeries::read_csv(csv.as_bytes()).unwrap();
        assert_eq!(loaded.dates(), &[date("2017-01-01")]);
        assert_eq!(loaded.column("Close").unwrap(), &[5.5]);
    }

    #[test]
    fn read_rejects_malformed_values() {
        let csv = "Date,Close\n2017-01-01,abc\n";
        let err = PriceSeries::read_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid number 'abc'"));

        let csv = "Date,Close\nyesterday,1.0\n";
        assert!(PriceSeries::read_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn read_rejects_empty_input() {
        assert!(PriceSeries::read_csv("".as_bytes()).is_err());
    }

    #[test]
    fn header_only_csv_is_empty_series_with_columns() {
        let loaded = PriceSeries::read_csv("date,close\n".as_bytes()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.column_names(), vec!["close"]);
    }

    #[test]
    fn push_column_checks_length_and_replaces() {
        let mut series = sample();
        assert!(series.push_column("Mean", vec![1.0]).is_err());

        series.push_column("Mean", vec![1.0, 2.0, 3.0]).unwrap();
        series.push_column("Mean", vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(series.column_names(), vec!["Close", "Volume (BTC)", "Mean"]);
        assert_eq!(series.column("Mean").unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn select_and_tail() {
        let series = sample();
        let closes = series.select(&["Close"]).unwrap();
        assert_eq!(closes.column_names(), vec!["Close"]);
        assert!(series.select(&["Weighted Price"]).is_err());

        let tail = series.tail(2);
        assert_eq!(tail.dates(), &series.dates()[1..]);
        assert_eq!(tail.column("Close").unwrap(), &[1014.0, 1030.75]);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn value_lookup_by_date() {
        let series = sample();
        assert_eq!(series.value("Close", date("2017-01-02")), Some(1014.0));
        assert_eq!(series.value("Close", date("2017-02-01")), None);
        assert_eq!(series.value("Open", date("2017-01-02")), None);
    }

    #[test]
    fn unsorted_csv_is_detected_and_still_searchable() {
        let csv = "Date,Close\n2017-01-03,3\n2017-01-01,1\n2017-01-01,9\n";
        let series = PriceSeries::read_csv(csv.as_bytes()).unwrap();

        assert!(!series.is_sorted());
        assert!(matches!(
            series.ensure_sorted(),
            Err(DataError::InvalidArgument(_))
        ));
        assert_eq!(series.value("Close", date("2017-01-03")), Some(3.0));
        assert_eq!(series.value("Close", date("2017-01-01")), Some(1.0));
        assert_eq!(series.value("Close", date("2017-01-02")), None);

        assert!(sample().is_sorted());
        assert!(sample().ensure_sorted().is_ok());
    }

    #[test]
    fn dataframe_has_date_column_and_nulls() {
        let df = sample().to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("Date").unwrap().dtype(), &DataType::Date);

        let volume = df.column("Volume (BTC)").unwrap().f64().unwrap();
        assert_eq!(volume.get(0), Some(120.25));
        assert_eq!(volume.get(1), None);
    }
}
