//! CSV cache layer, one file per series.
//!
//! Layout: `{data_dir}/{identifier}.csv`
//!
//! Presence of the file is the only validity signal: no TTL, no checksum, no
//! locking. Writes go to a `.tmp` sibling and are renamed into place.

use super::provider::DataError;
use super::table::PriceSeries;
use chrono::NaiveDate;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// The CSV cache.
#[derive(Debug, Clone)]
pub struct CsvCache {
    data_dir: PathBuf,
}

impl CsvCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the CSV file for a series: `{data_dir}/{identifier}.csv`
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.data_dir.join(format!("{identifier}.csv"))
    }

    /// Create the data directory if it is missing. Idempotent.
    pub fn init(&self) -> Result<(), DataError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| DataError::Cache {
            path: self.data_dir.clone(),
            source,
        })
    }

    /// True iff a cache file exists for `identifier`.
    pub fn exists(&self, identifier: &str) -> bool {
        self.path_for(identifier).is_file()
    }

    /// Load a cached series. A malformed file is an error, not a cache miss.
    pub fn read(&self, identifier: &str) -> Result<PriceSeries, DataError> {
        let path = self.path_for(identifier);
        let file = fs::File::open(&path).map_err(|source| DataError::Cache {
            path: path.clone(),
            source,
        })?;
        PriceSeries::read_csv(BufReader::new(file))
    }

    /// Write a series to the cache, replacing any previous entry.
    pub fn write(&self, series: &PriceSeries, identifier: &str) -> Result<(), DataError> {
        self.init()?;

        let path = self.path_for(identifier);
        let tmp_path = path.with_extension("csv.tmp");

        let file = fs::File::create(&tmp_path).map_err(|source| DataError::Cache {
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(e) = series.write_csv(BufWriter::new(file)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache {
                path: path.clone(),
                source,
            }
        })?;

        info!(identifier, rows = series.len(), path = %path.display(), "save completed");
        Ok(())
    }

    /// List every cached series, sorted by identifier.
    ///
    /// A file that fails to parse is listed with `rows: None` instead of
    /// aborting the listing. A missing data directory is an empty cache.
    pub fn status(&self) -> Result<Vec<CacheEntryStatus>, DataError> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.data_dir).map_err(|source| DataError::Cache {
            path: self.data_dir.clone(),
            source,
        })?;

        let mut statuses = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(identifier) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let parsed = self.read(identifier).ok();
            statuses.push(CacheEntryStatus {
                identifier: identifier.to_string(),
                rows: parsed.as_ref().map(PriceSeries::len),
                first_date: parsed.as_ref().and_then(|s| s.dates().first().copied()),
                last_date: parsed.as_ref().and_then(|s| s.dates().last().copied()),
                size_bytes,
            });
        }

        statuses.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(statuses)
    }
}

/// Cache status for a single series.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntryStatus {
    pub identifier: String,
    /// `None` when the file could not be parsed.
    pub rows: Option<usize>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub size_bytes: u64,
}
