//! CSV Import
//!
//! Loads raw points into an in-memory shard. Expected columns:
//!
//! ```text
//! timestamp,value,key,tags
//! 1500,1.0,cpu,host=a;dc=east
//! 2024-01-01T00:00:02Z,2.5,cpu,host=b
//! ```
//!
//! Timestamps are integer milliseconds or RFC 3339. The tags column is
//! optional.

use crate::aggregation::{Point, Series, Tags};
use crate::cluster::MemorySource;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors that abort an import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of a CSV import
#[derive(Debug)]
pub struct CsvImportResult {
    pub source: MemorySource,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

/// CSV point importer
pub struct CsvImporter {
    has_header: bool,
    delimiter: u8,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    pub fn new() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
        }
    }

    /// Set whether the CSV has a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Import a file as shard `id`
    pub fn import(&self, id: &str, path: &Path) -> Result<CsvImportResult, ImportError> {
        let reader = self.builder().from_path(path)?;
        let result = self.read_records(id, reader);

        tracing::info!(
            shard = id,
            path = %path.display(),
            rows = result.rows_processed,
            failed = result.rows_failed,
            "Imported CSV"
        );

        Ok(result)
    }

    /// Import from any reader as shard `id`
    pub fn import_reader<R: Read>(&self, id: &str, input: R) -> CsvImportResult {
        self.read_records(id, self.builder().from_reader(input))
    }

    fn builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .flexible(true);
        builder
    }

    fn read_records<R: Read>(&self, id: &str, mut reader: csv::Reader<R>) -> CsvImportResult {
        let mut source = MemorySource::new(id);
        let mut rows_processed = 0;
        let mut rows_failed = 0;
        let mut errors = Vec::new();

        for (line_num, record) in reader.records().enumerate() {
            let line = if self.has_header {
                line_num + 2
            } else {
                line_num + 1
            };

            let parsed = record
                .map_err(|e| e.to_string())
                .and_then(|record| parse_record(&record));

            match parsed {
                Ok((series, point)) => {
                    source.insert(series, point);
                    rows_processed += 1;
                }
                Err(e) => {
                    errors.push(format!("Line {}: {}", line, e));
                    rows_failed += 1;
                }
            }
        }

        if rows_failed > 0 {
            tracing::warn!(shard = id, failed = rows_failed, "Skipped malformed CSV rows");
        }

        CsvImportResult {
            source,
            rows_processed,
            rows_failed,
            errors,
        }
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<(Series, Point), String> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing {} column", name))
    };

    let timestamp = parse_timestamp(field(0, "timestamp")?)?;

    let value_str = field(1, "value")?;
    let value: f64 = value_str
        .parse()
        .map_err(|_| format!("invalid value: {}", value_str))?;

    let key = field(2, "key")?;
    let tags = match record.get(3).map(str::trim) {
        Some(s) if !s.is_empty() => parse_tags(s)?,
        _ => Tags::new(),
    };

    Ok((Series::new(key).tags(tags), Point::new(timestamp, value)))
}

/// Integer milliseconds or RFC 3339
pub fn parse_timestamp(s: &str) -> Result<i64, String> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|_| format!("could not parse timestamp: {}", s))
}

/// `k=v;k2=v2`
pub fn parse_tags(s: &str) -> Result<Tags, String> {
    s.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| format!("invalid tag: {}", pair))
        })
        .collect()
}
