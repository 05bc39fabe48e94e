//! Output sink for finished report tables.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use polars::prelude::*;
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::{debug, info};

use crate::{aggregate::StoreMetrics, job::ReportId};

/// Errors from a [`ReportSink`].
#[derive(Debug, Snafu)]
pub enum SinkError {
    /// An error occurred while trying to write the data (e.g., file I/O error).
    #[snafu(display("Failed to write report to {}: {source}", path.display()))]
    WriteError {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
        /// Where the failure was captured.
        backtrace: Backtrace,
    },

    /// Converting the metrics rows into the output format failed.
    #[snafu(display("Data conversion error: {source}"))]
    ConversionError {
        /// Underlying polars failure.
        source: PolarsError,
        /// Where the failure was captured.
        backtrace: Backtrace,
    },

    /// The location no longer holds a readable report.
    #[snafu(display("Report output missing at {location}"))]
    OutputMissing {
        /// Location recorded when the report was written.
        location: String,
    },

    /// A generic I/O error while reading a report back.
    #[snafu(display("I/O error reading {location}: {source}"))]
    ReadError {
        /// Location being read.
        location: String,
        /// Underlying I/O failure.
        source: std::io::Error,
        /// Where the failure was captured.
        backtrace: Backtrace,
    },
}

/// Destination for finished report tables.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Persist `rows` for `report_id` and return where they were written.
    async fn write(&self, report_id: &ReportId, rows: &[StoreMetrics]) -> Result<String, SinkError>;

    /// Read back the raw bytes at a location returned by [`ReportSink::write`].
    async fn read(&self, location: &str) -> Result<Vec<u8>, SinkError>;
}

/// Render rows as CSV with a header, columns in [`StoreMetrics::COLUMNS`] order.
pub fn render_csv(rows: &[StoreMetrics]) -> Result<Vec<u8>, SinkError> {
    let mut df = df!(
        StoreMetrics::COLUMNS[0] => rows.iter().map(|r| r.store_id.as_str()).collect::<Vec<_>>(),
        StoreMetrics::COLUMNS[1] => rows.iter().map(|r| r.uptime_last_hour).collect::<Vec<f64>>(),
        StoreMetrics::COLUMNS[2] => rows.iter().map(|r| r.uptime_last_day).collect::<Vec<f64>>(),
        StoreMetrics::COLUMNS[3] => rows.iter().map(|r| r.uptime_last_week).collect::<Vec<f64>>(),
        StoreMetrics::COLUMNS[4] => rows.iter().map(|r| r.downtime_last_hour).collect::<Vec<f64>>(),
        StoreMetrics::COLUMNS[5] => rows.iter().map(|r| r.downtime_last_day).collect::<Vec<f64>>(),
        StoreMetrics::COLUMNS[6] => rows.iter().map(|r| r.downtime_last_week).collect::<Vec<f64>>()
    )
    .context(ConversionSnafu)?;

    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)
        .context(ConversionSnafu)?;
    Ok(buf)
}

/// Writes each report to `<dir>/<report_id>.csv`.
///
/// Files are written under a temporary name and renamed into place, so a reader never
/// sees a partial report.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    dir: PathBuf,
}

impl CsvFileSink {
    /// Sink rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory reports are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ReportSink for CsvFileSink {
    async fn write(&self, report_id: &ReportId, rows: &[StoreMetrics]) -> Result<String, SinkError> {
        let bytes = render_csv(rows)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(WriteSnafu { path: self.dir.clone() })?;
        let final_path = self.dir.join(format!("{report_id}.csv"));
        let tmp_path = self.dir.join(format!(".{report_id}.csv.tmp"));

        tokio::fs::write(&tmp_path, &bytes)
            .await
            .context(WriteSnafu { path: tmp_path.clone() })?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .context(WriteSnafu { path: final_path.clone() })?;

        info!(report_id = %report_id, rows = rows.len(), path = %final_path.display(), "report written");
        Ok(final_path.to_string_lossy().into_owned())
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, SinkError> {
        match tokio::fs::read(location).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(location, "report output missing");
                OutputMissingSnafu { location }.fail()
            }
            Err(e) => Err(e).context(ReadSnafu { location }),
        }
    }
}
