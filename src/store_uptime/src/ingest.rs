//! Bulk-load the raw CSV exports into the SQLite input tables.
//!
//! Three files feed a deployment:
//! - store polls: `store_id,timestamp_utc,status`
//! - business hours: `store_id,dayOfWeek,start_time_local,end_time_local`
//!   (`day_of_week` is accepted as well)
//! - timezones: `store_id,timezone_str`
//!
//! Every column is read as text and stored unchanged, except the weekday which must be
//! an integer. Validation of timestamps and statuses happens when the report input is
//! loaded. All three files land in a single transaction; a bad file leaves the
//! database untouched.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use diesel::prelude::*;
use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use shared_utils::env::get_env_var_opt;
use tracing::{info, warn};

use crate::{
    db::connection::connect_sqlite,
    models::{NewBusinessHours, NewStoreStatus, TimezoneRow},
    schema::{business_hours, store_status, timezones},
};

/// Rows per INSERT statement.
const CHUNK: usize = 500;

/// CSV files to load; a `None` entry is skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestPaths {
    /// Poll export.
    pub store_status: Option<PathBuf>,
    /// Business-hours export.
    pub business_hours: Option<PathBuf>,
    /// Timezone export.
    pub timezones: Option<PathBuf>,
}

impl IngestPaths {
    /// Paths from `STORE_DATA_CSV`, `BUSINESS_HOURS_CSV` and `TIMEZONES_CSV`.
    pub fn from_env() -> Self {
        Self {
            store_status: get_env_var_opt("STORE_DATA_CSV").map(PathBuf::from),
            business_hours: get_env_var_opt("BUSINESS_HOURS_CSV").map(PathBuf::from),
            timezones: get_env_var_opt("TIMEZONES_CSV").map(PathBuf::from),
        }
    }
}

/// Rows inserted per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Rows added to `store_status`.
    pub polls: usize,
    /// Rows added to `business_hours`.
    pub business_hours: usize,
    /// Rows added to `timezones` (duplicates of an existing store are ignored).
    pub timezones: usize,
}

/// Raw text rows parsed from the three exports.
#[derive(Debug, Default)]
struct Batch {
    polls: Vec<[String; 3]>,
    hours: Vec<(String, i32, String, String)>,
    zones: Vec<TimezoneRow>,
}

/// Read the CSVs in `paths` and append them to the database at `database_url`.
pub fn ingest_csv(database_url: &str, paths: &IngestPaths) -> anyhow::Result<IngestSummary> {
    let mut batch = Batch::default();

    match &paths.store_status {
        Some(p) => {
            let df = read_csv(p)?;
            let ids = text_column(&df, p, &["store_id"])?;
            let ts = text_column(&df, p, &["timestamp_utc"])?;
            let status = text_column(&df, p, &["status"])?;
            batch.polls = ids
                .into_iter()
                .zip(ts)
                .zip(status)
                .map(|((id, ts), st)| [id, ts, st])
                .collect();
        }
        None => warn!("no store status CSV configured; skipping"),
    }

    match &paths.business_hours {
        Some(p) => {
            let df = read_csv(p)?;
            let ids = text_column(&df, p, &["store_id"])?;
            let days = text_column(&df, p, &["dayOfWeek", "day_of_week"])?;
            let opens = text_column(&df, p, &["start_time_local"])?;
            let closes = text_column(&df, p, &["end_time_local"])?;
            batch.hours = ids
                .into_iter()
                .zip(days)
                .zip(opens.into_iter().zip(closes))
                .enumerate()
                .map(|(i, ((id, day), (open, close)))| {
                    let day = day.trim().parse::<i32>().with_context(|| {
                        format!("{}: row {}: bad day of week {day:?}", p.display(), i + 1)
                    })?;
                    Ok((id, day, open, close))
                })
                .collect::<anyhow::Result<_>>()?;
        }
        None => warn!("no business hours CSV configured; skipping"),
    }

    match &paths.timezones {
        Some(p) => {
            let df = read_csv(p)?;
            let ids = text_column(&df, p, &["store_id"])?;
            let zones = text_column(&df, p, &["timezone_str"])?;
            batch.zones = ids
                .into_iter()
                .zip(zones)
                .map(|(store_id, timezone_str)| TimezoneRow {
                    store_id,
                    timezone_str,
                })
                .collect();
        }
        None => warn!("no timezones CSV configured; skipping"),
    }

    let mut conn = connect_sqlite(database_url)?;
    let summary = conn
        .immediate_transaction::<_, diesel::result::Error, _>(|conn| insert_batch(conn, &batch))
        .context("inserting CSV rows")?;
    info!(
        polls = summary.polls,
        business_hours = summary.business_hours,
        timezones = summary.timezones,
        "CSV ingest complete"
    );
    Ok(summary)
}

fn insert_batch(conn: &mut SqliteConnection, batch: &Batch) -> QueryResult<IngestSummary> {
    let mut summary = IngestSummary::default();

    for chunk in batch.polls.chunks(CHUNK) {
        let rows: Vec<NewStoreStatus<'_>> = chunk
            .iter()
            .map(|[id, ts, st]| NewStoreStatus {
                store_id: id,
                timestamp_utc: ts,
                status: st,
            })
            .collect();
        summary.polls += diesel::insert_into(store_status::table)
            .values(&rows)
            .execute(conn)?;
    }

    for chunk in batch.hours.chunks(CHUNK) {
        let rows: Vec<NewBusinessHours<'_>> = chunk
            .iter()
            .map(|(id, day, open, close)| NewBusinessHours {
                store_id: id,
                day_of_week: *day,
                start_time_local: open,
                end_time_local: close,
            })
            .collect();
        summary.business_hours += diesel::insert_into(business_hours::table)
            .values(&rows)
            .execute(conn)?;
    }

    // One zone per store; the first row for a store wins.
    for zone in &batch.zones {
        summary.timezones += diesel::insert_or_ignore_into(timezones::table)
            .values(zone)
            .execute(conn)?;
    }

    Ok(summary)
}

/// Load a CSV with a header row, keeping every column as text.
fn read_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("read CSV {}", path.display()))
}

/// The first of `names` present in `df`, as owned strings; empty cells are an error.
fn text_column(df: &DataFrame, path: &Path, names: &[&str]) -> anyhow::Result<Vec<String>> {
    let name = names
        .iter()
        .copied()
        .find(|n| df.get_column_names().iter().any(|c| c.as_str() == *n))
        .ok_or_else(|| anyhow!("{}: missing column {}", path.display(), names.join(" or ")))?;
    let values = df
        .column(name)?
        .as_materialized_series()
        .str()
        .with_context(|| format!("{}: column {name} is not text", path.display()))?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_owned)
                .ok_or_else(|| anyhow!("{}: row {}: empty {name}", path.display(), i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_read_as_text_with_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hours.csv");
        std::fs::write(
            &path,
            "store_id,day_of_week,start_time_local,end_time_local\n007,0,09:00:00,17:00:00\n",
        )
        .unwrap();

        let df = read_csv(&path).unwrap();
        assert_eq!(text_column(&df, &path, &["store_id"]).unwrap(), vec!["007"]);
        assert_eq!(
            text_column(&df, &path, &["dayOfWeek", "day_of_week"]).unwrap(),
            vec!["0"]
        );
        let err = text_column(&df, &path, &["timezone_str"]).unwrap_err();
        assert!(err.to_string().contains("missing column timezone_str"));
    }
}
