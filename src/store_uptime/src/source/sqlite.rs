//! Load report input from the SQLite tables.
use anyhow::Context;
use chrono::NaiveTime;
use diesel::prelude::*;
use tracing::info;

use super::DataSource;
use crate::{
    business_hours::BusinessHourRule,
    db::connection::connect_sqlite,
    engine::{ReportInput, TimezoneRecord},
    models::{BusinessHoursRow, StoreStatusRow, TimezoneRow},
    schema::{business_hours, store_status, timezones},
    status::{PollStatus, StatusPoll},
    tz,
};

/// Reads `store_status`, `business_hours` and `timezones` in one read transaction.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    database_url: String,
}

impl SqliteSource {
    /// Source over the database at `database_url` (migrations must already be applied).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Blocking load; [`DataSource::load`] runs this on the blocking pool.
    pub fn load_blocking(&self) -> anyhow::Result<ReportInput> {
        let mut conn = connect_sqlite(&self.database_url)?;
        let (polls, hours, zones) = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let polls: Vec<StoreStatusRow> = store_status::table
                .select(StoreStatusRow::as_select())
                .load(conn)
                .context("reading store_status")?;
            let hours: Vec<BusinessHoursRow> = business_hours::table
                .select(BusinessHoursRow::as_select())
                .load(conn)
                .context("reading business_hours")?;
            let zones: Vec<TimezoneRow> = timezones::table
                .select(TimezoneRow::as_select())
                .load(conn)
                .context("reading timezones")?;
            Ok((polls, hours, zones))
        })?;

        let input = ReportInput {
            polls: polls.iter().map(poll_from_row).collect::<anyhow::Result<_>>()?,
            business_hours: hours.iter().map(rule_from_row).collect::<anyhow::Result<_>>()?,
            timezones: zones
                .into_iter()
                .map(|z| TimezoneRecord {
                    store_id: z.store_id,
                    timezone_name: z.timezone_str,
                })
                .collect(),
        };
        info!(
            polls = input.polls.len(),
            business_hours = input.business_hours.len(),
            timezones = input.timezones.len(),
            "loaded report input"
        );
        Ok(input)
    }
}

#[async_trait::async_trait]
impl DataSource for SqliteSource {
    async fn load(&self) -> anyhow::Result<ReportInput> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.load_blocking())
            .await
            .context("report input loader panicked")?
    }
}

fn poll_from_row(row: &StoreStatusRow) -> anyhow::Result<StatusPoll> {
    let timestamp_utc = tz::parse_ts_to_utc(&row.timestamp_utc)
        .with_context(|| format!("store {}: bad poll timestamp", row.store_id))?;
    let status: PollStatus = row
        .status
        .parse()
        .with_context(|| format!("store {}: bad poll status", row.store_id))?;
    Ok(StatusPoll::new(row.store_id.clone(), timestamp_utc, status))
}

fn rule_from_row(row: &BusinessHoursRow) -> anyhow::Result<BusinessHourRule> {
    Ok(BusinessHourRule {
        store_id: row.store_id.clone(),
        day_of_week: row.day_of_week,
        start_time_local: parse_local_time(&row.start_time_local)
            .with_context(|| format!("store {}: bad start_time_local", row.store_id))?,
        end_time_local: parse_local_time(&row.end_time_local)
            .with_context(|| format!("store {}: bad end_time_local", row.store_id))?,
    })
}

/// `HH:MM:SS[.f]` or `HH:MM`.
fn parse_local_time(s: &str) -> anyhow::Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("bad local time: {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_times_accept_short_and_long_forms() {
        assert_eq!(parse_local_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(
            parse_local_time("23:59:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        );
        assert!(parse_local_time("9am").is_err());
    }

    #[test]
    fn poll_rows_reject_unknown_status() {
        let row = StoreStatusRow {
            store_id: "s1".into(),
            timestamp_utc: "2023-01-22 12:09:39.388884 UTC".into(),
            status: "maybe".into(),
        };
        let err = poll_from_row(&row).unwrap_err();
        assert!(format!("{err:#}").contains("unknown poll status"));
    }
}
