#![allow(dead_code)]

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use std::path::PathBuf;
use store_uptime::business_hours::BusinessHourRule;
use store_uptime::db::{connection, migrate};
use store_uptime::models::{NewBusinessHours, NewStoreStatus, TimezoneRow};
use store_uptime::schema::{business_hours, store_status, timezones};
use store_uptime::status::{PollStatus, StatusPoll};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    pub dir: TempDir, // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

impl TestDb {
    pub fn report_dir(&self) -> PathBuf {
        self.dir.path().join("reports")
    }
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db").to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn poll(store: &str, at: DateTime<Utc>, status: PollStatus) -> StatusPoll {
    StatusPoll::new(store, at, status)
}

pub fn rule(store: &str, day: i32, open: NaiveTime, close: NaiveTime) -> BusinessHourRule {
    BusinessHourRule {
        store_id: store.into(),
        day_of_week: day,
        start_time_local: open,
        end_time_local: close,
    }
}

/// Insert polls using the `YYYY-MM-DD HH:MM:SS.ffffff UTC` text form.
pub fn seed_polls(conn: &mut SqliteConnection, polls: &[StatusPoll]) -> QueryResult<usize> {
    let rows: Vec<(String, String, String)> = polls
        .iter()
        .map(|p| {
            (
                p.store_id.clone(),
                p.timestamp_utc.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string(),
                p.status.as_str().to_string(),
            )
        })
        .collect();
    let new: Vec<NewStoreStatus<'_>> = rows
        .iter()
        .map(|(s, t, st)| NewStoreStatus {
            store_id: s,
            timestamp_utc: t,
            status: st,
        })
        .collect();
    diesel::insert_into(store_status::table).values(&new).execute(conn)
}

pub fn seed_rules(conn: &mut SqliteConnection, rules: &[BusinessHourRule]) -> QueryResult<usize> {
    let times: Vec<(String, String)> = rules
        .iter()
        .map(|r| {
            (
                r.start_time_local.format("%H:%M:%S").to_string(),
                r.end_time_local.format("%H:%M:%S").to_string(),
            )
        })
        .collect();
    let new: Vec<NewBusinessHours<'_>> = rules
        .iter()
        .zip(&times)
        .map(|(r, (open, close))| NewBusinessHours {
            store_id: &r.store_id,
            day_of_week: r.day_of_week,
            start_time_local: open,
            end_time_local: close,
        })
        .collect();
    diesel::insert_into(business_hours::table).values(&new).execute(conn)
}

pub fn seed_timezone(conn: &mut SqliteConnection, store: &str, zone: &str) -> QueryResult<usize> {
    diesel::insert_into(timezones::table)
        .values(TimezoneRow {
            store_id: store.into(),
            timezone_str: zone.into(),
        })
        .execute(conn)
}
