//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`]:
//! - [`crate::schema::store_status`]: raw polls, one row per observation
//! - [`crate::schema::business_hours`]: local opening windows per weekday
//! - [`crate::schema::timezones`]: IANA zone per store
//! - [`crate::schema::report_status`]: report job registry
//!
//! Columns are stored as text exactly as ingested; conversion to typed rows happens in
//! [`crate::source::sqlite`] and [`crate::job::sqlite`].

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::store_status`] (without its rowid).
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = store_status, check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoreStatusRow {
    /// Store identifier.
    pub store_id: String,
    /// Poll instant as text (RFC-3339 or `YYYY-MM-DD HH:MM:SS[.f] UTC`).
    pub timestamp_utc: String,
    /// `"active"` or `"inactive"`.
    pub status: String,
}

/// Insertable form of [`StoreStatusRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = store_status)]
pub struct NewStoreStatus<'a> {
    /// Store identifier.
    pub store_id: &'a str,
    /// Poll instant as text.
    pub timestamp_utc: &'a str,
    /// Status text.
    pub status: &'a str,
}

/// A row in [`crate::schema::business_hours`] (without its rowid).
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = business_hours, check_for_backend(diesel::sqlite::Sqlite))]
pub struct BusinessHoursRow {
    /// Store identifier.
    pub store_id: String,
    /// Weekday, `0 = Monday … 6 = Sunday`.
    pub day_of_week: i32,
    /// Local opening time, `HH:MM:SS` or `HH:MM`.
    pub start_time_local: String,
    /// Local closing time, `HH:MM:SS` or `HH:MM`.
    pub end_time_local: String,
}

/// Insertable form of [`BusinessHoursRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = business_hours)]
pub struct NewBusinessHours<'a> {
    /// Store identifier.
    pub store_id: &'a str,
    /// Weekday, `0 = Monday … 6 = Sunday`.
    pub day_of_week: i32,
    /// Local opening time.
    pub start_time_local: &'a str,
    /// Local closing time.
    pub end_time_local: &'a str,
}

/// A row in [`crate::schema::timezones`].
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = timezones, check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimezoneRow {
    /// Store identifier.
    pub store_id: String,
    /// IANA zone name.
    pub timezone_str: String,
}

/// A row in [`crate::schema::report_status`].
///
/// Constrained `status` values: "Running" | "Complete" | "Error".
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = report_status, check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReportStatusRow {
    /// Job identifier.
    pub report_id: String,
    /// Lifecycle state text.
    pub status: String,
    /// Set once the job is `Complete`.
    pub output_location: Option<String>,
    /// Set once the job is `Error`.
    pub error_message: Option<String>,
    /// Registration time (RFC-3339 UTC).
    pub created_at: String,
    /// Last state change (RFC-3339 UTC).
    pub updated_at: String,
}
