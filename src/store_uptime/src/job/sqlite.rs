//! Job registry persisted in the `report_status` table.
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::debug;

use super::{JobOutcome, JobRegistry, JobState, RegistryError, ReportId, ReportJob};
use crate::{db::connection::connect_sqlite, models::ReportStatusRow, schema::report_status, tz};

use crate::schema::report_status::dsl as rs;

/// Registry backed by SQLite. A connection is opened per call on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteRegistry {
    database_url: String,
}

impl SqliteRegistry {
    /// Registry over the database at `database_url` (migrations must already be applied).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, RegistryError> + Send + 'static,
    {
        let url = self.database_url.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect_sqlite(&url)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RegistryError::Storage(e.into()))?
    }
}

fn load(conn: &mut SqliteConnection, id: &str) -> Result<Option<ReportStatusRow>, RegistryError> {
    Ok(rs::report_status
        .find(id)
        .select(ReportStatusRow::as_select())
        .first(conn)
        .optional()?)
}

fn row_to_job(row: ReportStatusRow) -> Result<ReportJob, RegistryError> {
    let report_id = ReportId::from(row.report_id);
    let corrupt = |reason: String| RegistryError::Corrupt {
        report_id: report_id.clone(),
        reason,
    };
    let state = match (row.status.as_str(), row.output_location, row.error_message) {
        ("Running", _, _) => JobState::Running,
        ("Complete", Some(output_location), _) => JobState::Complete { output_location },
        ("Complete", None, _) => return Err(corrupt("complete without output_location".into())),
        ("Error", _, message) => JobState::Error {
            message: message.unwrap_or_default(),
        },
        (other, _, _) => return Err(corrupt(format!("unexpected status {other:?}"))),
    };
    let created_at = tz::parse_ts_to_utc(&row.created_at).map_err(|e| corrupt(format!("{e:#}")))?;
    let updated_at = tz::parse_ts_to_utc(&row.updated_at).map_err(|e| corrupt(format!("{e:#}")))?;
    Ok(ReportJob {
        report_id,
        state,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl JobRegistry for SqliteRegistry {
    async fn create(&self) -> Result<ReportJob, RegistryError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let stamp = tz::to_rfc3339_millis(now);
            let mut id = ReportId::generate();
            // INSERT OR IGNORE + retry keeps ids unique without a read-then-write race.
            loop {
                let inserted = diesel::insert_or_ignore_into(report_status::table)
                    .values(&ReportStatusRow {
                        report_id: id.as_str().to_string(),
                        status: JobState::Running.label().to_string(),
                        output_location: None,
                        error_message: None,
                        created_at: stamp.clone(),
                        updated_at: stamp.clone(),
                    })
                    .execute(conn)?;
                if inserted == 1 {
                    break;
                }
                id = ReportId::generate();
            }
            debug!(report_id = %id, "report registered");
            let row = load(conn, id.as_str())?.ok_or_else(|| RegistryError::UnknownReport(id.clone()))?;
            row_to_job(row)
        })
        .await
    }

    async fn get(&self, id: &ReportId) -> Result<Option<ReportJob>, RegistryError> {
        let id = id.clone();
        self.with_conn(move |conn| load(conn, id.as_str())?.map(row_to_job).transpose())
            .await
    }

    async fn finish(&self, id: &ReportId, outcome: JobOutcome) -> Result<ReportJob, RegistryError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.immediate_transaction::<_, RegistryError, _>(|conn| {
                let state = JobState::from(outcome);
                let (location, message) = match &state {
                    JobState::Complete { output_location } => (Some(output_location.as_str()), None),
                    JobState::Error { message } => (None, Some(message.as_str())),
                    JobState::Running => (None, None),
                };
                let updated = diesel::update(
                    rs::report_status
                        .filter(rs::report_id.eq(id.as_str()))
                        .filter(rs::status.eq(JobState::Running.label())),
                )
                .set((
                    rs::status.eq(state.label()),
                    rs::output_location.eq(location),
                    rs::error_message.eq(message),
                    rs::updated_at.eq(tz::to_rfc3339_millis(Utc::now())),
                ))
                .execute(conn)?;

                let row = load(conn, id.as_str())?;
                match (updated, row) {
                    (_, None) => Err(RegistryError::UnknownReport(id.clone())),
                    (0, Some(_)) => Err(RegistryError::AlreadyTerminal(id.clone())),
                    (_, Some(row)) => row_to_job(row),
                }
            })
        })
        .await
    }
}
