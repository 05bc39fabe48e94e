//! Report jobs and the registry that tracks them.
//!
//! A job is created `Running` and moves exactly once to `Complete` or `Error`.
//! [`JobRegistry`] is the only shared mutable state between report runs; the
//! in-memory and SQLite implementations live in [`memory`] and [`sqlite`].

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryRegistry;
pub use sqlite::SqliteRegistry;

/// Opaque report identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle state of a report job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum JobState {
    /// Still being computed.
    Running,
    /// Finished; rows are at `output_location`.
    Complete {
        /// Where the sink stored the rows.
        output_location: String,
    },
    /// Failed; no output was produced.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl JobState {
    /// Status text as stored in `report_status.status`.
    pub const fn label(&self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Complete { .. } => "Complete",
            JobState::Error { .. } => "Error",
        }
    }

    /// `true` for `Complete` and `Error`.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Terminal result a running job is moved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Report written successfully.
    Complete {
        /// Where the sink stored the rows.
        output_location: String,
    },
    /// Report failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl From<JobOutcome> for JobState {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Complete { output_location } => JobState::Complete { output_location },
            JobOutcome::Error { message } => JobState::Error { message },
        }
    }
}

/// A report job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportJob {
    /// Job identifier.
    pub report_id: ReportId,
    /// Current state.
    #[serde(flatten)]
    pub state: JobState,
    /// When the job was registered.
    pub created_at: DateTime<Utc>,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl ReportJob {
    /// New `Running` job stamped at `at`.
    pub fn running(report_id: ReportId, at: DateTime<Utc>) -> Self {
        Self {
            report_id,
            state: JobState::Running,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Errors from a [`JobRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No job with this id was ever registered.
    #[error("report {0} is not registered")]
    UnknownReport(ReportId),

    /// The job already reached a terminal state.
    #[error("report {0} already finished")]
    AlreadyTerminal(ReportId),

    /// A stored record cannot be turned back into a job.
    #[error("report {report_id} has a corrupt record: {reason}")]
    Corrupt {
        /// Offending job.
        report_id: ReportId,
        /// What is wrong with it.
        reason: String,
    },

    /// Database failure.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    /// Any other storage failure (connection, background task).
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Key-value store of report jobs.
///
/// Implementations guarantee that `get` never returns a half-written record and that
/// `finish` succeeds at most once per id.
///
/// The service retries a failed `finish` a bounded number of times. A registry that
/// keeps failing past that leaves the job `Running`; such records need operator
/// cleanup.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Register a new `Running` job under a freshly generated unique id.
    async fn create(&self) -> Result<ReportJob, RegistryError>;

    /// Current record for `id`, or `None` if it was never registered.
    async fn get(&self, id: &ReportId) -> Result<Option<ReportJob>, RegistryError>;

    /// Move a `Running` job to its terminal state.
    async fn finish(&self, id: &ReportId, outcome: JobOutcome) -> Result<ReportJob, RegistryError>;
}
