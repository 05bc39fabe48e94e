//! Report orchestration: job lifecycle on top of the engine and its collaborators.
//!
//! [`ReportService::submit`] registers a `Running` job, schedules the computation as a
//! background task and returns the id straight away. The task loads input, computes
//! every store on the worker pool, writes the table through the sink, and then flips
//! the job to `Complete` (with the output location) or `Error` (with a message).
//! The run is all-or-nothing: any failure leaves no partial report behind.

use std::sync::Arc;

use anyhow::Context;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    aggregate::StoreMetrics,
    config::{RegistryBackend, ReportConfig},
    engine::compute_report_input,
    job::{
        InMemoryRegistry, JobOutcome, JobRegistry, JobState, RegistryError, ReportId,
        SqliteRegistry,
    },
    sink::{CsvFileSink, ReportSink, SinkError},
    source::{DataSource, SqliteSource},
    window::{Clock, SystemClock},
};

/// What a caller sees when asking about a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    /// Still computing.
    Running,
    /// Done; rows are at `output_location`.
    Complete {
        /// Location returned by the sink.
        output_location: String,
    },
    /// Failed.
    Error {
        /// Captured failure message.
        message: String,
    },
    /// No report with that id exists.
    NotFound,
}

impl From<JobState> for ReportStatus {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Running => ReportStatus::Running,
            JobState::Complete { output_location } => ReportStatus::Complete { output_location },
            JobState::Error { message } => ReportStatus::Error { message },
        }
    }
}

/// A finished report's location and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    /// Where the sink stored the rows.
    pub location: String,
    /// Raw bytes at that location.
    pub bytes: Vec<u8>,
}

/// Errors surfaced by [`ReportService`] calls.
#[derive(Debug, Error)]
pub enum ReportError {
    /// No report with this id exists.
    #[error("report {0} not found")]
    NotFound(ReportId),

    /// The report exists but has no output to fetch.
    #[error("report {id} is not complete (status: {status})")]
    NotComplete {
        /// Requested report.
        id: ReportId,
        /// Its current status label.
        status: &'static str,
    },

    /// The report completed but its output can no longer be read.
    #[error("output of report {id} is missing at {location}")]
    OutputMissing {
        /// Requested report.
        id: ReportId,
        /// Location recorded at completion.
        location: String,
    },

    /// Job registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Output sink failure other than a missing file.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Tries at writing a job's terminal state before giving up.
const FINISH_ATTEMPTS: u32 = 5;
const FINISH_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

struct Inner {
    source: Arc<dyn DataSource>,
    sink: Arc<dyn ReportSink>,
    registry: Arc<dyn JobRegistry>,
    clock: Arc<dyn Clock>,
    pool: Option<Arc<ThreadPool>>,
}

/// Entry point for submitting reports and polling their status.
#[derive(Clone)]
pub struct ReportService {
    inner: Arc<Inner>,
}

impl ReportService {
    /// Service over explicit collaborators; per-store work uses rayon's global pool.
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn ReportSink>,
        registry: Arc<dyn JobRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                sink,
                registry,
                clock,
                pool: None,
            }),
        }
    }

    /// Run per-store work on a dedicated pool of `workers` threads.
    pub fn with_workers(self, workers: usize) -> anyhow::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("uptime-worker-{i}"))
            .build()
            .context("building report worker pool")?;
        Ok(self.rebuild(|inner| Inner {
            pool: Some(Arc::new(pool)),
            ..inner
        }))
    }

    /// Evaluate reports at the instants given by `clock`.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        self.rebuild(|inner| Inner { clock, ..inner })
    }

    fn rebuild(self, f: impl FnOnce(Inner) -> Inner) -> Self {
        let inner = Arc::try_unwrap(self.inner).unwrap_or_else(|shared| Inner {
            source: Arc::clone(&shared.source),
            sink: Arc::clone(&shared.sink),
            registry: Arc::clone(&shared.registry),
            clock: Arc::clone(&shared.clock),
            pool: shared.pool.clone(),
        });
        Self {
            inner: Arc::new(f(inner)),
        }
    }

    /// SQLite source, CSV sink and the configured registry, on the system clock.
    pub fn from_config(cfg: &ReportConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let registry: Arc<dyn JobRegistry> = match cfg.registry {
            RegistryBackend::Memory => Arc::new(InMemoryRegistry::new()),
            RegistryBackend::Sqlite => Arc::new(SqliteRegistry::new(cfg.database_url.clone())),
        };
        let service = Self::new(
            Arc::new(SqliteSource::new(cfg.database_url.clone())),
            Arc::new(CsvFileSink::new(cfg.report_dir.clone())),
            registry,
            Arc::new(SystemClock),
        );
        match cfg.workers {
            Some(n) => service.with_workers(n),
            None => Ok(service),
        }
    }

    /// Register a report and start computing it in the background.
    pub async fn submit(&self) -> Result<ReportId, ReportError> {
        let (id, _task) = self.submit_tracked().await?;
        Ok(id)
    }

    /// Like [`ReportService::submit`], also returning the background task's handle.
    pub async fn submit_tracked(&self) -> Result<(ReportId, JoinHandle<()>), ReportError> {
        let job = self.inner.registry.create().await?;
        let id = job.report_id;
        info!(report_id = %id, "report submitted");

        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();
        let handle = tokio::spawn(async move { inner.run(task_id).await });
        Ok((id, handle))
    }

    /// Current status of `id`; unknown ids are [`ReportStatus::NotFound`].
    pub async fn get_status(&self, id: &ReportId) -> Result<ReportStatus, ReportError> {
        Ok(match self.inner.registry.get(id).await? {
            Some(job) => job.state.into(),
            None => ReportStatus::NotFound,
        })
    }

    /// Location and bytes of a completed report.
    pub async fn fetch_output(&self, id: &ReportId) -> Result<ReportOutput, ReportError> {
        let job = self
            .inner
            .registry
            .get(id)
            .await?
            .ok_or_else(|| ReportError::NotFound(id.clone()))?;
        let location = match job.state {
            JobState::Complete { output_location } => output_location,
            other => {
                return Err(ReportError::NotComplete {
                    id: id.clone(),
                    status: other.label(),
                });
            }
        };
        match self.inner.sink.read(&location).await {
            Ok(bytes) => Ok(ReportOutput { location, bytes }),
            Err(SinkError::OutputMissing { .. }) => {
                warn!(report_id = %id, %location, "completed report output is missing");
                Err(ReportError::OutputMissing {
                    id: id.clone(),
                    location,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, id: ReportId) {
        let outcome = match self.generate(&id).await {
            Ok(output_location) => {
                info!(report_id = %id, %output_location, "report complete");
                JobOutcome::Complete { output_location }
            }
            Err(e) => {
                error!(report_id = %id, error = %format!("{e:#}"), "report failed");
                JobOutcome::Error {
                    message: format!("{e:#}"),
                }
            }
        };
        self.record(&id, outcome).await;
    }

    /// Write the terminal state, retrying transient registry failures.
    async fn record(&self, id: &ReportId, outcome: JobOutcome) {
        for attempt in 1..=FINISH_ATTEMPTS {
            match self.registry.finish(id, outcome.clone()).await {
                Ok(_) => return,
                Err(e @ (RegistryError::UnknownReport(_) | RegistryError::AlreadyTerminal(_))) => {
                    error!(report_id = %id, error = %e, "could not record report outcome");
                    return;
                }
                Err(e) if attempt < FINISH_ATTEMPTS => {
                    warn!(report_id = %id, attempt, error = %e, "recording report outcome failed; retrying");
                    tokio::time::sleep(FINISH_BACKOFF * attempt).await;
                }
                Err(e) => {
                    error!(report_id = %id, attempts = attempt, error = %e, "giving up on recording report outcome");
                }
            }
        }
    }

    async fn generate(&self, id: &ReportId) -> anyhow::Result<String> {
        let now = self.clock.now();
        let input = self.source.load().await.context("loading report input")?;
        let pool = self.pool.clone();

        let rows: Vec<StoreMetrics> = tokio::task::spawn_blocking(move || match pool {
            Some(pool) => pool.install(|| compute_report_input(&input, now)),
            None => compute_report_input(&input, now),
        })
        .await
        .context("report computation panicked")?
        .context("computing store metrics")?;

        let location = self
            .sink
            .write(id, &rows)
            .await
            .context("writing report output")?;
        Ok(location)
    }
}
