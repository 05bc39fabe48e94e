//! Process-local job registry.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{JobOutcome, JobRegistry, RegistryError, ReportId, ReportJob};

/// Jobs held in a `RwLock<HashMap>`; a reader waits for an in-flight update to finish.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    jobs: RwLock<HashMap<ReportId, ReportJob>>,
}

impl InMemoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryRegistry {
    async fn create(&self) -> Result<ReportJob, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let mut id = ReportId::generate();
        while jobs.contains_key(&id) {
            id = ReportId::generate();
        }
        let job = ReportJob::running(id.clone(), Utc::now());
        jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: &ReportId) -> Result<Option<ReportJob>, RegistryError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn finish(&self, id: &ReportId, outcome: JobOutcome) -> Result<ReportJob, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownReport(id.clone()))?;
        if job.state.is_terminal() {
            return Err(RegistryError::AlreadyTerminal(id.clone()));
        }
        job.state = outcome.into();
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;

    #[tokio::test]
    async fn lifecycle_transitions_once() {
        let reg = InMemoryRegistry::new();
        let job = reg.create().await.unwrap();
        assert_eq!(job.state, JobState::Running);

        let got = reg.get(&job.report_id).await.unwrap().unwrap();
        assert_eq!(got, job);

        let done = reg
            .finish(
                &job.report_id,
                JobOutcome::Complete {
                    output_location: "reports/a.csv".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.state.label(), "Complete");

        let again = reg
            .finish(&job.report_id, JobOutcome::Error { message: "late".into() })
            .await
            .unwrap_err();
        assert!(matches!(again, RegistryError::AlreadyTerminal(_)));
        let still = reg.get(&job.report_id).await.unwrap().unwrap();
        assert_eq!(still.state.label(), "Complete");
    }

    #[tokio::test]
    async fn unknown_ids() {
        let reg = InMemoryRegistry::new();
        let id = ReportId::from("not-a-real-id");
        assert!(reg.get(&id).await.unwrap().is_none());
        let err = reg
            .finish(&id, JobOutcome::Error { message: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownReport(_)));
    }
}
