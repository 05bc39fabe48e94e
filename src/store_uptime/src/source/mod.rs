//! Where report input comes from.
//!
//! A [`DataSource`] hands the engine already-typed rows. Parsing and validating stored
//! text (timestamps, status strings, local times) is the source's job, so a bad row
//! fails the load rather than reaching the engine.

pub mod sqlite;

use async_trait::async_trait;

use crate::engine::ReportInput;

pub use sqlite::SqliteSource;

/// Supplier of polls, business hours and timezones for one report run.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load a consistent snapshot of all input rows.
    async fn load(&self) -> anyhow::Result<ReportInput>;
}

/// Serves a fixed, pre-typed input.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    input: ReportInput,
}

impl InMemorySource {
    /// Source that always returns `input`.
    pub fn new(input: ReportInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn load(&self) -> anyhow::Result<ReportInput> {
        Ok(self.input.clone())
    }
}
