//! Report service configuration: parsing, validation, and environment overrides.
//!
//! A TOML file describes where input lives and where reports go:
//!
//! ```toml
//! database_url = "sqlite://store_monitor.db"
//! report_dir = "reports"
//! workers = 4
//! registry = "sqlite"
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]
//! - Build purely from the environment: [`ReportConfig::from_env`]
//! - Layer environment variables over a parsed file: [`ReportConfig::apply_env_overrides`]
//!
//! Environment variables: `DATABASE_URL`, `REPORT_DIR`, `REPORT_WORKERS`,
//! `REPORT_REGISTRY`.

use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var, get_env_var_opt, parse_env_var};

/// Which job registry backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    /// Jobs live only as long as the process.
    Memory,
    /// Jobs are persisted in the `report_status` table.
    #[default]
    Sqlite,
}

impl fmt::Display for RegistryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryBackend::Memory => "memory",
            RegistryBackend::Sqlite => "sqlite",
        })
    }
}

impl FromStr for RegistryBackend {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(RegistryBackend::Memory),
            "sqlite" => Ok(RegistryBackend::Sqlite),
            other => bail!("unknown registry backend: {other}"),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Explicit configuration handed to [`crate::service::ReportService::from_config`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// SQLite database holding the input tables (and the registry, if `sqlite`).
    pub database_url: String,
    /// Directory finished CSV reports are written to.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// Size of the per-store worker pool; `None` uses rayon's global pool.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Job registry backend.
    #[serde(default)]
    pub registry: RegistryBackend,
}

impl ReportConfig {
    /// Minimal config for `database_url` with defaults elsewhere.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            report_dir: default_report_dir(),
            workers: None,
            registry: RegistryBackend::default(),
        }
    }

    /// Build from environment variables; `DATABASE_URL` is required.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::new(get_env_var("DATABASE_URL")?);
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Overwrite fields with any of the recognised environment variables that are set.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(url) = get_env_var_opt("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(dir) = get_env_var_opt("REPORT_DIR") {
            self.report_dir = PathBuf::from(dir);
        }
        if let Some(workers) = parse_env_var::<usize>("REPORT_WORKERS")? {
            self.workers = Some(workers);
        }
        if let Some(registry) = get_env_var_opt("REPORT_REGISTRY") {
            self.registry = registry.parse()?;
        }
        self.validate()
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            bail!("database_url must not be empty");
        }
        if self.workers == Some(0) {
            bail!("workers must be > 0");
        }
        if self.report_dir.as_os_str().is_empty() {
            bail!("report_dir must not be empty");
        }
        Ok(())
    }
}

/// Parse and validate a config from TOML text.
pub fn load_config_str(s: &str) -> anyhow::Result<ReportConfig> {
    let cfg: ReportConfig = toml::from_str(s).context("parse report config TOML")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse and validate a config file.
pub fn load_config_path<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<ReportConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    load_config_str(&s).with_context(|| format!("load config {}", path.display()))
}
