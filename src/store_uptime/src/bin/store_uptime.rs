use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use store_uptime::{
    config::{ReportConfig, load_config_path},
    db::migrate,
    engine::compute_report_input,
    ingest::{IngestPaths, ingest_csv},
    service::{ReportService, ReportStatus},
    sink::render_csv,
    source::{DataSource, SqliteSource},
    tz::parse_ts_to_utc,
    window::FixedClock,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Store uptime report CLI")]
struct Cli {
    /// TOML config file; environment variables override its values.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply the embedded schema migrations.
    Migrate,
    /// Apply migrations, then load the CSV exports into the input tables.
    ///
    /// Paths default to `STORE_DATA_CSV`, `BUSINESS_HOURS_CSV` and `TIMEZONES_CSV`.
    Ingest {
        #[arg(long, value_name = "FILE")]
        store_status: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        business_hours: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        timezones: Option<PathBuf>,
    },
    /// Compute the report synchronously and print the CSV to stdout.
    Compute {
        /// Evaluation instant; defaults to the current time.
        #[arg(long)]
        now: Option<String>,
    },
    /// Submit a report job, wait for it, and print its id and final status.
    Report {
        /// Evaluation instant; defaults to the current time.
        #[arg(long)]
        now: Option<String>,
    },
    /// Print the status of a report.
    Status { report_id: String },
    /// Print (or save) the output of a completed report.
    Fetch {
        report_id: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ReportConfig> {
    match path {
        Some(p) => {
            let mut cfg = load_config_path(p)?;
            cfg.apply_env_overrides()?;
            Ok(cfg)
        }
        None => ReportConfig::from_env(),
    }
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(s) => parse_ts_to_utc(s).with_context(|| format!("invalid --now value {s:?}")),
        None => Ok(Utc::now()),
    }
}

fn print_status(id: &str, status: &ReportStatus) {
    match status {
        ReportStatus::Running => println!("{id}\tRunning"),
        ReportStatus::Complete { output_location } => {
            println!("{id}\tComplete\t{output_location}")
        }
        ReportStatus::Error { message } => println!("{id}\tError\t{message}"),
        ReportStatus::NotFound => println!("{id}\tNotFound"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    match cli.cmd {
        Cmd::Migrate => {
            migrate::run_sqlite(&cfg.database_url)?;
            info!(database_url = %cfg.database_url, "migrations applied");
        }
        Cmd::Ingest {
            store_status,
            business_hours,
            timezones,
        } => {
            let env = IngestPaths::from_env();
            let paths = IngestPaths {
                store_status: store_status.or(env.store_status),
                business_hours: business_hours.or(env.business_hours),
                timezones: timezones.or(env.timezones),
            };
            migrate::run_sqlite(&cfg.database_url)?;
            let summary = ingest_csv(&cfg.database_url, &paths)?;
            println!(
                "polls\t{}\nbusiness_hours\t{}\ntimezones\t{}",
                summary.polls, summary.business_hours, summary.timezones
            );
        }
        Cmd::Compute { now } => {
            let now = parse_now(now.as_deref())?;
            let input = SqliteSource::new(cfg.database_url.clone()).load().await?;
            let rows = tokio::task::spawn_blocking(move || compute_report_input(&input, now))
                .await
                .context("report computation panicked")??;
            let csv = render_csv(&rows)?;
            print!("{}", String::from_utf8_lossy(&csv));
        }
        Cmd::Report { now } => {
            let mut service = ReportService::from_config(&cfg)?;
            if let Some(s) = now.as_deref() {
                let now = parse_now(Some(s))?;
                service = service.with_clock(Arc::new(FixedClock(now)));
            }
            let (id, task) = service.submit_tracked().await?;
            task.await.context("report task panicked")?;
            let status = service.get_status(&id).await?;
            print_status(id.as_str(), &status);
            if let ReportStatus::Error { .. } = status {
                bail!("report {id} failed");
            }
        }
        Cmd::Status { report_id } => {
            let service = ReportService::from_config(&cfg)?;
            let status = service.get_status(&report_id.as_str().into()).await?;
            print_status(&report_id, &status);
        }
        Cmd::Fetch { report_id, out } => {
            let service = ReportService::from_config(&cfg)?;
            let output = service.fetch_output(&report_id.as_str().into()).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &output.bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "report saved");
                }
                None => print!("{}", String::from_utf8_lossy(&output.bytes)),
            }
        }
    }

    Ok(())
}
